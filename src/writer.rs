//! Blocking XLSX writer
//!
//! [`ExcelWriter`] streams a workbook into any [`std::io::Write`] sink. Every
//! operation drains whatever the ZIP layer produced straight into the sink, so
//! memory stays bounded by the output buffer no matter how many rows are
//! written.

use crate::error::Result;
use crate::fast_writer::compression::{CompressionBackend, Deflate};
use crate::fast_writer::memory::MemoryProfile;
use crate::fast_writer::shared_strings::SharedStringTable;
use crate::fast_writer::styles::{StyleRef, StyleSheet};
use crate::fast_writer::FastWorkbook;
use crate::types::{AnchorCell, CellValue, PictureExtent, PictureFormat, RowOptions, SheetConfig};
use chrono::NaiveDateTime;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Smallest output buffer accepted by [`WriterOptions::with_buffer_capacity`]
pub const MIN_BUFFER_CAPACITY: usize = 1024;
const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;
const DEFAULT_COMPRESSION_LEVEL: u32 = 6;
const DEFAULT_MAX_UNIQUE_STRINGS: usize = 100_000;

/// Construction options shared by the blocking and async writers
#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub(crate) buffer_capacity: usize,
    pub(crate) compression_level: u32,
    pub(crate) shared_strings: Option<SharedStringTable>,
    pub(crate) styles: Option<StyleSheet>,
    pub(crate) timestamp: Option<NaiveDateTime>,
    pub(crate) max_unique_strings: usize,
}

impl WriterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the XML buffer size in bytes (at least 1 KiB)
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.max(MIN_BUFFER_CAPACITY);
        self
    }

    /// Take the buffer size from a memory profile
    pub fn with_memory_profile(self, profile: MemoryProfile) -> Self {
        self.with_buffer_capacity(profile.buffer_capacity())
    }

    /// Deflate level 0-9 for the default backend
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    /// Shared-string table that `CellValue::SharedString` references point into
    pub fn with_shared_strings(mut self, table: SharedStringTable) -> Self {
        self.shared_strings = Some(table);
        self
    }

    /// Style table that `StyleRef`s point into
    pub fn with_styles(mut self, styles: StyleSheet) -> Self {
        self.styles = Some(styles);
        self
    }

    /// Timestamp stored in ZIP headers and document properties
    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Cap on distinct strings added through `add_cell_with_shared_string`;
    /// past it new strings are written inline
    pub fn with_max_unique_strings(mut self, max: usize) -> Self {
        self.max_unique_strings = max;
        self
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    pub fn max_unique_strings(&self) -> usize {
        self.max_unique_strings
    }

    /// Configured timestamp, or the current UTC time
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
            .unwrap_or_else(|| chrono::Utc::now().naive_utc())
    }
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            shared_strings: None,
            styles: None,
            timestamp: None,
            max_unique_strings: DEFAULT_MAX_UNIQUE_STRINGS,
        }
    }
}

/// Streaming XLSX writer over a blocking sink
///
/// # Examples
///
/// ```no_run
/// use xlsxstream::{CellValue, ExcelWriter};
///
/// let mut writer = ExcelWriter::create("output.xlsx")?;
/// writer.start_sheet("Sheet1")?;
///
/// for i in 0..1_000_000i64 {
///     writer.write_row([CellValue::Int(i), CellValue::String("row")])?;
/// }
///
/// writer.complete()?;
/// # Ok::<(), xlsxstream::ExcelError>(())
/// ```
pub struct ExcelWriter<W: Write, B: CompressionBackend = Deflate> {
    sink: W,
    workbook: FastWorkbook<B>,
}

impl ExcelWriter<BufWriter<File>> {
    /// Create a file and write the workbook into it
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(ExcelWriter::new(BufWriter::with_capacity(64 * 1024, file)))
    }
}

impl<W: Write> ExcelWriter<W> {
    /// Writer with default options and deflate compression
    pub fn new(sink: W) -> Self {
        Self::with_options(sink, WriterOptions::default())
    }

    pub fn with_options(sink: W, options: WriterOptions) -> Self {
        let backend = Deflate::new(options.compression_level);
        Self::with_backend(sink, backend, options)
    }
}

impl<W: Write, B: CompressionBackend> ExcelWriter<W, B> {
    /// Writer using a custom compression backend
    pub fn with_backend(sink: W, backend: B, options: WriterOptions) -> Self {
        ExcelWriter {
            sink,
            workbook: FastWorkbook::new(backend, options),
        }
    }

    /// Start a sheet with default configuration
    pub fn start_sheet(&mut self, name: &str) -> Result<()> {
        self.start_sheet_with_config(name, &SheetConfig::default())
    }

    pub fn start_sheet_with_config(&mut self, name: &str, config: &SheetConfig) -> Result<()> {
        self.workbook.start_sheet(name, config)?;
        self.drain()
    }

    /// Start the row after the previous one
    pub fn start_row(&mut self) -> Result<()> {
        self.start_row_with(RowOptions::default())
    }

    /// Start a row with an explicit number or height
    pub fn start_row_with(&mut self, options: RowOptions) -> Result<()> {
        self.workbook.start_row(options)?;
        self.drain()
    }

    pub fn add_empty_rows(&mut self, count: u32) -> Result<()> {
        self.workbook.add_empty_rows(count)?;
        self.drain()
    }

    /// Write a cell in the next column
    ///
    /// Anything convertible into a [`CellValue`] is accepted: numbers, `bool`,
    /// `&str`, `char`, chrono dates, shared-string references and hyperlinks.
    pub fn add_cell<'v>(&mut self, value: impl Into<CellValue<'v>>) -> Result<()> {
        self.workbook.add_cell(value.into(), None)?;
        self.drain()
    }

    pub fn add_styled_cell<'v>(
        &mut self,
        value: impl Into<CellValue<'v>>,
        style: StyleRef,
    ) -> Result<()> {
        self.workbook.add_cell(value.into(), Some(style))?;
        self.drain()
    }

    /// Write a cell at a 0-based column; columns must keep increasing
    pub fn add_cell_at<'v>(&mut self, column: u32, value: impl Into<CellValue<'v>>) -> Result<()> {
        self.workbook.add_cell_at(column, value.into(), None)?;
        self.drain()
    }

    /// Write a UTF-8 byte span as an inline string
    pub fn add_utf8_cell(&mut self, bytes: &[u8]) -> Result<()> {
        self.add_cell(CellValue::Utf8(bytes))
    }

    /// Write text as a shared string, adding it to the document's table
    pub fn add_cell_with_shared_string(&mut self, text: &str) -> Result<()> {
        self.workbook.add_cell_with_shared_string(text, None)?;
        self.drain()
    }

    pub fn add_empty_cells(&mut self, count: u32) -> Result<()> {
        self.workbook.add_empty_cells(count)?;
        self.drain()
    }

    /// Attach a picture to the current sheet
    ///
    /// `extent` is either a [`PictureSize`](crate::PictureSize) in pixels or
    /// the bottom-right [`AnchorCell`].
    pub fn add_picture(
        &mut self,
        data: &[u8],
        format: PictureFormat,
        anchor: AnchorCell,
        extent: impl Into<PictureExtent>,
    ) -> Result<()> {
        self.workbook.add_picture(data, format, anchor, extent)?;
        self.drain()
    }

    /// Start a row and write every value into it
    pub fn write_row<'v, I>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = CellValue<'v>>,
    {
        self.workbook.start_row(RowOptions::default())?;
        for value in values {
            self.workbook.add_cell(value, None)?;
        }
        self.drain()
    }

    /// Finish the package and flush the sink
    pub fn complete(&mut self) -> Result<()> {
        self.workbook.complete()?;
        self.drain()?;
        if let Err(e) = self.sink.flush() {
            self.workbook.poison();
            return Err(e.into());
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.workbook.is_complete()
    }

    /// Package bytes produced so far
    pub fn bytes_written(&self) -> u64 {
        self.workbook.bytes_written()
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Return the sink; the package is only valid after `complete()`
    pub fn into_inner(self) -> W {
        self.sink
    }

    fn drain(&mut self) -> Result<()> {
        let pending = self.workbook.pending();
        if pending.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.sink.write_all(pending) {
            self.workbook.poison();
            return Err(e.into());
        }
        self.workbook.clear_pending();
        Ok(())
    }
}
