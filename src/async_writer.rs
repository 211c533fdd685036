//! Async XLSX writer over a tokio sink
//!
//! [`AsyncExcelWriter`] shares the encoding engine with the blocking writer.
//! Only draining staged bytes into the sink awaits; that happens when a sheet
//! or row starts and on completion. Cell operations stay synchronous.
//!
//! Dropping one of the awaiting futures before it resolves leaves the package
//! half-written. The writer notices and refuses every further call, and the
//! sink must be discarded.

use crate::error::Result;
use crate::fast_writer::compression::{CompressionBackend, Deflate};
use crate::fast_writer::styles::StyleRef;
use crate::fast_writer::FastWorkbook;
use crate::types::{AnchorCell, CellValue, PictureExtent, PictureFormat, RowOptions, SheetConfig};
use crate::writer::WriterOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Streaming XLSX writer over an async sink
///
/// # Examples
///
/// ```no_run
/// use xlsxstream::AsyncExcelWriter;
///
/// # async fn run() -> xlsxstream::Result<()> {
/// let file = tokio::fs::File::create("output.xlsx").await?;
/// let mut writer = AsyncExcelWriter::new(file);
///
/// writer.start_sheet("Sheet1").await?;
/// writer.start_row().await?;
/// writer.add_cell("hello")?;
/// writer.add_cell(42i64)?;
/// writer.complete().await?;
/// # Ok(())
/// # }
/// ```
pub struct AsyncExcelWriter<W: AsyncWrite + Unpin, B: CompressionBackend = Deflate> {
    sink: W,
    workbook: FastWorkbook<B>,
    draining: bool,
}

impl<W: AsyncWrite + Unpin> AsyncExcelWriter<W> {
    pub fn new(sink: W) -> Self {
        Self::with_options(sink, WriterOptions::default())
    }

    pub fn with_options(sink: W, options: WriterOptions) -> Self {
        let backend = Deflate::new(options.compression_level);
        Self::with_backend(sink, backend, options)
    }
}

impl<W: AsyncWrite + Unpin, B: CompressionBackend> AsyncExcelWriter<W, B> {
    pub fn with_backend(sink: W, backend: B, options: WriterOptions) -> Self {
        AsyncExcelWriter {
            sink,
            workbook: FastWorkbook::new(backend, options),
            draining: false,
        }
    }

    pub async fn start_sheet(&mut self, name: &str) -> Result<()> {
        self.start_sheet_with_config(name, &SheetConfig::default())
            .await
    }

    pub async fn start_sheet_with_config(
        &mut self,
        name: &str,
        config: &SheetConfig,
    ) -> Result<()> {
        self.check_cancelled();
        self.workbook.start_sheet(name, config)?;
        self.drain().await
    }

    pub async fn start_row(&mut self) -> Result<()> {
        self.start_row_with(RowOptions::default()).await
    }

    pub async fn start_row_with(&mut self, options: RowOptions) -> Result<()> {
        self.check_cancelled();
        self.workbook.start_row(options)?;
        self.drain().await
    }

    pub fn add_empty_rows(&mut self, count: u32) -> Result<()> {
        self.check_cancelled();
        self.workbook.add_empty_rows(count)
    }

    pub fn add_cell<'v>(&mut self, value: impl Into<CellValue<'v>>) -> Result<()> {
        self.check_cancelled();
        self.workbook.add_cell(value.into(), None)
    }

    pub fn add_styled_cell<'v>(
        &mut self,
        value: impl Into<CellValue<'v>>,
        style: StyleRef,
    ) -> Result<()> {
        self.check_cancelled();
        self.workbook.add_cell(value.into(), Some(style))
    }

    pub fn add_cell_at<'v>(&mut self, column: u32, value: impl Into<CellValue<'v>>) -> Result<()> {
        self.check_cancelled();
        self.workbook.add_cell_at(column, value.into(), None)
    }

    pub fn add_utf8_cell(&mut self, bytes: &[u8]) -> Result<()> {
        self.add_cell(CellValue::Utf8(bytes))
    }

    pub fn add_cell_with_shared_string(&mut self, text: &str) -> Result<()> {
        self.check_cancelled();
        self.workbook.add_cell_with_shared_string(text, None)
    }

    pub fn add_empty_cells(&mut self, count: u32) -> Result<()> {
        self.check_cancelled();
        self.workbook.add_empty_cells(count)
    }

    pub fn add_picture(
        &mut self,
        data: &[u8],
        format: PictureFormat,
        anchor: AnchorCell,
        extent: impl Into<PictureExtent>,
    ) -> Result<()> {
        self.check_cancelled();
        self.workbook.add_picture(data, format, anchor, extent)
    }

    /// Start a row and write every value into it
    pub async fn write_row<'v, I>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = CellValue<'v>>,
    {
        self.start_row().await?;
        for value in values {
            self.workbook.add_cell(value, None)?;
        }
        Ok(())
    }

    /// Finish the package, then flush and shut down the sink
    pub async fn complete(&mut self) -> Result<()> {
        self.check_cancelled();
        self.workbook.complete()?;
        self.drain().await?;
        self.draining = true;
        self.sink.flush().await?;
        self.sink.shutdown().await?;
        self.draining = false;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.workbook.is_complete()
    }

    pub fn bytes_written(&self) -> u64 {
        self.workbook.bytes_written()
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    /// A drain that never finished means its future was dropped or failed
    fn check_cancelled(&mut self) {
        if self.draining {
            self.workbook.poison();
        }
    }

    async fn drain(&mut self) -> Result<()> {
        let pending = self.workbook.pending();
        if pending.is_empty() {
            return Ok(());
        }
        self.draining = true;
        if let Err(e) = self.sink.write_all(pending).await {
            self.workbook.poison();
            return Err(e.into());
        }
        self.workbook.clear_pending();
        self.draining = false;
        Ok(())
    }
}
