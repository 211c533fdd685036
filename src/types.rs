//! Type definitions for values, sheet configuration and pictures

use crate::fast_writer::cell_encoder::CellValueType;
use crate::fast_writer::shared_strings::SharedStringRef;
use chrono::{NaiveDate, NaiveDateTime};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single cell value, borrowed where the source is borrowed
///
/// Each variant has exactly one encoder; nothing here allocates when a cell
/// is written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue<'a> {
    /// Empty cell, still occupies its column
    Empty,
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// Date and time, written as an OLE Automation serial
    DateTime(NaiveDateTime),
    /// Calendar date, written as a whole-day serial
    Date(NaiveDate),
    /// Text written as an inline string
    String(&'a str),
    /// Single character written as an inline string
    Char(char),
    /// Raw UTF-8 bytes written as an inline string
    Utf8(&'a [u8]),
    /// Index into the document's shared-string table
    SharedString(SharedStringRef),
    /// Display text linked to an external target
    Hyperlink(&'a Hyperlink),
}

impl CellValue<'_> {
    /// Value-type tag the cell is written with
    pub fn value_type(&self) -> CellValueType {
        match self {
            CellValue::Empty => CellValueType::Empty,
            CellValue::Int(_) => CellValueType::Integer,
            CellValue::Float(_) => CellValueType::Number,
            CellValue::Bool(_) => CellValueType::Boolean,
            CellValue::DateTime(_) | CellValue::Date(_) => CellValueType::Date,
            CellValue::String(_)
            | CellValue::Char(_)
            | CellValue::Utf8(_)
            | CellValue::Hyperlink(_) => CellValueType::InlineString,
            CellValue::SharedString(_) => CellValueType::SharedString,
        }
    }

    /// Check if cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl<'a> From<&'a str> for CellValue<'a> {
    fn from(s: &'a str) -> Self {
        CellValue::String(s)
    }
}

impl<'a> From<&'a String> for CellValue<'a> {
    fn from(s: &'a String) -> Self {
        CellValue::String(s)
    }
}

impl<'a> From<&'a [u8]> for CellValue<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        CellValue::Utf8(bytes)
    }
}

impl From<char> for CellValue<'_> {
    fn from(c: char) -> Self {
        CellValue::Char(c)
    }
}

macro_rules! impl_from_lossless_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for CellValue<'_> {
                fn from(i: $t) -> Self {
                    CellValue::Int(i64::from(i))
                }
            }
        )*
    };
}

impl_from_lossless_int!(i8, i16, i32, i64, u8, u16, u32);

/// Values past `i64::MAX` are stored as floats, like any spreadsheet number
macro_rules! impl_from_wide_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for CellValue<'_> {
                fn from(i: $t) -> Self {
                    match i64::try_from(i) {
                        Ok(i) => CellValue::Int(i),
                        Err(_) => CellValue::Float(i as f64),
                    }
                }
            }
        )*
    };
}

impl_from_wide_int!(isize, usize, u64);

impl From<f64> for CellValue<'_> {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<f32> for CellValue<'_> {
    fn from(f: f32) -> Self {
        CellValue::Float(f as f64)
    }
}

impl From<bool> for CellValue<'_> {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<NaiveDateTime> for CellValue<'_> {
    fn from(dt: NaiveDateTime) -> Self {
        CellValue::DateTime(dt)
    }
}

impl From<NaiveDate> for CellValue<'_> {
    fn from(d: NaiveDate) -> Self {
        CellValue::Date(d)
    }
}

impl From<SharedStringRef> for CellValue<'_> {
    fn from(r: SharedStringRef) -> Self {
        CellValue::SharedString(r)
    }
}

impl<'a> From<&'a Hyperlink> for CellValue<'a> {
    fn from(link: &'a Hyperlink) -> Self {
        CellValue::Hyperlink(link)
    }
}

/// Hyperlink cell content
///
/// The target is validated when the cell is written, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hyperlink {
    pub target: String,
    pub text: String,
}

impl Hyperlink {
    pub fn new(target: impl Into<String>, text: impl Into<String>) -> Self {
        Hyperlink {
            target: target.into(),
            text: text.into(),
        }
    }
}

/// Column width settings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ColumnConfig {
    /// Width in characters
    pub width: f64,
}

impl ColumnConfig {
    pub fn new(width: f64) -> Self {
        ColumnConfig { width }
    }
}

/// Per-sheet configuration written into the worksheet header
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SheetConfig {
    pub frozen_rows: u32,
    pub frozen_columns: u32,
    /// Widths of the leading columns, starting at column A
    pub columns: Vec<ColumnConfig>,
    pub show_grid_lines: bool,
}

impl SheetConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frozen_rows(mut self, rows: u32) -> Self {
        self.frozen_rows = rows;
        self
    }

    pub fn with_frozen_columns(mut self, columns: u32) -> Self {
        self.frozen_columns = columns;
        self
    }

    pub fn with_columns(mut self, columns: Vec<ColumnConfig>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_grid_lines(mut self, show: bool) -> Self {
        self.show_grid_lines = show;
        self
    }
}

impl Default for SheetConfig {
    fn default() -> Self {
        SheetConfig {
            frozen_rows: 0,
            frozen_columns: 0,
            columns: Vec::new(),
            show_grid_lines: true,
        }
    }
}

/// Options for a single row
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RowOptions {
    /// Explicit 1-based row number; defaults to the previous row + 1
    pub number: Option<u32>,
    /// Height in points
    pub height: Option<f64>,
}

impl RowOptions {
    pub fn at(number: u32) -> Self {
        RowOptions {
            number: Some(number),
            height: None,
        }
    }

    pub fn with_height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }
}

/// Supported picture formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PictureFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Tiff,
}

impl PictureFormat {
    /// File extension used for the media part
    pub fn extension(&self) -> &'static str {
        match self {
            PictureFormat::Jpeg => "jpeg",
            PictureFormat::Png => "png",
            PictureFormat::Gif => "gif",
            PictureFormat::Bmp => "bmp",
            PictureFormat::Tiff => "tiff",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            PictureFormat::Jpeg => "image/jpeg",
            PictureFormat::Png => "image/png",
            PictureFormat::Gif => "image/gif",
            PictureFormat::Bmp => "image/bmp",
            PictureFormat::Tiff => "image/tiff",
        }
    }

    /// Whether `data` starts with this format's signature
    pub fn matches(&self, data: &[u8]) -> bool {
        match self {
            PictureFormat::Jpeg => data.starts_with(&[0xff, 0xd8, 0xff]),
            PictureFormat::Png => data.starts_with(b"\x89PNG\r\n\x1a\n"),
            PictureFormat::Gif => data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a"),
            PictureFormat::Bmp => data.starts_with(b"BM"),
            PictureFormat::Tiff => data.starts_with(b"II*\0") || data.starts_with(b"MM\0*"),
        }
    }
}

/// 0-based cell position a picture is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnchorCell {
    pub column: u32,
    pub row: u32,
}

impl AnchorCell {
    pub fn new(column: u32, row: u32) -> Self {
        AnchorCell { column, row }
    }
}

/// Picture size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PictureSize {
    pub width: u32,
    pub height: u32,
}

impl PictureSize {
    pub fn new(width: u32, height: u32) -> Self {
        PictureSize { width, height }
    }
}

/// How far a picture extends from its anchor: a pixel size or a second cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PictureExtent {
    Size(PictureSize),
    Cell(AnchorCell),
}

impl From<PictureSize> for PictureExtent {
    fn from(size: PictureSize) -> Self {
        PictureExtent::Size(size)
    }
}

impl From<AnchorCell> for PictureExtent {
    fn from(cell: AnchorCell) -> Self {
        PictureExtent::Cell(cell)
    }
}
