//! Stateless encoders turning cell values into their textual XML form
//!
//! Each encoder formats into a small stack buffer so the result can be handed
//! to the output channel as one unsplittable token.

use crate::error::{ExcelError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// Highest 0-based column index allowed by the format (XFD)
pub const MAX_COLUMN_INDEX: u32 = 16_383;
/// Highest 1-based row number allowed by the format
pub const MAX_ROW_NUMBER: u32 = 1_048_576;

/// Days from 0001-01-01 (day 1) to 1899-12-30, the OLE Automation epoch
const OLE_EPOCH_DAYS_FROM_CE: i64 = 693_594;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Value-type tag of a written cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellValueType {
    Number,
    Integer,
    Date,
    Boolean,
    InlineString,
    SharedString,
    Empty,
}

impl CellValueType {
    /// Value of the `t` attribute, if the type needs one
    pub fn type_attribute(self) -> Option<&'static [u8]> {
        match self {
            CellValueType::Number | CellValueType::Integer | CellValueType::Date => None,
            CellValueType::Boolean => Some(b"b"),
            CellValueType::InlineString => Some(b"inlineStr"),
            CellValueType::SharedString => Some(b"s"),
            CellValueType::Empty => None,
        }
    }
}

/// Column letters for a 0-based column index, e.g. 0 -> "A", 27 -> "AB"
pub struct ColumnName {
    buf: [u8; 3],
    start: usize,
}

impl ColumnName {
    pub fn new(column: u32) -> Self {
        let mut buf = [0u8; 3];
        let mut start = 3;
        let mut n = column.min(MAX_COLUMN_INDEX) + 1;
        while n > 0 {
            let rem = (n - 1) % 26;
            start -= 1;
            buf[start] = b'A' + rem as u8;
            n = (n - 1) / 26;
        }
        ColumnName { buf, start }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[self.start..]
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII letters are ever written
        std::str::from_utf8(self.as_bytes()).unwrap_or("A")
    }
}

/// Culture-invariant float formatting via ryu
///
/// Integral values drop the trailing ".0" so `3.0` is written as `3`.
pub struct FloatFormatter {
    inner: ryu::Buffer,
}

impl FloatFormatter {
    pub fn new() -> Self {
        FloatFormatter {
            inner: ryu::Buffer::new(),
        }
    }

    pub fn format(&mut self, value: f64) -> Result<&str> {
        if !value.is_finite() {
            return Err(ExcelError::encoding(format!(
                "non-finite number {} cannot be stored in a cell",
                value
            )));
        }
        let text = self.inner.format_finite(value);
        Ok(text.strip_suffix(".0").unwrap_or(text))
    }
}

impl Default for FloatFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// OLE Automation date serial: whole days since 1899-12-30 plus the time of
/// day as a fraction, truncated to millisecond precision
pub fn ole_date_serial(value: &NaiveDateTime) -> Result<f64> {
    let days = ole_day_index(&value.date())?;
    let time = value.time();
    // Leap-second nanos (>= 1e9) are folded into the last millisecond
    let millis = (time.nanosecond() / 1_000_000).min(999);
    let ms_of_day = time.num_seconds_from_midnight() as u64 * 1000 + millis as u64;
    Ok(days as f64 + ms_of_day as f64 / MILLIS_PER_DAY)
}

/// Whole-day OLE serial of a calendar date
pub fn ole_day_index(value: &NaiveDate) -> Result<i64> {
    let days = value.num_days_from_ce() as i64 - OLE_EPOCH_DAYS_FROM_CE;
    if days < 0 {
        return Err(ExcelError::encoding(format!(
            "date {} precedes the 1899-12-30 epoch",
            value
        )));
    }
    if value.year() > 9999 {
        return Err(ExcelError::encoding(format!(
            "date {} is past 9999-12-31",
            value
        )));
    }
    Ok(days)
}

/// `_xHHHH_` escape used by spreadsheet XML for control characters
pub fn control_escape(byte: u8) -> [u8; 7] {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    [
        b'_',
        b'x',
        b'0',
        b'0',
        HEX[(byte >> 4) as usize],
        HEX[(byte & 0x0f) as usize],
        b'_',
    ]
}

/// Whether a text needs `xml:space="preserve"` to keep its outer whitespace
pub fn needs_space_preserve(text: &str) -> bool {
    let bytes = text.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => is_xml_space(*first) || is_xml_space(*last),
        _ => false,
    }
}

fn is_xml_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}
