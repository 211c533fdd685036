//! # xlsxstream
//!
//! Streaming XLSX writer: rows go out as they arrive, never as an in-memory
//! document tree.
//!
//! ## Features
//!
//! - **Bounded memory**: one fixed-size XML buffer plus the ZIP bookkeeping
//! - **Forward-only ZIP**: data-descriptor framing, works on non-seekable sinks
//! - **Typed cells**: integers, floats, booleans, dates, inline and shared strings,
//!   hyperlinks
//! - **Interning tables**: shared strings and styles deduplicated up front
//! - **Pictures**: JPEG, PNG, GIF, BMP and TIFF with one- or two-cell anchors
//! - **Blocking or async**: [`ExcelWriter`] for `std::io::Write`,
//!   `AsyncExcelWriter` for `tokio::io::AsyncWrite` (feature `async`)
//! - **Pluggable compression**: deflate by default, or any [`CompressionBackend`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use xlsxstream::{CellValue, ExcelWriter, SheetConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut writer = ExcelWriter::create("output.xlsx")?;
//!
//! writer.start_sheet_with_config("Report", &SheetConfig::new().with_frozen_rows(1))?;
//! writer.write_row([CellValue::String("Name"), CellValue::String("Score")])?;
//! writer.write_row([CellValue::String("Alice"), CellValue::Float(93.5)])?;
//!
//! writer.complete()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Shared strings and styles
//!
//! ```rust,no_run
//! use xlsxstream::{
//!     ExcelWriter, Font, SharedStringTableBuilder, Style, StyleSheetBuilder, WriterOptions,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut strings = SharedStringTableBuilder::new();
//! let north = strings.get_or_add("North");
//!
//! let mut styles = StyleSheetBuilder::new();
//! let bold = styles.get_or_add(Style::new().with_font(Font::new().bold()));
//!
//! let options = WriterOptions::new()
//!     .with_shared_strings(strings.build())
//!     .with_styles(styles.build());
//! let mut writer = ExcelWriter::with_options(std::io::sink(), options);
//!
//! writer.start_sheet("Sales")?;
//! writer.start_row()?;
//! writer.add_styled_cell(north, bold)?;
//! writer.add_cell(1200i64)?;
//! writer.complete()?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "async")]
pub mod async_writer;
pub mod error;
pub mod fast_writer;
pub mod types;
pub mod writer;

#[cfg(feature = "async")]
pub use async_writer::AsyncExcelWriter;
pub use error::{ExcelError, Result};
pub use fast_writer::cell_encoder::CellValueType;
pub use fast_writer::compression::{CompressionBackend, Deflate, EntryCompressor, Stored};
pub use fast_writer::memory::MemoryProfile;
pub use fast_writer::shared_strings::{SharedStringRef, SharedStringTable, SharedStringTableBuilder};
pub use fast_writer::styles::{
    Alignment, Border, BorderStyle, Borders, Color, Fill, FillPattern, Font, HorizontalAlignment,
    Style, StyleRef, StyleSheet, StyleSheetBuilder, VerticalAlignment,
};
pub use types::{
    AnchorCell, CellValue, ColumnConfig, Hyperlink, PictureExtent, PictureFormat, PictureSize,
    RowOptions, SheetConfig,
};
pub use writer::{ExcelWriter, WriterOptions};
