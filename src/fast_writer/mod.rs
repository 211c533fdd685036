//! Streaming XLSX engine
//!
//! This module holds everything below the public writers:
//! - a fixed-capacity XML output channel
//! - a forward-only ZIP layer with data-descriptor framing
//! - cell value encoders writing straight into the channel
//! - shared-string and style interning tables
//! - part generators for worksheets, drawings and the package skeleton
//!
//! The [`FastWorkbook`] sequencer ties these together. It never touches the
//! output sink itself; produced bytes are staged in the ZIP layer and drained
//! by [`crate::ExcelWriter`] or its async counterpart.

pub mod cell_encoder;
pub mod compression;
pub(crate) mod drawing;
pub mod memory;
pub(crate) mod relationships;
pub mod shared_strings;
pub mod streaming_zip_writer;
pub mod styles;
pub mod workbook;
pub(crate) mod worksheet;
pub mod xml_writer;

use std::sync::atomic::{AtomicU32, Ordering};

pub use compression::{CompressionBackend, Deflate, EntryCompressor, Stored};
pub use memory::MemoryProfile;
pub use shared_strings::{SharedStringRef, SharedStringTable, SharedStringTableBuilder};
pub use streaming_zip_writer::StreamingZipWriter;
pub use styles::{StyleRef, StyleSheet, StyleSheetBuilder};
pub use workbook::FastWorkbook;

/// Identity for interning tables, so references from one document's
/// builders are rejected by another document
pub(crate) fn next_table_id() -> u32 {
    static NEXT: AtomicU32 = AtomicU32::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}
