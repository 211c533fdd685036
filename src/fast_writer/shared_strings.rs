//! Shared strings table for string deduplication
//!
//! Two phases: a [`SharedStringTableBuilder`] interns strings up front and
//! hands out [`SharedStringRef`]s, then `build()` freezes it into a
//! [`SharedStringTable`] that is given to the writer. Inside the writer the
//! table seeds a runtime set that can still grow through
//! `add_cell_with_shared_string`.

use super::compression::CompressionBackend;
use super::next_table_id;
use super::xml_writer::XmlWriter;
use crate::error::{ExcelError, Result};
use indexmap::IndexSet;

/// Reference to a string interned by a [`SharedStringTableBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SharedStringRef {
    table: u32,
    index: u32,
}

impl SharedStringRef {
    /// 0-based position of the string in its table
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// Accumulates strings and assigns indices in first-occurrence order
#[derive(Debug)]
pub struct SharedStringTableBuilder {
    id: u32,
    strings: IndexSet<String>,
}

impl SharedStringTableBuilder {
    pub fn new() -> Self {
        SharedStringTableBuilder {
            id: next_table_id(),
            strings: IndexSet::new(),
        }
    }

    /// Return the reference of `value`, interning it if it is new
    pub fn get_or_add(&mut self, value: &str) -> SharedStringRef {
        let index = match self.strings.get_index_of(value) {
            Some(index) => index,
            None => self.strings.insert_full(value.to_string()).0,
        };
        SharedStringRef {
            table: self.id,
            index: index as u32,
        }
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Freeze the builder into an immutable table
    pub fn build(self) -> SharedStringTable {
        SharedStringTable {
            id: self.id,
            strings: self.strings.into_iter().collect(),
        }
    }
}

impl Default for SharedStringTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable shared-string table produced by a builder
#[derive(Debug, Clone)]
pub struct SharedStringTable {
    id: u32,
    strings: Vec<String>,
}

impl SharedStringTable {
    pub fn get(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }
}

/// Per-document shared strings: the supplied table plus runtime additions
pub(crate) struct SharedStrings {
    table_id: Option<u32>,
    seeded: usize,
    strings: IndexSet<String>,
    references: u64,
    max_unique_strings: usize,
}

impl SharedStrings {
    pub fn new(table: Option<SharedStringTable>, max_unique_strings: usize) -> Self {
        let (table_id, strings) = match table {
            Some(table) => (Some(table.id), table.strings.into_iter().collect()),
            None => (None, IndexSet::new()),
        };
        SharedStrings {
            table_id,
            seeded: strings.len(),
            strings,
            references: 0,
            max_unique_strings,
        }
    }

    /// Resolve a builder reference; it must come from this document's table
    pub fn resolve(&mut self, reference: SharedStringRef) -> Result<u32> {
        if self.table_id != Some(reference.table) || reference.index as usize >= self.seeded {
            return Err(ExcelError::encoding(format!(
                "shared string reference {} does not belong to this document's table",
                reference.index
            )));
        }
        self.references += 1;
        Ok(reference.index)
    }

    /// Intern a string at write time
    ///
    /// Returns `None` once the unique-string cap is reached and the string is
    /// not already known; the caller then writes it inline.
    pub fn add_string(&mut self, value: &str) -> Option<u32> {
        let index = match self.strings.get_index_of(value) {
            Some(index) => index,
            None if self.strings.len() < self.max_unique_strings.max(self.seeded) => {
                self.strings.insert_full(value.to_string()).0
            }
            None => return None,
        };
        self.references += 1;
        Some(index as u32)
    }

    /// Get number of unique strings
    pub fn count(&self) -> usize {
        self.strings.len()
    }

    /// Write shared strings XML
    pub fn write_xml<B: CompressionBackend>(&self, writer: &mut XmlWriter<B>) -> Result<()> {
        writer.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n")?;

        writer.start_element("sst")?;
        writer.attribute(
            "xmlns",
            "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
        )?;
        writer.attribute_int("count", self.references)?;
        writer.attribute_int("uniqueCount", self.strings.len())?;
        writer.close_start_tag()?;

        for s in &self.strings {
            writer.write_str("<si>")?;
            if super::cell_encoder::needs_space_preserve(s) {
                writer.write_str("<t xml:space=\"preserve\">")?;
            } else {
                writer.write_str("<t>")?;
            }
            writer.write_cell_text(s)?;
            writer.write_str("</t></si>")?;
        }

        writer.end_element("sst")
    }
}
