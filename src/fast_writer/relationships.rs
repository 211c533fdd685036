//! Relationship parts (`*.rels`)

use super::compression::CompressionBackend;
use super::xml_writer::XmlWriter;
use crate::error::Result;
use indexmap::IndexMap;

const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RelKind {
    OfficeDocument,
    CoreProperties,
    ExtendedProperties,
    Worksheet,
    Styles,
    SharedStrings,
    Drawing,
    Image,
    Hyperlink,
}

impl RelKind {
    fn type_uri(self) -> &'static str {
        match self {
            RelKind::OfficeDocument => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument"
            }
            RelKind::CoreProperties => {
                "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties"
            }
            RelKind::ExtendedProperties => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties"
            }
            RelKind::Worksheet => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet"
            }
            RelKind::Styles => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles"
            }
            RelKind::SharedStrings => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings"
            }
            RelKind::Drawing => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing"
            }
            RelKind::Image => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image"
            }
            RelKind::Hyperlink => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink"
            }
        }
    }

    fn is_external(self) -> bool {
        matches!(self, RelKind::Hyperlink)
    }
}

/// Relationships owned by one part; ids are `rId1`, `rId2`, ... in insertion order
///
/// Targets are unique within a part, so adding a known target returns its
/// existing id.
#[derive(Debug, Default)]
pub(crate) struct Relationships {
    entries: IndexMap<String, RelKind>,
}

impl Relationships {
    pub fn new() -> Self {
        Self::default()
    }

    /// Numeric part of the relationship id for `target`
    pub fn add(&mut self, kind: RelKind, target: &str) -> u32 {
        let index = match self.entries.get_index_of(target) {
            Some(index) => index,
            None => self.entries.insert_full(target.to_string(), kind).0,
        };
        index as u32 + 1
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn write_xml<B: CompressionBackend>(&self, writer: &mut XmlWriter<B>) -> Result<()> {
        writer.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n")?;
        writer.start_element("Relationships")?;
        writer.attribute("xmlns", RELATIONSHIPS_NS)?;
        writer.close_start_tag()?;

        for (i, (target, kind)) in self.entries.iter().enumerate() {
            writer.start_element("Relationship")?;
            write_rel_id_attribute(writer, "Id", i as u32 + 1)?;
            writer.attribute("Type", kind.type_uri())?;
            writer.attribute("Target", target)?;
            if kind.is_external() {
                writer.attribute("TargetMode", "External")?;
            }
            writer.close_empty_tag()?;
        }

        writer.end_element("Relationships")
    }
}

/// Write ` name="rIdN"`
pub(crate) fn write_rel_id_attribute<B: CompressionBackend>(
    writer: &mut XmlWriter<B>,
    name: &str,
    id: u32,
) -> Result<()> {
    writer.write_token(b" ")?;
    writer.write_str(name)?;
    writer.write_token(b"=\"rId")?;
    writer.write_int(id)?;
    writer.write_token(b"\"")
}
