//! Embedded pictures
//!
//! A worksheet part is still streaming while pictures are added, and ZIP
//! entries cannot interleave, so pictures are kept per sheet and written out
//! once the sheet closes: one media entry per picture, then the sheet's
//! drawing part and its relationships.

use super::cell_encoder::{MAX_COLUMN_INDEX, MAX_ROW_NUMBER};
use super::compression::CompressionBackend;
use super::relationships::{write_rel_id_attribute, RelKind, Relationships};
use super::xml_writer::XmlWriter;
use crate::error::{ExcelError, Result};
use crate::types::{AnchorCell, PictureExtent, PictureFormat};
use indexmap::IndexSet;

/// English Metric Units per screen pixel at 96 DPI
pub const EMU_PER_PIXEL: u64 = 9525;

const SPREADSHEET_DRAWING_NS: &str =
    "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing";
const DRAWING_MAIN_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

struct Picture {
    data: Vec<u8>,
    format: PictureFormat,
    from: AnchorCell,
    extent: PictureExtent,
}

/// Package-wide picture bookkeeping: media and drawing numbering plus the
/// image formats that need a content-type default
#[derive(Debug, Default)]
pub(crate) struct PackageMedia {
    images: u32,
    drawings: u32,
    formats: IndexSet<PictureFormat>,
}

impl PackageMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the number of the next drawing part
    pub fn next_drawing(&mut self) -> u32 {
        self.drawings += 1;
        self.drawings
    }

    fn next_image(&mut self, format: PictureFormat) -> u32 {
        self.formats.insert(format);
        self.images += 1;
        self.images
    }

    pub fn drawing_count(&self) -> u32 {
        self.drawings
    }

    pub fn image_count(&self) -> u32 {
        self.images
    }

    pub fn formats(&self) -> impl Iterator<Item = PictureFormat> + '_ {
        self.formats.iter().copied()
    }
}

/// Pictures attached to one sheet
#[derive(Default)]
pub(crate) struct SheetDrawing {
    pictures: Vec<Picture>,
}

impl SheetDrawing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and keep a picture until the sheet closes
    pub fn add(
        &mut self,
        data: &[u8],
        format: PictureFormat,
        from: AnchorCell,
        extent: PictureExtent,
    ) -> Result<()> {
        if !format.matches(data) {
            return Err(ExcelError::encoding(format!(
                "picture data is not a {} image",
                format.extension()
            )));
        }
        check_anchor(from)?;
        match extent {
            PictureExtent::Size(size) => {
                if size.width == 0 || size.height == 0 {
                    return Err(ExcelError::encoding(format!(
                        "picture size {}x{} must be positive",
                        size.width, size.height
                    )));
                }
            }
            PictureExtent::Cell(to) => {
                check_anchor(to)?;
                if to.column < from.column || to.row < from.row {
                    return Err(ExcelError::encoding(format!(
                        "second anchor ({}, {}) precedes first anchor ({}, {})",
                        to.column, to.row, from.column, from.row
                    )));
                }
            }
        }

        self.pictures.push(Picture {
            data: data.to_vec(),
            format,
            from,
            extent,
        });
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.pictures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pictures.len()
    }

    /// Write media entries, `xl/drawings/drawingN.xml` and its relationships
    pub fn write_parts<B: CompressionBackend>(
        &self,
        writer: &mut XmlWriter<B>,
        drawing_number: u32,
        media: &mut PackageMedia,
    ) -> Result<()> {
        log::debug!(
            "writing drawing {} with {} pictures",
            drawing_number,
            self.len()
        );
        let mut rels = Relationships::new();
        let mut embeds = Vec::with_capacity(self.len());

        for picture in &self.pictures {
            let number = media.next_image(picture.format);
            let extension = picture.format.extension();
            writer.start_part(&format!("xl/media/image{}.{}", number, extension))?;
            writer.write_raw(&picture.data)?;
            writer.finish_part()?;
            embeds.push(rels.add(
                RelKind::Image,
                &format!("../media/image{}.{}", number, extension),
            ));
        }

        writer.start_part(&format!("xl/drawings/drawing{}.xml", drawing_number))?;
        self.write_xml(writer, &embeds)?;
        writer.finish_part()?;

        writer.start_part(&format!(
            "xl/drawings/_rels/drawing{}.xml.rels",
            drawing_number
        ))?;
        rels.write_xml(writer)?;
        writer.finish_part()
    }

    fn write_xml<B: CompressionBackend>(
        &self,
        writer: &mut XmlWriter<B>,
        embeds: &[u32],
    ) -> Result<()> {
        writer.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n")?;
        writer.start_element("xdr:wsDr")?;
        writer.attribute("xmlns:xdr", SPREADSHEET_DRAWING_NS)?;
        writer.attribute("xmlns:a", DRAWING_MAIN_NS)?;
        writer.close_start_tag()?;

        for (i, (picture, &embed)) in self.pictures.iter().zip(embeds).enumerate() {
            let anchor = match picture.extent {
                PictureExtent::Size(_) => "xdr:oneCellAnchor",
                PictureExtent::Cell(_) => "xdr:twoCellAnchor",
            };
            writer.start_element(anchor)?;
            if let PictureExtent::Cell(_) = picture.extent {
                writer.attribute("editAs", "oneCell")?;
            }
            writer.close_start_tag()?;

            write_marker(writer, "xdr:from", picture.from)?;
            let (cx, cy) = match picture.extent {
                PictureExtent::Size(size) => {
                    let cx = size.width as u64 * EMU_PER_PIXEL;
                    let cy = size.height as u64 * EMU_PER_PIXEL;
                    writer.start_element("xdr:ext")?;
                    writer.attribute_int("cx", cx)?;
                    writer.attribute_int("cy", cy)?;
                    writer.close_empty_tag()?;
                    (cx, cy)
                }
                PictureExtent::Cell(to) => {
                    write_marker(writer, "xdr:to", to)?;
                    (0, 0)
                }
            };

            // Shape ids start at 2; 1 is reserved for the drawing itself
            let id = i + 2;
            writer.write_str("<xdr:pic><xdr:nvPicPr>")?;
            writer.start_element("xdr:cNvPr")?;
            writer.attribute_int("id", id)?;
            writer.write_str(" name=\"Picture ")?;
            writer.write_int(i + 1)?;
            writer.write_token(b"\"")?;
            writer.close_empty_tag()?;
            writer.write_str(
                "<xdr:cNvPicPr><a:picLocks noChangeAspect=\"1\"/></xdr:cNvPicPr></xdr:nvPicPr>",
            )?;

            writer.write_str("<xdr:blipFill>")?;
            writer.start_element("a:blip")?;
            writer.attribute("xmlns:r", RELATIONSHIPS_NS)?;
            write_rel_id_attribute(writer, "r:embed", embed)?;
            writer.close_empty_tag()?;
            writer.write_str("<a:stretch><a:fillRect/></a:stretch></xdr:blipFill>")?;

            writer.write_str("<xdr:spPr><a:xfrm><a:off x=\"0\" y=\"0\"/>")?;
            writer.start_element("a:ext")?;
            writer.attribute_int("cx", cx)?;
            writer.attribute_int("cy", cy)?;
            writer.close_empty_tag()?;
            writer.write_str(
                "</a:xfrm><a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></xdr:spPr></xdr:pic>",
            )?;

            writer.write_str("<xdr:clientData/>")?;
            writer.end_element(anchor)?;
        }

        writer.end_element("xdr:wsDr")
    }
}

fn check_anchor(cell: AnchorCell) -> Result<()> {
    if cell.column > MAX_COLUMN_INDEX || cell.row >= MAX_ROW_NUMBER {
        return Err(ExcelError::encoding(format!(
            "anchor ({}, {}) lies outside the sheet",
            cell.column, cell.row
        )));
    }
    Ok(())
}

fn write_marker<B: CompressionBackend>(
    writer: &mut XmlWriter<B>,
    name: &str,
    cell: AnchorCell,
) -> Result<()> {
    writer.start_element(name)?;
    writer.close_start_tag()?;
    writer.write_str("<xdr:col>")?;
    writer.write_int(cell.column)?;
    writer.write_str("</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>")?;
    writer.write_int(cell.row)?;
    writer.write_str("</xdr:row><xdr:rowOff>0</xdr:rowOff>")?;
    writer.end_element(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PictureSize;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_rejects_mismatched_format() {
        let mut drawing = SheetDrawing::new();
        let err = drawing
            .add(
                PNG,
                PictureFormat::Jpeg,
                AnchorCell::new(0, 0),
                PictureSize::new(10, 10).into(),
            )
            .unwrap_err();
        assert!(matches!(err, ExcelError::Encoding(_)));
        assert!(drawing.is_empty());
    }

    #[test]
    fn test_anchor_geometry_checks() {
        let mut drawing = SheetDrawing::new();
        let from = AnchorCell::new(2, 2);

        assert!(drawing
            .add(PNG, PictureFormat::Png, from, AnchorCell::new(1, 5).into())
            .is_err());
        assert!(drawing
            .add(PNG, PictureFormat::Png, from, PictureSize::new(0, 10).into())
            .is_err());
        assert!(drawing
            .add(
                PNG,
                PictureFormat::Png,
                AnchorCell::new(MAX_COLUMN_INDEX + 1, 0),
                PictureSize::new(1, 1).into()
            )
            .is_err());

        drawing
            .add(PNG, PictureFormat::Png, from, AnchorCell::new(4, 6).into())
            .unwrap();
        drawing
            .add(PNG, PictureFormat::Png, from, PictureSize::new(64, 32).into())
            .unwrap();
        assert_eq!(drawing.len(), 2);
    }

    #[test]
    fn test_media_numbering_is_package_wide() {
        let mut media = PackageMedia::new();
        assert_eq!(media.next_image(PictureFormat::Png), 1);
        assert_eq!(media.next_image(PictureFormat::Jpeg), 2);
        assert_eq!(media.next_image(PictureFormat::Png), 3);
        assert_eq!(media.next_drawing(), 1);
        assert_eq!(media.image_count(), 3);
        assert_eq!(
            media.formats().collect::<Vec<_>>(),
            vec![PictureFormat::Png, PictureFormat::Jpeg]
        );
    }
}
