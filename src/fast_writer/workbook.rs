//! Document sequencer
//!
//! [`FastWorkbook`] enforces the call order `start_sheet → start_row → add_cell`
//! and routes every operation into the worksheet generator. On `complete()` it
//! writes the package skeleton: shared strings, styles, the workbook manifest,
//! document properties, relationships and content types.
//!
//! The workbook never performs sink IO. Bytes produced by the ZIP layer are
//! exposed through [`FastWorkbook::pending`] and must be drained by the owner.

use chrono::NaiveDateTime;

use super::compression::CompressionBackend;
use super::drawing::PackageMedia;
use super::relationships::{write_rel_id_attribute, RelKind, Relationships};
use super::shared_strings::SharedStrings;
use super::streaming_zip_writer::StreamingZipWriter;
use super::styles::{StyleRef, StyleSheet};
use super::worksheet::FastWorksheet;
use super::xml_writer::XmlWriter;
use crate::error::{ExcelError, Result};
use crate::types::{AnchorCell, CellValue, PictureExtent, PictureFormat, RowOptions, SheetConfig};
use crate::writer::WriterOptions;

const MAX_SHEET_NAME_UNITS: usize = 31;
const INVALID_SHEET_NAME_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];
const APPLICATION: &str = "xlsxstream";

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";
const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const CT_WORKBOOK: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
const CT_WORKSHEET: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
const CT_STYLES: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";
const CT_SHARED_STRINGS: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml";
const CT_DRAWING: &str = "application/vnd.openxmlformats-officedocument.drawing+xml";
const CT_CORE: &str = "application/vnd.openxmlformats-package.core-properties+xml";
const CT_APP: &str = "application/vnd.openxmlformats-officedocument.extended-properties+xml";
const CT_RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    SheetOpen,
    RowOpen,
    Complete,
    Failed,
}

/// Streaming workbook over a compression backend
pub struct FastWorkbook<B: CompressionBackend> {
    writer: XmlWriter<B>,
    state: State,
    sheets: Vec<String>,
    current: Option<FastWorksheet>,
    shared_strings: SharedStrings,
    styles: StyleSheet,
    media: PackageMedia,
    modified: NaiveDateTime,
}

impl<B: CompressionBackend> FastWorkbook<B> {
    pub fn new(backend: B, options: WriterOptions) -> Self {
        let modified = options.timestamp();
        let zip = StreamingZipWriter::new(backend, modified);
        FastWorkbook {
            writer: XmlWriter::new(zip, options.buffer_capacity),
            state: State::Initial,
            sheets: Vec::new(),
            current: None,
            shared_strings: SharedStrings::new(options.shared_strings, options.max_unique_strings),
            styles: options.styles.unwrap_or_default(),
            media: PackageMedia::new(),
            modified,
        }
    }

    /// Close the open sheet, if any, and start a new worksheet part
    pub fn start_sheet(&mut self, name: &str, config: &SheetConfig) -> Result<()> {
        self.run(|wb| {
            validate_sheet_name(name, &wb.sheets)?;
            wb.close_sheet()?;

            let number = wb.sheets.len() as u32 + 1;
            let sheet = FastWorksheet::start(&mut wb.writer, number, config)?;
            wb.sheets.push(name.to_string());
            wb.current = Some(sheet);
            wb.state = State::SheetOpen;
            log::debug!("opened sheet {} '{}'", number, name);
            Ok(())
        })
    }

    /// Start a row; without an explicit number it follows the previous row
    pub fn start_row(&mut self, options: RowOptions) -> Result<()> {
        self.run(|wb| {
            open_sheet(&mut wb.current)?.start_row(&mut wb.writer, options)?;
            wb.state = State::RowOpen;
            Ok(())
        })
    }

    /// Leave `count` rows empty before the next row
    pub fn add_empty_rows(&mut self, count: u32) -> Result<()> {
        self.run(|wb| {
            open_sheet(&mut wb.current)?.add_empty_rows(&mut wb.writer, count)?;
            wb.state = State::SheetOpen;
            Ok(())
        })
    }

    /// Write a cell in the next column of the open row
    pub fn add_cell(&mut self, value: CellValue<'_>, style: Option<StyleRef>) -> Result<()> {
        self.place_cell(None, value, style)
    }

    /// Write a cell at an explicit 0-based column past the last one written
    pub fn add_cell_at(
        &mut self,
        column: u32,
        value: CellValue<'_>,
        style: Option<StyleRef>,
    ) -> Result<()> {
        self.place_cell(Some(column), value, style)
    }

    /// Write text as a shared-string cell, interning it at write time
    pub fn add_cell_with_shared_string(&mut self, text: &str, style: Option<StyleRef>) -> Result<()> {
        self.run(|wb| {
            let xf = resolve_style(&wb.styles, style)?;
            open_sheet(&mut wb.current)?.add_shared_text(
                &mut wb.writer,
                None,
                text,
                xf,
                &mut wb.shared_strings,
            )
        })
    }

    /// Leave `count` cells empty in the open row
    pub fn add_empty_cells(&mut self, count: u32) -> Result<()> {
        self.run(|wb| open_sheet(&mut wb.current)?.add_empty_cells(count))
    }

    /// Attach a picture to the open sheet
    pub fn add_picture(
        &mut self,
        data: &[u8],
        format: PictureFormat,
        anchor: AnchorCell,
        extent: impl Into<PictureExtent>,
    ) -> Result<()> {
        let extent = extent.into();
        self.run(|wb| open_sheet(&mut wb.current)?.add_picture(data, format, anchor, extent))
    }

    /// Close the open sheet and write the remaining package parts
    ///
    /// Must be called exactly once; the archive is unreadable without it.
    pub fn complete(&mut self) -> Result<()> {
        self.run(|wb| {
            wb.close_sheet()?;
            if wb.sheets.is_empty() {
                return Err(ExcelError::sequence(
                    "cannot complete a document without sheets",
                ));
            }

            wb.writer.start_part("xl/sharedStrings.xml")?;
            wb.shared_strings.write_xml(&mut wb.writer)?;
            wb.writer.start_part("xl/styles.xml")?;
            wb.styles.write_xml(&mut wb.writer)?;
            wb.write_workbook_xml()?;
            wb.write_workbook_rels()?;
            wb.write_core_props()?;
            wb.write_app_props()?;
            wb.write_root_rels()?;
            wb.write_content_types()?;
            wb.writer.finish_part()?;
            wb.writer.zip_mut().finish()?;

            wb.state = State::Complete;
            log::debug!(
                "completed document: {} sheets, {} images, {} entries, {} bytes",
                wb.sheets.len(),
                wb.media.image_count(),
                wb.writer.zip().entry_count(),
                wb.writer.zip().bytes_written()
            );
            Ok(())
        })
    }

    /// Bytes ready for the sink
    pub fn pending(&self) -> &[u8] {
        self.writer.zip().pending()
    }

    /// Drop the pending bytes once they have been written to the sink
    pub fn clear_pending(&mut self) {
        self.writer.zip_mut().clear_pending();
    }

    /// Mark the writer unusable, e.g. after the sink failed
    pub fn poison(&mut self) {
        if self.state != State::Complete {
            self.state = State::Failed;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == State::Complete
    }

    pub fn is_row_open(&self) -> bool {
        self.state == State::RowOpen
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Total package bytes produced so far, drained or not
    pub fn bytes_written(&self) -> u64 {
        self.writer.zip().bytes_written()
    }

    fn place_cell(
        &mut self,
        column: Option<u32>,
        value: CellValue<'_>,
        style: Option<StyleRef>,
    ) -> Result<()> {
        self.run(|wb| {
            let xf = resolve_style(&wb.styles, style)?;
            open_sheet(&mut wb.current)?.add_cell(
                &mut wb.writer,
                column,
                value,
                xf,
                &mut wb.shared_strings,
            )
        })
    }

    /// Run an operation; any error leaves the workbook failed
    fn run<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        match self.state {
            State::Complete => return Err(ExcelError::sequence("document is already complete")),
            State::Failed => {
                return Err(ExcelError::sequence(
                    "writer is unusable after a previous failure",
                ))
            }
            State::Initial | State::SheetOpen | State::RowOpen => {}
        }
        let result = op(self);
        if result.is_err() {
            self.state = State::Failed;
        }
        result
    }

    fn close_sheet(&mut self) -> Result<()> {
        if let Some(sheet) = self.current.take() {
            log::debug!(
                "closing sheet {} after {} rows, last row {}",
                sheet.number(),
                sheet.rows_written(),
                sheet.current_row()
            );
            sheet.finish(&mut self.writer, &mut self.media)?;
        }
        Ok(())
    }

    fn write_workbook_xml(&mut self) -> Result<()> {
        let w = &mut self.writer;
        w.start_part("xl/workbook.xml")?;
        w.write_str(XML_DECLARATION)?;
        w.start_element("workbook")?;
        w.attribute("xmlns", MAIN_NS)?;
        w.attribute("xmlns:r", RELATIONSHIPS_NS)?;
        w.close_start_tag()?;
        w.write_str("<bookViews><workbookView activeTab=\"0\"/></bookViews><sheets>")?;
        for (i, name) in self.sheets.iter().enumerate() {
            w.start_element("sheet")?;
            w.attribute("name", name)?;
            w.attribute_int("sheetId", i + 1)?;
            write_rel_id_attribute(w, "r:id", i as u32 + 1)?;
            w.close_empty_tag()?;
        }
        w.write_str("</sheets>")?;
        w.end_element("workbook")
    }

    fn write_workbook_rels(&mut self) -> Result<()> {
        let mut rels = Relationships::new();
        for number in 1..=self.sheets.len() {
            rels.add(
                RelKind::Worksheet,
                &format!("worksheets/sheet{}.xml", number),
            );
        }
        rels.add(RelKind::Styles, "styles.xml");
        rels.add(RelKind::SharedStrings, "sharedStrings.xml");

        self.writer.start_part("xl/_rels/workbook.xml.rels")?;
        rels.write_xml(&mut self.writer)
    }

    fn write_root_rels(&mut self) -> Result<()> {
        let mut rels = Relationships::new();
        rels.add(RelKind::OfficeDocument, "xl/workbook.xml");
        rels.add(RelKind::CoreProperties, "docProps/core.xml");
        rels.add(RelKind::ExtendedProperties, "docProps/app.xml");

        self.writer.start_part("_rels/.rels")?;
        rels.write_xml(&mut self.writer)
    }

    fn write_core_props(&mut self) -> Result<()> {
        let stamp = self.modified.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let w = &mut self.writer;
        w.start_part("docProps/core.xml")?;
        w.write_str(XML_DECLARATION)?;
        w.write_str(
            "<cp:coreProperties \
             xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" \
             xmlns:dc=\"http://purl.org/dc/elements/1.1/\" \
             xmlns:dcterms=\"http://purl.org/dc/terms/\" \
             xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">",
        )?;
        w.write_str("<dc:creator>")?;
        w.write_str(APPLICATION)?;
        w.write_str("</dc:creator><dcterms:created xsi:type=\"dcterms:W3CDTF\">")?;
        w.write_str(&stamp)?;
        w.write_str("</dcterms:created><dcterms:modified xsi:type=\"dcterms:W3CDTF\">")?;
        w.write_str(&stamp)?;
        w.write_str("</dcterms:modified></cp:coreProperties>")
    }

    fn write_app_props(&mut self) -> Result<()> {
        let w = &mut self.writer;
        w.start_part("docProps/app.xml")?;
        w.write_str(XML_DECLARATION)?;
        w.write_str(
            "<Properties xmlns=\"http://schemas.openxmlformats.org/officeDocument/2006/extended-properties\">",
        )?;
        w.write_str("<Application>")?;
        w.write_str(APPLICATION)?;
        w.write_str("</Application><DocSecurity>0</DocSecurity><ScaleCrop>false</ScaleCrop>")?;
        w.write_str("<LinksUpToDate>false</LinksUpToDate><SharedDoc>false</SharedDoc>")?;
        w.write_str("</Properties>")
    }

    fn write_content_types(&mut self) -> Result<()> {
        let w = &mut self.writer;
        w.start_part("[Content_Types].xml")?;
        w.write_str(XML_DECLARATION)?;
        w.write_str("<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">")?;

        write_default(w, "rels", CT_RELATIONSHIPS)?;
        write_default(w, "xml", "application/xml")?;
        for format in self.media.formats() {
            write_default(w, format.extension(), format.content_type())?;
        }

        write_override(w, "/xl/workbook.xml", CT_WORKBOOK)?;
        for number in 1..=self.sheets.len() {
            write_override(w, &format!("/xl/worksheets/sheet{}.xml", number), CT_WORKSHEET)?;
        }
        for number in 1..=self.media.drawing_count() {
            write_override(w, &format!("/xl/drawings/drawing{}.xml", number), CT_DRAWING)?;
        }
        write_override(w, "/xl/styles.xml", CT_STYLES)?;
        write_override(w, "/xl/sharedStrings.xml", CT_SHARED_STRINGS)?;
        write_override(w, "/docProps/core.xml", CT_CORE)?;
        write_override(w, "/docProps/app.xml", CT_APP)?;

        w.write_str("</Types>")
    }
}

fn open_sheet(current: &mut Option<FastWorksheet>) -> Result<&mut FastWorksheet> {
    current
        .as_mut()
        .ok_or_else(|| ExcelError::sequence("no sheet is open; call start_sheet first"))
}

fn resolve_style(styles: &StyleSheet, style: Option<StyleRef>) -> Result<Option<u32>> {
    style.map(|style| styles.xf_index(style)).transpose()
}

fn write_default<B: CompressionBackend>(
    w: &mut XmlWriter<B>,
    extension: &str,
    content_type: &str,
) -> Result<()> {
    w.start_element("Default")?;
    w.attribute("Extension", extension)?;
    w.attribute("ContentType", content_type)?;
    w.close_empty_tag()
}

fn write_override<B: CompressionBackend>(
    w: &mut XmlWriter<B>,
    part: &str,
    content_type: &str,
) -> Result<()> {
    w.start_element("Override")?;
    w.attribute("PartName", part)?;
    w.attribute("ContentType", content_type)?;
    w.close_empty_tag()
}

/// Sheet names: 1-31 UTF-16 code units, no control characters, none of
/// `: \ / ? * [ ]`, no leading or trailing apostrophe, unique ignoring case
fn validate_sheet_name(name: &str, existing: &[String]) -> Result<()> {
    if name.is_empty() {
        return Err(ExcelError::limit("sheet name cannot be empty"));
    }
    // Length is measured in UTF-16 code units, as spreadsheet applications do
    if name.encode_utf16().count() > MAX_SHEET_NAME_UNITS {
        return Err(ExcelError::limit(format!(
            "sheet name '{}' is longer than {} characters",
            name, MAX_SHEET_NAME_UNITS
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(ExcelError::limit(format!(
            "sheet name {:?} contains a control character",
            name
        )));
    }
    if let Some(c) = name.chars().find(|c| INVALID_SHEET_NAME_CHARS.contains(c)) {
        return Err(ExcelError::limit(format!(
            "sheet name '{}' contains invalid character '{}'",
            name, c
        )));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(ExcelError::limit(format!(
            "sheet name '{}' cannot start or end with an apostrophe",
            name
        )));
    }
    let lower = name.to_lowercase();
    if existing.iter().any(|other| other.to_lowercase() == lower) {
        return Err(ExcelError::limit(format!(
            "sheet name '{}' is already used",
            name
        )));
    }
    Ok(())
}
