//! Worksheet part generator
//!
//! Writes `xl/worksheets/sheetN.xml` forward-only as the sequencer drives it:
//! the header (sheet view, frozen panes, column widths) when the sheet opens,
//! `<row>`/`<c>` elements while rows arrive, and the hyperlink and drawing
//! references once the sheet closes.

use super::cell_encoder::{
    needs_space_preserve, ole_date_serial, ole_day_index, CellValueType, MAX_COLUMN_INDEX,
    MAX_ROW_NUMBER,
};
use super::compression::CompressionBackend;
use super::drawing::{PackageMedia, SheetDrawing};
use super::relationships::{write_rel_id_attribute, RelKind, Relationships};
use super::shared_strings::SharedStrings;
use super::styles::{DATE_TIME_XF, DATE_XF};
use super::xml_writer::XmlWriter;
use crate::error::{ExcelError, Result};
use crate::types::{AnchorCell, CellValue, PictureExtent, PictureFormat, RowOptions, SheetConfig};

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const MAX_COLUMN_WIDTH: f64 = 255.0;
const MAX_ROW_HEIGHT: f64 = 409.0;

/// A cell value after every fallible lookup has been done
#[derive(Debug, Clone, Copy)]
pub(crate) enum CellPayload<'a> {
    Empty,
    Int(i64),
    Number(f64),
    Bool(bool),
    Text(&'a str),
    Char(char),
    Shared(u32),
}

impl CellPayload<'_> {
    fn value_type(&self) -> CellValueType {
        match self {
            CellPayload::Empty => CellValueType::Empty,
            CellPayload::Int(_) => CellValueType::Integer,
            CellPayload::Number(_) => CellValueType::Number,
            CellPayload::Bool(_) => CellValueType::Boolean,
            CellPayload::Text(_) | CellPayload::Char(_) => CellValueType::InlineString,
            CellPayload::Shared(_) => CellValueType::SharedString,
        }
    }
}

struct HyperlinkCell {
    row: u32,
    column: u32,
    rel_id: u32,
}

/// State of the worksheet part currently being written
pub(crate) struct FastWorksheet {
    number: u32,
    /// Last row number used; 0 before the first row
    row: u32,
    row_open: bool,
    /// Last column written in the open row
    column: Option<u32>,
    rows_written: u32,
    hyperlinks: Vec<HyperlinkCell>,
    rels: Relationships,
    drawing: SheetDrawing,
}

impl FastWorksheet {
    /// Open `xl/worksheets/sheet{number}.xml` and write everything up to `<sheetData>`
    pub fn start<B: CompressionBackend>(
        writer: &mut XmlWriter<B>,
        number: u32,
        config: &SheetConfig,
    ) -> Result<Self> {
        check_config(config)?;

        writer.start_part(&format!("xl/worksheets/sheet{}.xml", number))?;
        writer.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n")?;
        writer.start_element("worksheet")?;
        writer.attribute("xmlns", MAIN_NS)?;
        writer.attribute("xmlns:r", RELATIONSHIPS_NS)?;
        writer.close_start_tag()?;

        write_sheet_views(writer, number == 1, config)?;

        if !config.columns.is_empty() {
            writer.write_str("<cols>")?;
            for (i, column) in config.columns.iter().enumerate() {
                writer.start_element("col")?;
                writer.attribute_int("min", i + 1)?;
                writer.attribute_int("max", i + 1)?;
                writer.write_token(b" width=\"")?;
                writer.write_float(column.width)?;
                writer.write_token(b"\"")?;
                writer.attribute_int("customWidth", 1)?;
                writer.close_empty_tag()?;
            }
            writer.write_str("</cols>")?;
        }

        writer.write_str("<sheetData>")?;

        Ok(FastWorksheet {
            number,
            row: 0,
            row_open: false,
            column: None,
            rows_written: 0,
            hyperlinks: Vec::new(),
            rels: Relationships::new(),
            drawing: SheetDrawing::new(),
        })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Last row number used, 0 before the first row
    pub fn current_row(&self) -> u32 {
        self.row
    }

    pub fn rows_written(&self) -> u32 {
        self.rows_written
    }

    pub fn start_row<B: CompressionBackend>(
        &mut self,
        writer: &mut XmlWriter<B>,
        options: RowOptions,
    ) -> Result<()> {
        let number = match options.number {
            Some(number) if number <= self.row => {
                return Err(ExcelError::sequence(format!(
                    "row {} must come after row {}",
                    number, self.row
                )));
            }
            Some(number) => number,
            None => self.row.saturating_add(1),
        };
        if number > MAX_ROW_NUMBER {
            return Err(ExcelError::limit(format!(
                "row {} exceeds the maximum of {} rows",
                number, MAX_ROW_NUMBER
            )));
        }
        if let Some(height) = options.height {
            if !height.is_finite() || !(0.0..=MAX_ROW_HEIGHT).contains(&height) {
                return Err(ExcelError::encoding(format!(
                    "row height {} must be between 0 and {}",
                    height, MAX_ROW_HEIGHT
                )));
            }
        }

        self.close_row(writer)?;

        writer.start_element("row")?;
        writer.attribute_int("r", number)?;
        if let Some(height) = options.height {
            writer.write_token(b" ht=\"")?;
            writer.write_float(height)?;
            writer.write_token(b"\"")?;
            writer.attribute_int("customHeight", 1)?;
        }
        writer.close_start_tag()?;

        self.row = number;
        self.row_open = true;
        self.column = None;
        self.rows_written += 1;
        Ok(())
    }

    /// Skip `count` rows; they stay implicit in the output
    pub fn add_empty_rows<B: CompressionBackend>(
        &mut self,
        writer: &mut XmlWriter<B>,
        count: u32,
    ) -> Result<()> {
        let row = self
            .row
            .checked_add(count)
            .filter(|row| *row <= MAX_ROW_NUMBER)
            .ok_or_else(|| {
                ExcelError::limit(format!(
                    "{} empty rows after row {} exceed the maximum of {} rows",
                    count, self.row, MAX_ROW_NUMBER
                ))
            })?;
        self.close_row(writer)?;
        self.row = row;
        Ok(())
    }

    /// Skip `count` columns in the open row
    pub fn add_empty_cells(&mut self, count: u32) -> Result<()> {
        if count == 0 {
            return self.ensure_row_open();
        }
        let first = self.next_column(None)?;
        let last = first
            .checked_add(count - 1)
            .filter(|column| *column <= MAX_COLUMN_INDEX)
            .ok_or_else(|| column_limit(first.saturating_add(count - 1)))?;
        self.column = Some(last);
        Ok(())
    }

    pub fn add_cell<B: CompressionBackend>(
        &mut self,
        writer: &mut XmlWriter<B>,
        column: Option<u32>,
        value: CellValue<'_>,
        style: Option<u32>,
        strings: &mut SharedStrings,
    ) -> Result<()> {
        let column = self.next_column(column)?;

        let payload = match value {
            CellValue::Empty => CellPayload::Empty,
            CellValue::Int(i) => CellPayload::Int(i),
            CellValue::Float(f) => {
                if !f.is_finite() {
                    return Err(ExcelError::encoding(format!(
                        "non-finite number {} cannot be stored in a cell",
                        f
                    )));
                }
                CellPayload::Number(f)
            }
            CellValue::Bool(b) => CellPayload::Bool(b),
            CellValue::DateTime(dt) => CellPayload::Number(ole_date_serial(&dt)?),
            CellValue::Date(d) => CellPayload::Int(ole_day_index(&d)?),
            CellValue::String(s) => CellPayload::Text(s),
            CellValue::Char(c) => CellPayload::Char(c),
            CellValue::Utf8(bytes) => CellPayload::Text(std::str::from_utf8(bytes).map_err(
                |e| ExcelError::encoding(format!("cell bytes are not valid UTF-8: {}", e)),
            )?),
            CellValue::SharedString(reference) => CellPayload::Shared(strings.resolve(reference)?),
            CellValue::Hyperlink(link) => {
                let target = parse_link_target(&link.target)?;
                let rel_id = self.rels.add(RelKind::Hyperlink, target.as_str());
                self.hyperlinks.push(HyperlinkCell {
                    row: self.row,
                    column,
                    rel_id,
                });
                CellPayload::Text(&link.text)
            }
        };

        let style = match (style, value) {
            (Some(style), _) => Some(style),
            (None, CellValue::Date(_)) => Some(DATE_XF),
            (None, CellValue::DateTime(_)) => Some(DATE_TIME_XF),
            (None, _) => None,
        };

        self.write_cell(writer, column, payload, style)
    }

    /// Write text through the runtime shared-string set, inline once it is full
    pub fn add_shared_text<B: CompressionBackend>(
        &mut self,
        writer: &mut XmlWriter<B>,
        column: Option<u32>,
        text: &str,
        style: Option<u32>,
        strings: &mut SharedStrings,
    ) -> Result<()> {
        let column = self.next_column(column)?;
        let payload = match strings.add_string(text) {
            Some(index) => CellPayload::Shared(index),
            None => CellPayload::Text(text),
        };
        self.write_cell(writer, column, payload, style)
    }

    pub fn add_picture(
        &mut self,
        data: &[u8],
        format: PictureFormat,
        anchor: AnchorCell,
        extent: PictureExtent,
    ) -> Result<()> {
        self.drawing.add(data, format, anchor, extent)
    }

    /// Close the worksheet part and write its drawing and relationship parts
    pub fn finish<B: CompressionBackend>(
        mut self,
        writer: &mut XmlWriter<B>,
        media: &mut PackageMedia,
    ) -> Result<()> {
        self.close_row(writer)?;
        writer.write_str("</sheetData>")?;

        if !self.hyperlinks.is_empty() {
            writer.write_str("<hyperlinks>")?;
            for link in &self.hyperlinks {
                writer.write_token(b"<hyperlink ref=\"")?;
                writer.write_cell_ref(link.row, link.column)?;
                writer.write_token(b"\"")?;
                write_rel_id_attribute(writer, "r:id", link.rel_id)?;
                writer.close_empty_tag()?;
            }
            writer.write_str("</hyperlinks>")?;
        }

        let drawing = if self.drawing.is_empty() {
            None
        } else {
            let number = media.next_drawing();
            let rel_id = self.rels.add(
                RelKind::Drawing,
                &format!("../drawings/drawing{}.xml", number),
            );
            writer.start_element("drawing")?;
            write_rel_id_attribute(writer, "r:id", rel_id)?;
            writer.close_empty_tag()?;
            Some(number)
        };

        writer.end_element("worksheet")?;
        writer.finish_part()?;

        if let Some(number) = drawing {
            self.drawing.write_parts(writer, number, media)?;
        }

        if !self.rels.is_empty() {
            log::trace!(
                "sheet {} has {} relationships",
                self.number,
                self.rels.len()
            );
            writer.start_part(&format!(
                "xl/worksheets/_rels/sheet{}.xml.rels",
                self.number
            ))?;
            self.rels.write_xml(writer)?;
            writer.finish_part()?;
        }
        Ok(())
    }

    fn close_row<B: CompressionBackend>(&mut self, writer: &mut XmlWriter<B>) -> Result<()> {
        if self.row_open {
            writer.end_element("row")?;
            self.row_open = false;
            self.column = None;
        }
        Ok(())
    }

    fn ensure_row_open(&self) -> Result<()> {
        if !self.row_open {
            return Err(ExcelError::sequence("no row is open; call start_row first"));
        }
        Ok(())
    }

    fn next_column(&mut self, explicit: Option<u32>) -> Result<u32> {
        self.ensure_row_open()?;
        let column = match (explicit, self.column) {
            (Some(column), Some(last)) if column <= last => {
                return Err(ExcelError::sequence(format!(
                    "column {} must come after column {}",
                    column, last
                )));
            }
            (Some(column), _) => column,
            (None, Some(last)) => last.saturating_add(1),
            (None, None) => 0,
        };
        if column > MAX_COLUMN_INDEX {
            return Err(column_limit(column));
        }
        self.column = Some(column);
        Ok(column)
    }

    fn write_cell<B: CompressionBackend>(
        &mut self,
        writer: &mut XmlWriter<B>,
        column: u32,
        payload: CellPayload<'_>,
        style: Option<u32>,
    ) -> Result<()> {
        writer.write_token(b"<c r=\"")?;
        writer.write_cell_ref(self.row, column)?;
        writer.write_token(b"\"")?;
        if let Some(style) = style {
            writer.attribute_int("s", style)?;
        }
        if let Some(t) = payload.value_type().type_attribute() {
            writer.write_token(b" t=\"")?;
            writer.write_token(t)?;
            writer.write_token(b"\"")?;
        }

        match payload {
            CellPayload::Empty => return writer.close_empty_tag(),
            CellPayload::Int(i) => {
                writer.write_token(b"><v>")?;
                writer.write_int(i)?;
                writer.write_token(b"</v>")?;
            }
            CellPayload::Number(f) => {
                writer.write_token(b"><v>")?;
                writer.write_float(f)?;
                writer.write_token(b"</v>")?;
            }
            CellPayload::Bool(b) => {
                writer.write_token(if b { b"><v>1</v>" } else { b"><v>0</v>" })?;
            }
            CellPayload::Shared(index) => {
                writer.write_token(b"><v>")?;
                writer.write_int(index)?;
                writer.write_token(b"</v>")?;
            }
            CellPayload::Text(text) => write_inline_text(writer, text)?,
            CellPayload::Char(c) => {
                let mut buf = [0u8; 4];
                write_inline_text(writer, c.encode_utf8(&mut buf))?;
            }
        }
        writer.write_token(b"</c>")
    }
}

fn write_inline_text<B: CompressionBackend>(writer: &mut XmlWriter<B>, text: &str) -> Result<()> {
    if needs_space_preserve(text) {
        writer.write_token(b"><is><t xml:space=\"preserve\">")?;
    } else {
        writer.write_token(b"><is><t>")?;
    }
    writer.write_cell_text(text)?;
    writer.write_token(b"</t></is>")
}

fn write_sheet_views<B: CompressionBackend>(
    writer: &mut XmlWriter<B>,
    selected: bool,
    config: &SheetConfig,
) -> Result<()> {
    writer.write_str("<sheetViews>")?;
    writer.start_element("sheetView")?;
    if !config.show_grid_lines {
        writer.attribute_int("showGridLines", 0)?;
    }
    if selected {
        writer.attribute_int("tabSelected", 1)?;
    }
    writer.attribute_int("workbookViewId", 0)?;

    let rows = config.frozen_rows;
    let columns = config.frozen_columns;
    if rows == 0 && columns == 0 {
        writer.close_empty_tag()?;
        return writer.write_str("</sheetViews>");
    }
    writer.close_start_tag()?;

    let pane = match (columns > 0, rows > 0) {
        (true, true) => "bottomRight",
        (false, true) => "bottomLeft",
        _ => "topRight",
    };
    writer.start_element("pane")?;
    if columns > 0 {
        writer.attribute_int("xSplit", columns)?;
    }
    if rows > 0 {
        writer.attribute_int("ySplit", rows)?;
    }
    writer.write_token(b" topLeftCell=\"")?;
    writer.write_cell_ref(rows + 1, columns)?;
    writer.write_token(b"\"")?;
    writer.attribute("activePane", pane)?;
    writer.attribute("state", "frozen")?;
    writer.close_empty_tag()?;

    writer.start_element("selection")?;
    writer.attribute("pane", pane)?;
    writer.close_empty_tag()?;

    writer.end_element("sheetView")?;
    writer.write_str("</sheetViews>")
}

fn check_config(config: &SheetConfig) -> Result<()> {
    if config.frozen_rows >= MAX_ROW_NUMBER {
        return Err(ExcelError::limit(format!(
            "cannot freeze {} rows",
            config.frozen_rows
        )));
    }
    if config.frozen_columns > MAX_COLUMN_INDEX {
        return Err(ExcelError::limit(format!(
            "cannot freeze {} columns",
            config.frozen_columns
        )));
    }
    if config.columns.len() > MAX_COLUMN_INDEX as usize + 1 {
        return Err(ExcelError::limit(format!(
            "{} column widths given for at most {} columns",
            config.columns.len(),
            MAX_COLUMN_INDEX + 1
        )));
    }
    for column in &config.columns {
        if !column.width.is_finite() || !(0.0..=MAX_COLUMN_WIDTH).contains(&column.width) {
            return Err(ExcelError::encoding(format!(
                "column width {} must be between 0 and {}",
                column.width, MAX_COLUMN_WIDTH
            )));
        }
    }
    Ok(())
}

fn parse_link_target(target: &str) -> Result<url::Url> {
    if target.trim().is_empty() {
        return Err(ExcelError::encoding("hyperlink target is empty"));
    }
    url::Url::parse(target)
        .map_err(|e| ExcelError::encoding(format!("invalid hyperlink target '{}': {}", target, e)))
}

fn column_limit(column: u32) -> ExcelError {
    ExcelError::limit(format!(
        "column {} exceeds the maximum of {} columns",
        column,
        MAX_COLUMN_INDEX + 1
    ))
}
