//! Integration tests for xlsxstream
//!
//! Every package is read back with the `zip` crate and the parts are parsed
//! with `quick-xml`.

use chrono::NaiveDate;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Cursor, Read};
use tempfile::NamedTempFile;
use xlsxstream::{
    AnchorCell, CellValue, ColumnConfig, ExcelError, ExcelWriter, Font, Hyperlink, PictureFormat,
    PictureSize, RowOptions, SharedStringTableBuilder, SheetConfig, Stored, Style,
    StyleSheetBuilder, WriterOptions,
};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01";

#[derive(Debug, Default, PartialEq)]
struct Cell {
    reference: String,
    kind: Option<String>,
    style: Option<String>,
    value: String,
}

fn cell_from(e: &BytesStart<'_>) -> Cell {
    let mut cell = Cell::default();
    for attr in e.attributes() {
        let attr = attr.unwrap();
        let value = attr.unescape_value().unwrap().into_owned();
        match attr.key.as_ref() {
            b"r" => cell.reference = value,
            b"t" => cell.kind = Some(value),
            b"s" => cell.style = Some(value),
            _ => {}
        }
    }
    cell
}

fn read_cells(xml: &str) -> Vec<Cell> {
    let mut reader = Reader::from_str(xml);
    let mut cells = Vec::new();
    let mut current: Option<Cell> = None;
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) if e.name().as_ref() == b"c" => current = Some(cell_from(&e)),
            Event::Empty(e) if e.name().as_ref() == b"c" => cells.push(cell_from(&e)),
            Event::Text(t) => {
                if let Some(cell) = current.as_mut() {
                    cell.value.push_str(&t.unescape().unwrap());
                }
            }
            Event::End(e) if e.name().as_ref() == b"c" => cells.extend(current.take()),
            Event::Eof => break,
            _ => {}
        }
    }
    cells
}

fn read_shared_strings(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) if e.name().as_ref() == b"t" => {
                in_text = true;
                strings.push(String::new());
            }
            Event::Text(t) if in_text => {
                if let Some(last) = strings.last_mut() {
                    last.push_str(&t.unescape().unwrap());
                }
            }
            Event::End(e) if e.name().as_ref() == b"t" => in_text = false,
            Event::Eof => break,
            _ => {}
        }
    }
    strings
}

/// Decode `_xHHHH_` escapes the way spreadsheet applications read cell text
fn decode_escapes(text: &str) -> String {
    let mut out = String::new();
    let mut rest = text;
    while let Some(pos) = rest.find("_x") {
        out.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        let code = candidate
            .get(2..6)
            .filter(|_| candidate.as_bytes().get(6) == Some(&b'_'))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);
        match code {
            Some(c) => {
                out.push(c);
                rest = &candidate[7..];
            }
            None => {
                out.push_str("_x");
                rest = &candidate[2..];
            }
        }
    }
    out.push_str(rest);
    out
}

struct Package {
    archive: zip::ZipArchive<Cursor<Vec<u8>>>,
}

impl Package {
    fn open(bytes: Vec<u8>) -> Self {
        Package {
            archive: zip::ZipArchive::new(Cursor::new(bytes)).unwrap(),
        }
    }

    fn has(&self, name: &str) -> bool {
        self.archive.file_names().any(|n| n == name)
    }

    fn part(&mut self, name: &str) -> String {
        let mut entry = self.archive.by_name(name).unwrap();
        let mut text = String::new();
        entry.read_to_string(&mut text).unwrap();
        text
    }

    fn raw(&mut self, name: &str) -> Vec<u8> {
        let mut entry = self.archive.by_name(name).unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        bytes
    }
}

fn finish(mut writer: ExcelWriter<Vec<u8>>) -> Package {
    writer.complete().unwrap();
    Package::open(writer.into_inner())
}

#[test]
fn test_inline_string_cell() {
    let mut writer = ExcelWriter::new(Vec::new());
    writer.start_sheet("test sheet").unwrap();
    writer.start_row().unwrap();
    writer.add_cell("string").unwrap();
    let mut package = finish(writer);

    assert!(read_shared_strings(&package.part("xl/sharedStrings.xml")).is_empty());
    let cells = read_cells(&package.part("xl/worksheets/sheet1.xml"));
    assert_eq!(
        cells,
        vec![Cell {
            reference: "A1".to_string(),
            kind: Some("inlineStr".to_string()),
            style: None,
            value: "string".to_string(),
        }]
    );
    assert!(package
        .part("xl/workbook.xml")
        .contains("<sheet name=\"test sheet\" sheetId=\"1\" r:id=\"rId1\"/>"));
}

#[test]
fn test_shared_string_cells() {
    let mut strings = SharedStringTableBuilder::new();
    let first = strings.get_or_add("string");
    let second = strings.get_or_add("other string");
    let options = WriterOptions::new().with_shared_strings(strings.build());

    let mut writer = ExcelWriter::with_options(Vec::new(), options);
    writer.start_sheet("test sheet").unwrap();
    writer.start_row().unwrap();
    writer.add_cell(first).unwrap();
    writer.add_cell(second).unwrap();
    let mut package = finish(writer);

    assert_eq!(
        read_shared_strings(&package.part("xl/sharedStrings.xml")),
        vec!["string", "other string"]
    );
    let cells = read_cells(&package.part("xl/worksheets/sheet1.xml"));
    assert_eq!(cells.len(), 2);
    assert_eq!(cells[0].kind.as_deref(), Some("s"));
    assert_eq!(cells[0].value, "0");
    assert_eq!(cells[1].reference, "B1");
    assert_eq!(cells[1].value, "1");
}

#[test]
fn test_runtime_shared_strings_follow_preloaded() {
    let mut strings = SharedStringTableBuilder::new();
    strings.get_or_add("preloaded");
    let options = WriterOptions::new().with_shared_strings(strings.build());

    let mut writer = ExcelWriter::with_options(Vec::new(), options);
    writer.start_sheet("Sheet1").unwrap();
    writer.start_row().unwrap();
    writer.add_cell_with_shared_string("runtime").unwrap();
    writer.add_cell_with_shared_string("runtime").unwrap();
    let mut package = finish(writer);

    assert_eq!(
        read_shared_strings(&package.part("xl/sharedStrings.xml")),
        vec!["preloaded", "runtime"]
    );
    let values: Vec<_> = read_cells(&package.part("xl/worksheets/sheet1.xml"))
        .into_iter()
        .map(|c| c.value)
        .collect();
    assert_eq!(values, vec!["1", "1"]);
}

#[test]
fn test_typed_cells() {
    let mut writer = ExcelWriter::new(Vec::new());
    writer.start_sheet("Types").unwrap();
    writer
        .write_row([
            CellValue::Int(-42),
            CellValue::Float(1234.5),
            CellValue::Float(3.0),
            CellValue::Bool(true),
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            CellValue::String("  padded "),
            CellValue::Char('x'),
            CellValue::Empty,
        ])
        .unwrap();
    let mut package = finish(writer);

    let sheet = package.part("xl/worksheets/sheet1.xml");
    let cells = read_cells(&sheet);
    let values: Vec<&str> = cells.iter().map(|c| c.value.as_str()).collect();
    assert_eq!(
        values,
        vec!["-42", "1234.5", "3", "1", "45292", "  padded ", "x", ""]
    );
    assert_eq!(cells[3].kind.as_deref(), Some("b"));
    assert_eq!(cells[4].kind, None);
    assert_eq!(cells[4].style.as_deref(), Some("2"));
    assert_eq!(cells[7].reference, "H1");
    assert!(sheet.contains("<t xml:space=\"preserve\">  padded </t>"));
}

#[test]
fn test_escaping_in_cells() {
    let mut writer = ExcelWriter::new(Vec::new());
    writer.start_sheet("Escapes").unwrap();
    writer.start_row().unwrap();
    writer.add_cell("a < b & c > \"d\"").unwrap();
    writer.add_cell("tab\u{1}").unwrap();
    let mut package = finish(writer);

    let sheet = package.part("xl/worksheets/sheet1.xml");
    assert!(sheet.contains("_x0001_"));
    let cells = read_cells(&sheet);
    assert_eq!(cells[0].value, "a < b & c > \"d\"");
}

#[test]
fn test_carriage_returns_round_trip() {
    let mut writer = ExcelWriter::new(Vec::new());
    writer.start_sheet("Lines").unwrap();
    writer.start_row().unwrap();
    writer.add_cell("a\r\nb").unwrap();
    writer.add_cell("lone\rcr").unwrap();
    writer.add_cell_with_shared_string("x\r\ny").unwrap();
    let mut package = finish(writer);

    let sheet = package.part("xl/worksheets/sheet1.xml");
    assert!(!sheet.contains('\r'));
    let values: Vec<String> = read_cells(&sheet)
        .iter()
        .map(|c| decode_escapes(&c.value))
        .collect();
    assert_eq!(values[..2], ["a\r\nb", "lone\rcr"]);

    let strings = read_shared_strings(&package.part("xl/sharedStrings.xml"));
    assert_eq!(decode_escapes(&strings[0]), "x\r\ny");
}

#[test]
fn test_literal_escape_sequences_round_trip() {
    let mut writer = ExcelWriter::new(Vec::new());
    writer.start_sheet("Literals").unwrap();
    writer.start_row().unwrap();
    writer.add_cell("_x0041_").unwrap();
    writer.add_cell("keep _x12_ and _xZZZZ_").unwrap();
    writer.add_cell_with_shared_string("id_x00e9_").unwrap();
    let mut package = finish(writer);

    let sheet = package.part("xl/worksheets/sheet1.xml");
    assert!(sheet.contains("<t>_x005F_x0041_</t>"));
    let values: Vec<String> = read_cells(&sheet)
        .iter()
        .map(|c| decode_escapes(&c.value))
        .collect();
    assert_eq!(values[..2], ["_x0041_", "keep _x12_ and _xZZZZ_"]);

    let strings = read_shared_strings(&package.part("xl/sharedStrings.xml"));
    assert_eq!(decode_escapes(&strings[0]), "id_x00e9_");
}

#[test]
fn test_sparse_rows_and_cells() {
    let mut writer = ExcelWriter::new(Vec::new());
    writer.start_sheet("Sparse").unwrap();
    writer.start_row().unwrap();
    writer.add_cell(1i64).unwrap();
    writer.add_empty_cells(2).unwrap();
    writer.add_cell(2i64).unwrap();
    writer.add_empty_rows(3).unwrap();
    writer.start_row().unwrap();
    writer.add_cell_at(27, 3i64).unwrap();
    writer.start_row_with(RowOptions::at(10).with_height(30.0)).unwrap();
    writer.add_cell(4i64).unwrap();
    let mut package = finish(writer);

    let sheet = package.part("xl/worksheets/sheet1.xml");
    let refs: Vec<String> = read_cells(&sheet).into_iter().map(|c| c.reference).collect();
    assert_eq!(refs, vec!["A1", "D1", "AB5", "A10"]);
    assert!(sheet.contains("<row r=\"10\" ht=\"30\" customHeight=\"1\">"));
}

#[test]
fn test_sequencing_errors() {
    let mut writer = ExcelWriter::new(Vec::new());
    writer.start_sheet("Sheet1").unwrap();
    assert!(matches!(
        writer.add_cell(1i64),
        Err(ExcelError::Sequence(_))
    ));

    let mut writer = ExcelWriter::new(Vec::new());
    writer.start_sheet("Sheet1").unwrap();
    writer.start_row_with(RowOptions::at(5)).unwrap();
    assert!(matches!(
        writer.start_row_with(RowOptions::at(5)),
        Err(ExcelError::Sequence(_))
    ));
    // The failed call poisons the writer
    assert!(matches!(writer.start_row(), Err(ExcelError::Sequence(_))));

    let mut writer = ExcelWriter::new(Vec::new());
    writer.start_sheet("Sheet1").unwrap();
    writer.complete().unwrap();
    assert!(matches!(writer.complete(), Err(ExcelError::Sequence(_))));
    assert!(matches!(
        writer.start_sheet("Sheet2"),
        Err(ExcelError::Sequence(_))
    ));
}

#[test]
fn test_invalid_values_rejected() {
    let mut writer = ExcelWriter::new(Vec::new());
    writer.start_sheet("Sheet1").unwrap();
    writer.start_row().unwrap();
    assert!(matches!(
        writer.add_cell(f64::NAN),
        Err(ExcelError::Encoding(_))
    ));

    let mut writer = ExcelWriter::new(Vec::new());
    writer.start_sheet("Sheet1").unwrap();
    writer.start_row().unwrap();
    assert!(matches!(
        writer.add_utf8_cell(&[0x66, 0xff, 0x6f]),
        Err(ExcelError::Encoding(_))
    ));

    let mut writer = ExcelWriter::new(Vec::new());
    assert!(matches!(
        writer.start_sheet("bad/name"),
        Err(ExcelError::LimitExceeded(_))
    ));
}

#[test]
fn test_multiple_sheets() {
    let mut writer = ExcelWriter::new(Vec::new());
    for name in ["First", "Second", "Third"] {
        writer.start_sheet(name).unwrap();
        writer.write_row([CellValue::String(name)]).unwrap();
    }
    let mut package = finish(writer);

    for number in 1..=3 {
        assert!(package.has(&format!("xl/worksheets/sheet{}.xml", number)));
    }
    let workbook = package.part("xl/workbook.xml");
    assert!(workbook.contains("<sheet name=\"Third\" sheetId=\"3\" r:id=\"rId3\"/>"));
    let rels = package.part("xl/_rels/workbook.xml.rels");
    assert!(rels.contains("Target=\"worksheets/sheet2.xml\""));
    let content_types = package.part("[Content_Types].xml");
    assert!(content_types.contains("PartName=\"/xl/worksheets/sheet3.xml\""));

    let cells = read_cells(&package.part("xl/worksheets/sheet2.xml"));
    assert_eq!(cells[0].value, "Second");
}

#[test]
fn test_package_skeleton() {
    let timestamp = NaiveDate::from_ymd_opt(2024, 5, 6)
        .unwrap()
        .and_hms_opt(7, 8, 9)
        .unwrap();
    let options = WriterOptions::new().with_timestamp(timestamp);
    let mut writer = ExcelWriter::with_options(Vec::new(), options);
    writer.start_sheet("Sheet1").unwrap();
    let mut package = finish(writer);

    for name in [
        "[Content_Types].xml",
        "_rels/.rels",
        "docProps/core.xml",
        "docProps/app.xml",
        "xl/workbook.xml",
        "xl/_rels/workbook.xml.rels",
        "xl/styles.xml",
        "xl/sharedStrings.xml",
        "xl/worksheets/sheet1.xml",
    ] {
        assert!(package.has(name), "missing part {}", name);
    }
    let core = package.part("docProps/core.xml");
    assert!(core.contains("2024-05-06T07:08:09Z"));
    assert!(package
        .part("_rels/.rels")
        .contains("Target=\"xl/workbook.xml\""));
}

#[test]
fn test_styles_and_sheet_config() {
    let mut styles = StyleSheetBuilder::new();
    let bold = styles.get_or_add(Style::new().with_font(Font::new().bold()));
    let options = WriterOptions::new().with_styles(styles.build());

    let config = SheetConfig::new()
        .with_frozen_rows(1)
        .with_columns(vec![ColumnConfig::new(20.0), ColumnConfig::new(8.5)])
        .with_grid_lines(false);

    let mut writer = ExcelWriter::with_options(Vec::new(), options);
    writer.start_sheet_with_config("Styled", &config).unwrap();
    writer.start_row().unwrap();
    writer.add_styled_cell("Header", bold).unwrap();
    let mut package = finish(writer);

    let sheet = package.part("xl/worksheets/sheet1.xml");
    assert!(sheet.contains("showGridLines=\"0\""));
    assert!(sheet.contains("ySplit=\"1\""));
    assert!(sheet.contains("state=\"frozen\""));
    assert!(sheet.contains("<col min=\"1\" max=\"1\" width=\"20\" customWidth=\"1\"/>"));
    assert_eq!(read_cells(&sheet)[0].style.as_deref(), Some("3"));

    let styles_xml = package.part("xl/styles.xml");
    assert!(styles_xml.contains("<b/>"));
    assert!(styles_xml.contains("yyyy-mm-dd hh:mm:ss"));
    assert!(styles_xml.contains("<cellXfs count=\"4\">"));
    assert!(styles_xml.contains("<xf numFmtId=\"14\""));
}

#[test]
fn test_hyperlinks() {
    let link = Hyperlink::new("https://example.com/docs", "Docs");
    let mut writer = ExcelWriter::new(Vec::new());
    writer.start_sheet("Links").unwrap();
    writer.start_row().unwrap();
    writer.add_cell(&link).unwrap();
    let mut package = finish(writer);

    let sheet = package.part("xl/worksheets/sheet1.xml");
    assert!(sheet.contains("<hyperlink ref=\"A1\" r:id=\"rId1\"/>"));
    assert_eq!(read_cells(&sheet)[0].value, "Docs");

    let rels = package.part("xl/worksheets/_rels/sheet1.xml.rels");
    assert!(rels.contains("Target=\"https://example.com/docs\""));
    assert!(rels.contains("TargetMode=\"External\""));
}

#[test]
fn test_pictures() {
    let mut writer = ExcelWriter::new(Vec::new());
    writer.start_sheet("Pictures").unwrap();
    writer
        .add_picture(
            PNG,
            PictureFormat::Png,
            AnchorCell::new(1, 2),
            PictureSize::new(100, 50),
        )
        .unwrap();
    writer
        .add_picture(PNG, PictureFormat::Png, AnchorCell::new(0, 0), AnchorCell::new(3, 3))
        .unwrap();
    writer.start_sheet("Plain").unwrap();
    let mut package = finish(writer);

    assert_eq!(package.raw("xl/media/image1.png"), PNG);
    assert!(package.has("xl/media/image2.png"));

    let drawing = package.part("xl/drawings/drawing1.xml");
    assert!(drawing.contains("<xdr:oneCellAnchor>"));
    assert!(drawing.contains("cx=\"952500\" cy=\"476250\""));
    assert!(drawing.contains("<xdr:twoCellAnchor editAs=\"oneCell\">"));

    assert!(package.has("xl/drawings/_rels/drawing1.xml.rels"));
    assert!(package
        .part("xl/worksheets/sheet1.xml")
        .contains("<drawing r:id=\"rId1\"/>"));
    assert!(!package.has("xl/worksheets/_rels/sheet2.xml.rels"));

    let content_types = package.part("[Content_Types].xml");
    assert!(content_types.contains("<Default Extension=\"png\" ContentType=\"image/png\"/>"));
    assert!(content_types.contains("PartName=\"/xl/drawings/drawing1.xml\""));
}

#[test]
fn test_picture_format_mismatch() {
    let mut writer = ExcelWriter::new(Vec::new());
    writer.start_sheet("Pictures").unwrap();
    assert!(matches!(
        writer.add_picture(
            PNG,
            PictureFormat::Jpeg,
            AnchorCell::new(0, 0),
            PictureSize::new(10, 10)
        ),
        Err(ExcelError::Encoding(_))
    ));
}

#[test]
fn test_text_larger_than_buffer() {
    let text: String = "héllo wörld ✓ ".repeat(400);
    let options = WriterOptions::new().with_buffer_capacity(xlsxstream::writer::MIN_BUFFER_CAPACITY);
    let mut writer = ExcelWriter::with_backend(Vec::new(), Stored, options);
    writer.start_sheet("Big").unwrap();
    for _ in 0..50 {
        writer.start_row().unwrap();
        writer.add_cell(text.as_str()).unwrap();
        writer.add_cell(1.25f64).unwrap();
    }
    writer.complete().unwrap();
    let mut package = Package::open(writer.into_inner());

    let cells = read_cells(&package.part("xl/worksheets/sheet1.xml"));
    assert_eq!(cells.len(), 100);
    assert!(cells.iter().step_by(2).all(|c| c.value == text));
    assert_eq!(cells[99].reference, "B50");
}

#[test]
fn test_write_to_file() {
    let temp = NamedTempFile::new().unwrap();
    {
        let mut writer = ExcelWriter::create(temp.path()).unwrap();
        writer.start_sheet("Data").unwrap();
        for i in 0..1_000i64 {
            writer
                .write_row([CellValue::Int(i), CellValue::String("row")])
                .unwrap();
        }
        writer.complete().unwrap();
    }

    let bytes = std::fs::read(temp.path()).unwrap();
    let mut package = Package::open(bytes);
    let cells = read_cells(&package.part("xl/worksheets/sheet1.xml"));
    assert_eq!(cells.len(), 2_000);
    assert_eq!(cells[1998].reference, "A1000");
}

#[cfg(feature = "async")]
#[tokio::test]
async fn test_async_writer_package() {
    use xlsxstream::AsyncExcelWriter;

    let mut writer = AsyncExcelWriter::new(Vec::new());
    writer.start_sheet("Async").await.unwrap();
    writer
        .write_row([CellValue::String("a"), CellValue::Int(7)])
        .await
        .unwrap();
    writer.start_row().await.unwrap();
    writer.add_cell_with_shared_string("shared").unwrap();
    writer.complete().await.unwrap();

    let mut package = Package::open(writer.into_inner());
    let cells = read_cells(&package.part("xl/worksheets/sheet1.xml"));
    let values: Vec<&str> = cells.iter().map(|c| c.value.as_str()).collect();
    assert_eq!(values, vec!["a", "7", "0"]);
    assert_eq!(
        read_shared_strings(&package.part("xl/sharedStrings.xml")),
        vec!["shared"]
    );
}
