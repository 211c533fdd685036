//! Cell styles and the styles.xml part
//!
//! Styles follow the same two-phase contract as shared strings: a
//! [`StyleSheetBuilder`] deduplicates structurally equal [`Style`]s and
//! `build()` freezes them into a [`StyleSheet`].
//!
//! The generated part always starts with two built-in cell formats: the
//! default format (xf 0) and a date-time format (xf 1) applied to date cells
//! written without an explicit style. User styles follow from xf 2.

use super::compression::CompressionBackend;
use super::next_table_id;
use super::xml_writer::XmlWriter;
use crate::error::{ExcelError, Result};
use indexmap::IndexSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Style index of the default date-time format
pub(crate) const DATE_TIME_XF: u32 = 1;
/// Style index of the built-in short date format
pub(crate) const DATE_XF: u32 = 2;
const BUILTIN_XF_COUNT: u32 = 3;
const SHORT_DATE_FORMAT_ID: u32 = 14;
const DATE_TIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";
const FIRST_CUSTOM_FORMAT_ID: u32 = 164;
/// patternFill "none" and "gray125" are reserved by the format
const RESERVED_FILL_COUNT: usize = 2;

/// ARGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Color {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 128, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { a: 255, r, g, b }
    }

    pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Color { a, r, g, b }
    }

    fn hex(&self) -> [u8; 8] {
        const HEX: &[u8; 16] = b"0123456789ABCDEF";
        let mut out = [0u8; 8];
        for (i, byte) in [self.a, self.r, self.g, self.b].iter().enumerate() {
            out[i * 2] = HEX[(byte >> 4) as usize];
            out[i * 2 + 1] = HEX[(byte & 0x0f) as usize];
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Font {
    pub name: Option<String>,
    /// Size in points
    pub size: Option<u16>,
    pub color: Option<Color>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
}

impl Font {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_size(mut self, size: u16) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn underline(mut self) -> Self {
        self.underline = true;
        self
    }

    pub fn strikethrough(mut self) -> Self {
        self.strikethrough = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FillPattern {
    Solid,
    Gray125,
    Gray0625,
    LightGray,
    MediumGray,
    DarkGray,
}

impl FillPattern {
    fn as_str(&self) -> &'static str {
        match self {
            FillPattern::Solid => "solid",
            FillPattern::Gray125 => "gray125",
            FillPattern::Gray0625 => "gray0625",
            FillPattern::LightGray => "lightGray",
            FillPattern::MediumGray => "mediumGray",
            FillPattern::DarkGray => "darkGray",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Fill {
    pub color: Color,
    pub pattern: FillPattern,
}

impl Fill {
    pub fn new(color: Color, pattern: FillPattern) -> Self {
        Fill { color, pattern }
    }

    pub fn solid(color: Color) -> Self {
        Fill::new(color, FillPattern::Solid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BorderStyle {
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
    Hair,
    MediumDashed,
    DashDot,
    MediumDashDot,
    DashDotDot,
    MediumDashDotDot,
    SlantDashDot,
}

impl BorderStyle {
    fn as_str(&self) -> &'static str {
        match self {
            BorderStyle::Thin => "thin",
            BorderStyle::Medium => "medium",
            BorderStyle::Thick => "thick",
            BorderStyle::Dashed => "dashed",
            BorderStyle::Dotted => "dotted",
            BorderStyle::Double => "double",
            BorderStyle::Hair => "hair",
            BorderStyle::MediumDashed => "mediumDashed",
            BorderStyle::DashDot => "dashDot",
            BorderStyle::MediumDashDot => "mediumDashDot",
            BorderStyle::DashDotDot => "dashDotDot",
            BorderStyle::MediumDashDotDot => "mediumDashDotDot",
            BorderStyle::SlantDashDot => "slantDashDot",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Border {
    pub style: BorderStyle,
    pub color: Option<Color>,
}

impl Border {
    pub fn new(style: BorderStyle) -> Self {
        Border { style, color: None }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Borders {
    pub left: Option<Border>,
    pub right: Option<Border>,
    pub top: Option<Border>,
    pub bottom: Option<Border>,
}

impl Borders {
    /// Same border on all four sides
    pub fn all(border: Border) -> Self {
        Borders {
            left: Some(border),
            right: Some(border),
            top: Some(border),
            bottom: Some(border),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HorizontalAlignment {
    General,
    Left,
    Center,
    Right,
    Fill,
    Justify,
    CenterContinuous,
    Distributed,
}

impl HorizontalAlignment {
    fn as_str(&self) -> &'static str {
        match self {
            HorizontalAlignment::General => "general",
            HorizontalAlignment::Left => "left",
            HorizontalAlignment::Center => "center",
            HorizontalAlignment::Right => "right",
            HorizontalAlignment::Fill => "fill",
            HorizontalAlignment::Justify => "justify",
            HorizontalAlignment::CenterContinuous => "centerContinuous",
            HorizontalAlignment::Distributed => "distributed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VerticalAlignment {
    Top,
    Center,
    Bottom,
    Justify,
    Distributed,
}

impl VerticalAlignment {
    fn as_str(&self) -> &'static str {
        match self {
            VerticalAlignment::Top => "top",
            VerticalAlignment::Center => "center",
            VerticalAlignment::Bottom => "bottom",
            VerticalAlignment::Justify => "justify",
            VerticalAlignment::Distributed => "distributed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Alignment {
    pub horizontal: Option<HorizontalAlignment>,
    pub vertical: Option<VerticalAlignment>,
    pub wrap_text: bool,
}

impl Alignment {
    pub fn new(
        horizontal: Option<HorizontalAlignment>,
        vertical: Option<VerticalAlignment>,
        wrap_text: bool,
    ) -> Self {
        Alignment {
            horizontal,
            vertical,
            wrap_text,
        }
    }
}

/// Combination of number format, font, fill, borders and alignment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Style {
    /// Number format code, e.g. `0.00%`
    pub format: Option<String>,
    pub font: Option<Font>,
    pub fill: Option<Fill>,
    pub borders: Option<Borders>,
    pub alignment: Option<Alignment>,
}

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_font(mut self, font: Font) -> Self {
        self.font = Some(font);
        self
    }

    pub fn with_fill(mut self, fill: Fill) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn with_borders(mut self, borders: Borders) -> Self {
        self.borders = Some(borders);
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = Some(alignment);
        self
    }
}

/// Reference to a style interned by a [`StyleSheetBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StyleRef {
    sheet: u32,
    index: u32,
}

impl StyleRef {
    /// 0-based position of the style in its builder
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// Deduplicates styles in first-occurrence order
#[derive(Debug)]
pub struct StyleSheetBuilder {
    id: u32,
    styles: IndexSet<Style>,
}

impl StyleSheetBuilder {
    pub fn new() -> Self {
        StyleSheetBuilder {
            id: next_table_id(),
            styles: IndexSet::new(),
        }
    }

    pub fn get_or_add(&mut self, style: Style) -> StyleRef {
        let (index, _) = self.styles.insert_full(style);
        StyleRef {
            sheet: self.id,
            index: index as u32,
        }
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn build(self) -> StyleSheet {
        StyleSheet {
            id: Some(self.id),
            styles: self.styles.into_iter().collect(),
        }
    }
}

impl Default for StyleSheetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable style table given to the writer
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    id: Option<u32>,
    styles: Vec<Style>,
}

impl StyleSheet {
    pub fn get(&self, index: u32) -> Option<&Style> {
        self.styles.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Cell format (`s` attribute) index of a style reference
    pub(crate) fn xf_index(&self, style: StyleRef) -> Result<u32> {
        if self.id != Some(style.sheet) || style.index as usize >= self.styles.len() {
            return Err(ExcelError::encoding(format!(
                "style reference {} does not belong to this document's style sheet",
                style.index
            )));
        }
        Ok(style.index + BUILTIN_XF_COUNT)
    }

    /// Write styles XML in one pass over the table
    pub(crate) fn write_xml<B: CompressionBackend>(&self, writer: &mut XmlWriter<B>) -> Result<()> {
        let mut formats: IndexSet<&str> = IndexSet::new();
        formats.insert(DATE_TIME_FORMAT);
        let mut fonts: IndexSet<&Font> = IndexSet::new();
        let default_font = Font::default();
        fonts.insert(&default_font);
        let mut fills: IndexSet<&Fill> = IndexSet::new();
        let mut borders: IndexSet<&Borders> = IndexSet::new();
        let default_borders = Borders::default();
        borders.insert(&default_borders);

        let mut xfs = Vec::with_capacity(self.styles.len());
        for style in &self.styles {
            let num_fmt_id = match style.format.as_deref() {
                None => 0,
                Some(code) => match builtin_format_id(code) {
                    Some(id) => id,
                    None => FIRST_CUSTOM_FORMAT_ID + formats.insert_full(code).0 as u32,
                },
            };
            let font_id = style.font.as_ref().map_or(0, |f| fonts.insert_full(f).0);
            let fill_id = style
                .fill
                .as_ref()
                .map_or(0, |f| RESERVED_FILL_COUNT + fills.insert_full(f).0);
            let border_id = style.borders.as_ref().map_or(0, |b| borders.insert_full(b).0);
            xfs.push((num_fmt_id, font_id, fill_id, border_id, style));
        }

        writer.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n")?;
        writer.start_element("styleSheet")?;
        writer.attribute(
            "xmlns",
            "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
        )?;
        writer.close_start_tag()?;

        writer.start_element("numFmts")?;
        writer.attribute_int("count", formats.len())?;
        writer.close_start_tag()?;
        for (i, code) in formats.iter().enumerate() {
            writer.start_element("numFmt")?;
            writer.attribute_int("numFmtId", FIRST_CUSTOM_FORMAT_ID + i as u32)?;
            writer.attribute("formatCode", code)?;
            writer.close_empty_tag()?;
        }
        writer.end_element("numFmts")?;

        writer.start_element("fonts")?;
        writer.attribute_int("count", fonts.len())?;
        writer.close_start_tag()?;
        for font in &fonts {
            write_font(writer, font)?;
        }
        writer.end_element("fonts")?;

        writer.start_element("fills")?;
        writer.attribute_int("count", RESERVED_FILL_COUNT + fills.len())?;
        writer.close_start_tag()?;
        writer.write_str("<fill><patternFill patternType=\"none\"/></fill>")?;
        writer.write_str("<fill><patternFill patternType=\"gray125\"/></fill>")?;
        for fill in &fills {
            writer.write_str("<fill><patternFill patternType=\"")?;
            writer.write_str(fill.pattern.as_str())?;
            writer.write_str("\"><fgColor rgb=\"")?;
            writer.write_token(&fill.color.hex())?;
            writer.write_str("\"/></patternFill></fill>")?;
        }
        writer.end_element("fills")?;

        writer.start_element("borders")?;
        writer.attribute_int("count", borders.len())?;
        writer.close_start_tag()?;
        for border in &borders {
            writer.write_str("<border>")?;
            write_border_side(writer, "left", border.left.as_ref())?;
            write_border_side(writer, "right", border.right.as_ref())?;
            write_border_side(writer, "top", border.top.as_ref())?;
            write_border_side(writer, "bottom", border.bottom.as_ref())?;
            writer.write_str("<diagonal/></border>")?;
        }
        writer.end_element("borders")?;

        writer.write_str(
            "<cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/></cellStyleXfs>",
        )?;

        writer.start_element("cellXfs")?;
        writer.attribute_int("count", BUILTIN_XF_COUNT as usize + xfs.len())?;
        writer.close_start_tag()?;
        writer.write_str("<xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\"/>")?;
        writer.write_str("<xf numFmtId=\"")?;
        writer.write_int(FIRST_CUSTOM_FORMAT_ID)?;
        writer.write_str("\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\" applyNumberFormat=\"1\"/>")?;
        writer.write_str("<xf numFmtId=\"")?;
        writer.write_int(SHORT_DATE_FORMAT_ID)?;
        writer.write_str("\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\" applyNumberFormat=\"1\"/>")?;
        for (num_fmt_id, font_id, fill_id, border_id, style) in xfs {
            writer.start_element("xf")?;
            writer.attribute_int("numFmtId", num_fmt_id)?;
            writer.attribute_int("fontId", font_id)?;
            writer.attribute_int("fillId", fill_id)?;
            writer.attribute_int("borderId", border_id)?;
            writer.attribute_int("xfId", 0)?;
            if style.format.is_some() {
                writer.attribute_int("applyNumberFormat", 1)?;
            }
            if style.font.is_some() {
                writer.attribute_int("applyFont", 1)?;
            }
            if style.fill.is_some() {
                writer.attribute_int("applyFill", 1)?;
            }
            if style.borders.is_some() {
                writer.attribute_int("applyBorder", 1)?;
            }
            match &style.alignment {
                Some(alignment) => {
                    writer.attribute_int("applyAlignment", 1)?;
                    writer.close_start_tag()?;
                    write_alignment(writer, alignment)?;
                    writer.end_element("xf")?;
                }
                None => writer.close_empty_tag()?,
            }
        }
        writer.end_element("cellXfs")?;

        writer.write_str(
            "<cellStyles count=\"1\"><cellStyle name=\"Normal\" xfId=\"0\" builtinId=\"0\"/></cellStyles>",
        )?;
        writer.end_element("styleSheet")
    }
}

fn write_font<B: CompressionBackend>(writer: &mut XmlWriter<B>, font: &Font) -> Result<()> {
    writer.write_str("<font>")?;
    if font.bold {
        writer.write_str("<b/>")?;
    }
    if font.italic {
        writer.write_str("<i/>")?;
    }
    if font.strikethrough {
        writer.write_str("<strike/>")?;
    }
    if font.underline {
        writer.write_str("<u/>")?;
    }
    writer.write_str("<sz val=\"")?;
    writer.write_int(font.size.unwrap_or(11))?;
    writer.write_str("\"/>")?;
    if let Some(color) = &font.color {
        writer.write_str("<color rgb=\"")?;
        writer.write_token(&color.hex())?;
        writer.write_str("\"/>")?;
    }
    writer.write_str("<name val=\"")?;
    writer.write_escaped(font.name.as_deref().unwrap_or("Calibri"))?;
    writer.write_str("\"/></font>")
}

fn write_border_side<B: CompressionBackend>(
    writer: &mut XmlWriter<B>,
    side: &str,
    border: Option<&Border>,
) -> Result<()> {
    let Some(border) = border else {
        writer.start_element(side)?;
        return writer.close_empty_tag();
    };
    writer.start_element(side)?;
    writer.attribute("style", border.style.as_str())?;
    match &border.color {
        Some(color) => {
            writer.close_start_tag()?;
            writer.write_str("<color rgb=\"")?;
            writer.write_token(&color.hex())?;
            writer.write_str("\"/>")?;
            writer.end_element(side)
        }
        None => writer.close_empty_tag(),
    }
}

fn write_alignment<B: CompressionBackend>(
    writer: &mut XmlWriter<B>,
    alignment: &Alignment,
) -> Result<()> {
    writer.start_element("alignment")?;
    if let Some(horizontal) = &alignment.horizontal {
        writer.attribute("horizontal", horizontal.as_str())?;
    }
    if let Some(vertical) = &alignment.vertical {
        writer.attribute("vertical", vertical.as_str())?;
    }
    if alignment.wrap_text {
        writer.attribute_int("wrapText", 1)?;
    }
    writer.close_empty_tag()
}

/// Ids of the number formats every spreadsheet application predefines
fn builtin_format_id(code: &str) -> Option<u32> {
    let id = match code {
        "General" => 0,
        "0" => 1,
        "0.00" => 2,
        "#,##0" => 3,
        "#,##0.00" => 4,
        "0%" => 9,
        "0.00%" => 10,
        "0.00E+00" => 11,
        "# ?/?" => 12,
        "# ??/??" => 13,
        "mm-dd-yy" => 14,
        "d-mmm-yy" => 15,
        "d-mmm" => 16,
        "mmm-yy" => 17,
        "h:mm AM/PM" => 18,
        "h:mm:ss AM/PM" => 19,
        "h:mm" => 20,
        "h:mm:ss" => 21,
        "m/d/yy h:mm" => 22,
        "mm:ss" => 45,
        "[h]:mm:ss" => 46,
        "mmss.0" => 47,
        "##0.0E+0" => 48,
        "@" => 49,
        _ => return None,
    };
    Some(id)
}
