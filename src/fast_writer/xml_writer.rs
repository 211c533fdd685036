//! Fixed-capacity XML output channel feeding the ZIP writer
//!
//! All part generators write through one `XmlWriter`. Its buffer never grows:
//! when an append does not fit, the buffer is flushed into the current ZIP
//! entry first. Text is only ever cut on a UTF-8 character boundary, and
//! tokens (numbers, entities, cell references) are never cut at all, so every
//! flushed chunk is valid on its own.

use super::cell_encoder::{control_escape, ColumnName, FloatFormatter};
use super::compression::CompressionBackend;
use super::streaming_zip_writer::StreamingZipWriter;
use crate::error::Result;

/// Smallest capacity that still fits any single token
pub const MIN_BUFFER_CAPACITY: usize = 64;

/// Buffered XML writer with a fixed-size buffer
pub struct XmlWriter<B: CompressionBackend> {
    zip: StreamingZipWriter<B>,
    buffer: Box<[u8]>,
    len: usize,
    floats: FloatFormatter,
}

impl<B: CompressionBackend> XmlWriter<B> {
    pub fn new(zip: StreamingZipWriter<B>, capacity: usize) -> Self {
        XmlWriter {
            zip,
            buffer: vec![0u8; capacity.max(MIN_BUFFER_CAPACITY)].into_boxed_slice(),
            len: 0,
            floats: FloatFormatter::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes buffered and not yet flushed
    pub fn buffered(&self) -> usize {
        self.len
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.buffer.len() - self.len
    }

    #[inline]
    fn push(&mut self, data: &[u8]) {
        self.buffer[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
    }

    /// Make room for `n` contiguous bytes, flushing if they do not fit
    #[inline]
    fn reserve(&mut self, n: usize) -> Result<()> {
        if self.remaining() < n {
            self.flush()?;
        }
        Ok(())
    }

    /// Write a token that must not be split across a flush
    #[inline]
    pub fn write_token(&mut self, token: &[u8]) -> Result<()> {
        debug_assert!(token.len() <= MIN_BUFFER_CAPACITY);
        self.reserve(token.len())?;
        self.push(token);
        Ok(())
    }

    /// Write raw bytes, splitting anywhere if they exceed the free space
    pub fn write_raw(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            if self.remaining() == 0 {
                self.flush()?;
            }
            let n = data.len().min(self.remaining());
            self.push(&data[..n]);
            data = &data[n..];
        }
        Ok(())
    }

    /// Write text unescaped, splitting only on character boundaries
    pub fn write_str(&mut self, text: &str) -> Result<()> {
        let mut rest = text;
        while !rest.is_empty() {
            if rest.len() <= self.remaining() {
                self.push(rest.as_bytes());
                break;
            }
            let mut cut = self.remaining();
            while cut > 0 && !rest.is_char_boundary(cut) {
                cut -= 1;
            }
            let (head, tail) = rest.split_at(cut);
            self.push(head.as_bytes());
            rest = tail;
            self.flush()?;
        }
        Ok(())
    }

    /// Write text content with XML escaping
    pub fn write_escaped(&mut self, text: &str) -> Result<()> {
        self.escape(text, false)
    }

    /// Write cell text: XML escaping plus protection of literal `_xHHHH_`
    /// sequences, which readers would otherwise decode
    pub fn write_cell_text(&mut self, text: &str) -> Result<()> {
        self.escape(text, true)
    }

    fn escape(&mut self, text: &str, protect_literals: bool) -> Result<()> {
        let bytes = text.as_bytes();
        let mut start = 0;
        for (i, &byte) in bytes.iter().enumerate() {
            let control;
            let entity: &[u8] = match byte {
                b'&' => b"&amp;",
                b'<' => b"&lt;",
                b'>' => b"&gt;",
                b'"' => b"&quot;",
                b'\'' => b"&apos;",
                0x00..=0x08 | 0x0b..=0x1f => {
                    control = control_escape(byte);
                    &control
                }
                b'_' if protect_literals && is_escape_sequence(&bytes[i..]) => {
                    control = control_escape(b'_');
                    &control
                }
                _ => continue,
            };
            // Special bytes are ASCII, so both slices end on char boundaries
            self.write_str(&text[start..i])?;
            self.write_token(entity)?;
            start = i + 1;
        }
        self.write_str(&text[start..])
    }

    /// Write an integer as decimal digits
    #[inline]
    pub fn write_int<I: itoa::Integer>(&mut self, value: I) -> Result<()> {
        let mut buf = itoa::Buffer::new();
        let digits = buf.format(value);
        self.write_token(digits.as_bytes())
    }

    /// Write a finite float in culture-invariant form
    pub fn write_float(&mut self, value: f64) -> Result<()> {
        let text = self.floats.format(value)?;
        // ryu output is at most 24 bytes
        let mut token = [0u8; 32];
        let n = text.len();
        token[..n].copy_from_slice(text.as_bytes());
        self.write_token(&token[..n])
    }

    /// Write an A1-style reference such as `AB12`
    pub fn write_cell_ref(&mut self, row: u32, column: u32) -> Result<()> {
        let name = ColumnName::new(column);
        let mut digits = itoa::Buffer::new();
        let row = digits.format(row).as_bytes();
        let mut token = [0u8; 16];
        let letters = name.as_bytes();
        token[..letters.len()].copy_from_slice(letters);
        token[letters.len()..letters.len() + row.len()].copy_from_slice(row);
        self.write_token(&token[..letters.len() + row.len()])
    }

    /// Write XML element start tag
    #[inline]
    pub fn start_element(&mut self, name: &str) -> Result<()> {
        self.write_token(b"<")?;
        self.write_str(name)
    }

    /// Write XML element end tag
    #[inline]
    pub fn end_element(&mut self, name: &str) -> Result<()> {
        self.write_token(b"</")?;
        self.write_str(name)?;
        self.write_token(b">")
    }

    /// Write attribute
    #[inline]
    pub fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.write_token(b" ")?;
        self.write_str(name)?;
        self.write_token(b"=\"")?;
        self.write_escaped(value)?;
        self.write_token(b"\"")
    }

    /// Write attribute with integer value
    #[inline]
    pub fn attribute_int<I: itoa::Integer>(&mut self, name: &str, value: I) -> Result<()> {
        self.write_token(b" ")?;
        self.write_str(name)?;
        self.write_token(b"=\"")?;
        self.write_int(value)?;
        self.write_token(b"\"")
    }

    /// Close start tag
    #[inline]
    pub fn close_start_tag(&mut self) -> Result<()> {
        self.write_token(b">")
    }

    /// Close start tag as a self-closing element
    #[inline]
    pub fn close_empty_tag(&mut self) -> Result<()> {
        self.write_token(b"/>")
    }

    /// Push buffered bytes into the current ZIP entry
    pub fn flush(&mut self) -> Result<()> {
        if self.len > 0 {
            log::trace!("flushing {} buffered bytes", self.len);
            self.zip.write_data(&self.buffer[..self.len])?;
            self.len = 0;
        }
        Ok(())
    }

    /// Flush and open a new ZIP entry for the next part
    pub fn start_part(&mut self, name: &str) -> Result<()> {
        self.flush()?;
        self.zip.start_entry(name)
    }

    /// Flush and close the current ZIP entry
    pub fn finish_part(&mut self) -> Result<()> {
        self.flush()?;
        self.zip.finish_entry()
    }

    pub fn zip(&self) -> &StreamingZipWriter<B> {
        &self.zip
    }

    pub fn zip_mut(&mut self) -> &mut StreamingZipWriter<B> {
        &mut self.zip
    }
}

/// `_xHHHH_` at the start of `bytes`
fn is_escape_sequence(bytes: &[u8]) -> bool {
    bytes.len() >= 7
        && bytes[1] == b'x'
        && bytes[2..6].iter().all(u8::is_ascii_hexdigit)
        && bytes[6] == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fast_writer::compression::{EntryCompressor, Stored};
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    /// Backend that records every chunk handed to the compressor
    #[derive(Clone, Default)]
    struct Recording {
        chunks: Rc<RefCell<Vec<Vec<u8>>>>,
    }

    struct RecordingEntry {
        chunks: Rc<RefCell<Vec<Vec<u8>>>>,
    }

    impl CompressionBackend for Recording {
        type Entry = RecordingEntry;

        fn open_entry(&mut self, _name: &str) -> RecordingEntry {
            RecordingEntry {
                chunks: Rc::clone(&self.chunks),
            }
        }
    }

    impl EntryCompressor for RecordingEntry {
        fn method(&self) -> u16 {
            0
        }

        fn compress(&mut self, input: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
            self.chunks.borrow_mut().push(input.to_vec());
            out.extend_from_slice(input);
            Ok(())
        }

        fn finish(&mut self, _out: &mut Vec<u8>) -> io::Result<()> {
            Ok(())
        }
    }

    fn timestamp() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn recording_writer(capacity: usize) -> (XmlWriter<Recording>, Rc<RefCell<Vec<Vec<u8>>>>) {
        let backend = Recording::default();
        let chunks = Rc::clone(&backend.chunks);
        let mut writer = XmlWriter::new(StreamingZipWriter::new(backend, timestamp()), capacity);
        writer.start_part("part.xml").unwrap();
        (writer, chunks)
    }

    fn render(capacity: usize, prefix_len: usize, payload: &str) -> (Vec<u8>, Vec<Vec<u8>>) {
        let (mut writer, chunks) = recording_writer(capacity);
        writer.write_str(&"x".repeat(prefix_len)).unwrap();
        writer.write_escaped(payload).unwrap();
        writer.write_int(1234567890u64).unwrap();
        writer.finish_part().unwrap();
        let chunks = chunks.borrow().clone();
        (chunks.concat(), chunks)
    }

    #[test]
    fn test_xml_writer() {
        let (mut writer, chunks) = recording_writer(128);

        writer.start_element("root").unwrap();
        writer.attribute("attr", "value").unwrap();
        writer.close_start_tag().unwrap();
        writer.write_str("content").unwrap();
        writer.end_element("root").unwrap();
        writer.finish_part().unwrap();

        assert_eq!(
            String::from_utf8(chunks.borrow().concat()).unwrap(),
            "<root attr=\"value\">content</root>"
        );
    }

    #[test]
    fn test_xml_escaping() {
        let (mut writer, chunks) = recording_writer(128);

        writer.write_escaped("<test>&'value'\"</test>\u{1}").unwrap();
        writer.finish_part().unwrap();

        assert_eq!(
            String::from_utf8(chunks.borrow().concat()).unwrap(),
            "&lt;test&gt;&amp;&apos;value&apos;&quot;&lt;/test&gt;_x0001_"
        );
    }

    #[test]
    fn test_cell_text_escapes_carriage_return_and_literals() {
        let (mut writer, chunks) = recording_writer(128);

        writer.write_cell_text("a\r\nb _x0041_ _x12_ _xZZZZ_").unwrap();
        writer.write_escaped("|_x0041_").unwrap();
        writer.finish_part().unwrap();

        assert_eq!(
            String::from_utf8(chunks.borrow().concat()).unwrap(),
            "a_x000D_\nb _x005F_x0041_ _x12_ _xZZZZ_|_x0041_"
        );
    }

    #[test]
    fn test_multibyte_text_never_split_across_flush() {
        let capacity = MIN_BUFFER_CAPACITY;
        for symbol in ["x", "Я", "‰", "😀"] {
            let payload = symbol.repeat(50);

            for gap in 0..=4 {
                let prefix_len = capacity - gap;
                let (output, chunks) = render(capacity, prefix_len, &payload);
                // Reference run with a buffer large enough to never flush
                let (reference, reference_chunks) = render(4096, prefix_len, &payload);
                assert_eq!(reference_chunks.len(), 1);

                assert_eq!(output, reference, "symbol {} gap {}", symbol, gap);
                for chunk in &chunks {
                    assert!(chunk.len() <= capacity);
                    assert!(std::str::from_utf8(chunk).is_ok(), "chunk split a codepoint");
                }
            }
        }
    }

    #[test]
    fn test_tokens_are_not_split() {
        let (mut writer, chunks) = recording_writer(MIN_BUFFER_CAPACITY);
        writer.write_str(&"x".repeat(MIN_BUFFER_CAPACITY - 3)).unwrap();
        writer.write_int(9_876_543_210u64).unwrap();
        writer.write_float(1234567.9876).unwrap();
        writer.write_escaped("&").unwrap();
        writer.finish_part().unwrap();

        let chunks = chunks.borrow();
        assert_eq!(chunks[0], vec![b'x'; MIN_BUFFER_CAPACITY - 3]);
        assert!(chunks[1].starts_with(b"9876543210"));
        assert_eq!(chunks.concat().len(), MIN_BUFFER_CAPACITY - 3 + 10 + 12 + 5);
    }

    #[test]
    fn test_raw_bytes_larger_than_buffer() {
        let (mut writer, chunks) = recording_writer(MIN_BUFFER_CAPACITY);
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        writer.write_raw(&data).unwrap();
        writer.finish_part().unwrap();

        assert_eq!(chunks.borrow().concat(), data);
        assert!(chunks.borrow().iter().all(|c| c.len() <= MIN_BUFFER_CAPACITY));
    }

    #[test]
    fn test_cell_ref() {
        let (mut writer, chunks) = recording_writer(128);
        writer.write_cell_ref(1, 0).unwrap();
        writer.write_token(b" ").unwrap();
        writer.write_cell_ref(1_048_576, 16_383).unwrap();
        writer.finish_part().unwrap();
        assert_eq!(chunks.borrow().concat(), b"A1 XFD1048576");
    }

    #[test]
    fn test_capacity_has_floor() {
        let writer = XmlWriter::new(StreamingZipWriter::new(Stored, timestamp()), 1);
        assert_eq!(writer.capacity(), MIN_BUFFER_CAPACITY);
        assert_eq!(writer.buffered(), 0);
    }
}
