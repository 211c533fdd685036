//! Compression backends used by the streaming ZIP writer
//!
//! The ZIP layer only needs two things from a backend: the ZIP method id it
//! produces and a per-entry compressor that turns raw bytes into compressed
//! bytes. CRC-32 and size accounting stay in the ZIP layer, so a backend never
//! has to know about framing.

use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{self, Write};

/// ZIP method id for stored (uncompressed) entries
pub const METHOD_STORED: u16 = 0;
/// ZIP method id for raw deflate entries
pub const METHOD_DEFLATED: u16 = 8;

/// Compressor for a single ZIP entry
pub trait EntryCompressor {
    /// ZIP compression method written into the local and central headers
    fn method(&self) -> u16;

    /// Compress `input`, appending whatever output is ready to `out`
    fn compress(&mut self, input: &[u8], out: &mut Vec<u8>) -> io::Result<()>;

    /// Flush remaining state, appending the final bytes to `out`
    fn finish(&mut self, out: &mut Vec<u8>) -> io::Result<()>;
}

/// Factory for per-entry compressors
pub trait CompressionBackend {
    type Entry: EntryCompressor;

    /// Open a compressor for the entry called `name`
    fn open_entry(&mut self, name: &str) -> Self::Entry;
}

/// Deflate backend built on flate2
#[derive(Debug, Clone, Copy)]
pub struct Deflate {
    level: u32,
}

impl Deflate {
    /// Create a deflate backend; levels above 9 are clamped
    pub fn new(level: u32) -> Self {
        Deflate {
            level: level.min(9),
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }
}

impl Default for Deflate {
    fn default() -> Self {
        Deflate::new(6)
    }
}

impl CompressionBackend for Deflate {
    type Entry = DeflateEntry;

    fn open_entry(&mut self, _name: &str) -> DeflateEntry {
        DeflateEntry {
            encoder: DeflateEncoder::new(Vec::with_capacity(8192), Compression::new(self.level)),
        }
    }
}

/// Deflate compressor for one entry
pub struct DeflateEntry {
    encoder: DeflateEncoder<Vec<u8>>,
}

impl EntryCompressor for DeflateEntry {
    fn method(&self) -> u16 {
        METHOD_DEFLATED
    }

    fn compress(&mut self, input: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
        self.encoder.write_all(input)?;
        // Drain whatever the encoder already pushed into its sink
        out.append(self.encoder.get_mut());
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> io::Result<()> {
        self.encoder.try_finish()?;
        out.append(self.encoder.get_mut());
        Ok(())
    }
}

/// Backend that stores entries without compression
#[derive(Debug, Clone, Copy, Default)]
pub struct Stored;

impl CompressionBackend for Stored {
    type Entry = StoredEntry;

    fn open_entry(&mut self, _name: &str) -> StoredEntry {
        StoredEntry
    }
}

pub struct StoredEntry;

impl EntryCompressor for StoredEntry {
    fn method(&self) -> u16 {
        METHOD_STORED
    }

    fn compress(&mut self, input: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
        out.extend_from_slice(input);
        Ok(())
    }

    fn finish(&mut self, _out: &mut Vec<u8>) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::DeflateDecoder;
    use std::io::Read;

    #[test]
    fn test_deflate_entry_inflates_back() {
        let mut backend = Deflate::new(6);
        let mut entry = backend.open_entry("a.xml");
        let mut out = Vec::new();
        let row: &[u8] = b"<row r=\"1\"><c r=\"A1\"><v>1</v></c></row>";

        for _ in 0..100 {
            entry.compress(row, &mut out).unwrap();
        }
        entry.finish(&mut out).unwrap();

        let mut inflated = String::new();
        DeflateDecoder::new(&out[..])
            .read_to_string(&mut inflated)
            .unwrap();
        assert_eq!(inflated.len(), 100 * row.len());
        assert!(out.len() < inflated.len());
        assert_eq!(entry.method(), METHOD_DEFLATED);
    }

    #[test]
    fn test_deflate_level_clamped() {
        assert_eq!(Deflate::new(42).level(), 9);
        assert_eq!(Deflate::default().level(), 6);
    }

    #[test]
    fn test_stored_entry_copies() {
        let mut entry = Stored.open_entry("a.bin");
        let mut out = Vec::new();
        entry.compress(b"abc", &mut out).unwrap();
        entry.finish(&mut out).unwrap();
        assert_eq!(out, b"abc");
        assert_eq!(entry.method(), METHOD_STORED);
    }
}
