//! Streaming ZIP writer with deferred-size (data descriptor) framing
//!
//! Every entry is written as: local header with CRC and sizes zeroed and
//! general purpose bit 3 set, the compressed payload as it is produced, then a
//! data descriptor carrying the real CRC-32 and sizes. Nothing is ever
//! rewritten, so the output never needs to be seekable.
//!
//! Produced bytes are staged in memory until the owner drains them into its
//! sink. Draining is the only place where sink IO happens, which lets the
//! blocking and async writers share this code unchanged.

use super::compression::{CompressionBackend, EntryCompressor};
use crate::error::{ExcelError, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};
use crc32fast::Hasher as Crc32;

const LOCAL_HEADER_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const DATA_DESCRIPTOR_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x07, 0x08];
const CENTRAL_HEADER_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x01, 0x02];
const END_OF_CENTRAL_DIR_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];

const VERSION: u16 = 20;
const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
const FLAG_UTF8_NAME: u16 = 1 << 11;
const MAX_ENTRIES: usize = u16::MAX as usize;

/// Entry already closed, kept for the central directory
struct ZipEntry {
    name: String,
    flags: u16,
    method: u16,
    local_header_offset: u32,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
}

struct CurrentEntry<E> {
    name: String,
    flags: u16,
    local_header_offset: u32,
    compressor: E,
    crc: Crc32,
    uncompressed_count: u64,
    compressed_count: u64,
}

/// Streaming ZIP writer parameterized over its compression backend
pub struct StreamingZipWriter<B: CompressionBackend> {
    backend: B,
    output: Vec<u8>,
    position: u64,
    entries: Vec<ZipEntry>,
    current_entry: Option<CurrentEntry<B::Entry>>,
    dos_time: u16,
    dos_date: u16,
    finished: bool,
}

impl<B: CompressionBackend> StreamingZipWriter<B> {
    pub fn new(backend: B, modified: NaiveDateTime) -> Self {
        let (dos_time, dos_date) = dos_timestamp(modified);
        Self {
            backend,
            output: Vec::with_capacity(64 * 1024),
            position: 0,
            entries: Vec::new(),
            current_entry: None,
            dos_time,
            dos_date,
            finished: false,
        }
    }

    /// Start a new entry, closing the previous one if still open
    pub fn start_entry(&mut self, name: &str) -> Result<()> {
        self.finish_entry()?;
        self.ensure_open()?;

        if self.entries.len() >= MAX_ENTRIES {
            return Err(ExcelError::limit(format!(
                "package cannot hold more than {} entries",
                MAX_ENTRIES
            )));
        }
        let name_len = u16::try_from(name.len())
            .map_err(|_| ExcelError::limit(format!("entry name too long: {}", name)))?;
        let local_header_offset = self.offset_u32()?;

        let compressor = self.backend.open_entry(name);
        let mut flags = FLAG_DATA_DESCRIPTOR;
        if !name.is_ascii() {
            flags |= FLAG_UTF8_NAME;
        }

        self.emit(&LOCAL_HEADER_SIGNATURE);
        self.emit_u16(VERSION);
        self.emit_u16(flags);
        self.emit_u16(compressor.method());
        self.emit_u16(self.dos_time);
        self.emit_u16(self.dos_date);
        self.emit_u32(0); // crc32, in descriptor
        self.emit_u32(0); // compressed size, in descriptor
        self.emit_u32(0); // uncompressed size, in descriptor
        self.emit_u16(name_len);
        self.emit_u16(0); // extra len
        self.emit(name.as_bytes());

        self.current_entry = Some(CurrentEntry {
            name: name.to_string(),
            flags,
            local_header_offset,
            compressor,
            crc: Crc32::new(),
            uncompressed_count: 0,
            compressed_count: 0,
        });
        Ok(())
    }

    /// Write uncompressed data to the current entry
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        let entry = self
            .current_entry
            .as_mut()
            .ok_or_else(|| ExcelError::sequence("no ZIP entry started"))?;

        entry.crc.update(data);
        entry.uncompressed_count += data.len() as u64;

        let before = self.output.len();
        entry.compressor.compress(data, &mut self.output)?;
        let produced = (self.output.len() - before) as u64;
        entry.compressed_count += produced;
        self.position += produced;
        Ok(())
    }

    /// Close the current entry and write its data descriptor
    pub fn finish_entry(&mut self) -> Result<()> {
        let Some(mut entry) = self.current_entry.take() else {
            return Ok(());
        };

        let before = self.output.len();
        entry.compressor.finish(&mut self.output)?;
        let produced = (self.output.len() - before) as u64;
        entry.compressed_count += produced;
        self.position += produced;

        let crc32 = entry.crc.finalize();
        let compressed_size = size_u32(&entry.name, entry.compressed_count)?;
        let uncompressed_size = size_u32(&entry.name, entry.uncompressed_count)?;

        self.emit(&DATA_DESCRIPTOR_SIGNATURE);
        self.emit_u32(crc32);
        self.emit_u32(compressed_size);
        self.emit_u32(uncompressed_size);

        log::debug!(
            "closed zip entry {} ({} -> {} bytes)",
            entry.name,
            uncompressed_size,
            compressed_size
        );

        self.entries.push(ZipEntry {
            name: entry.name,
            flags: entry.flags,
            method: entry.compressor.method(),
            local_header_offset: entry.local_header_offset,
            crc32,
            compressed_size,
            uncompressed_size,
        });
        Ok(())
    }

    /// Close the last entry and write the central directory
    pub fn finish(&mut self) -> Result<()> {
        self.finish_entry()?;
        self.ensure_open()?;

        let central_dir_offset = self.offset_u32()?;
        let entries = std::mem::take(&mut self.entries);

        for entry in &entries {
            self.emit(&CENTRAL_HEADER_SIGNATURE);
            self.emit_u16(VERSION); // version made by
            self.emit_u16(VERSION); // version needed
            self.emit_u16(entry.flags);
            self.emit_u16(entry.method);
            self.emit_u16(self.dos_time);
            self.emit_u16(self.dos_date);
            self.emit_u32(entry.crc32);
            self.emit_u32(entry.compressed_size);
            self.emit_u32(entry.uncompressed_size);
            self.emit_u16(entry.name.len() as u16);
            self.emit_u16(0); // extra len
            self.emit_u16(0); // file comment len
            self.emit_u16(0); // disk number start
            self.emit_u16(0); // internal attrs
            self.emit_u32(0); // external attrs
            self.emit_u32(entry.local_header_offset);
            self.emit(entry.name.as_bytes());
        }

        let central_dir_size = self.offset_u32()? - central_dir_offset;

        self.emit(&END_OF_CENTRAL_DIR_SIGNATURE);
        self.emit_u16(0); // disk number
        self.emit_u16(0); // disk with central dir
        self.emit_u16(entries.len() as u16);
        self.emit_u16(entries.len() as u16);
        self.emit_u32(central_dir_size);
        self.emit_u32(central_dir_offset);
        self.emit_u16(0); // comment len

        self.entries = entries;
        self.finished = true;
        Ok(())
    }

    /// Bytes produced but not yet handed to the sink
    pub fn pending(&self) -> &[u8] {
        &self.output
    }

    /// Forget staged bytes once the owner has written them out
    pub fn clear_pending(&mut self) {
        self.output.clear();
    }

    /// Total package bytes produced so far
    pub fn bytes_written(&self) -> u64 {
        self.position
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len() + usize::from(self.current_entry.is_some())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn ensure_open(&self) -> Result<()> {
        if self.finished {
            return Err(ExcelError::sequence("ZIP archive already finished"));
        }
        Ok(())
    }

    fn offset_u32(&self) -> Result<u32> {
        u32::try_from(self.position)
            .map_err(|_| ExcelError::limit("package exceeds 4 GiB without ZIP64 support"))
    }

    #[inline]
    fn emit(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
        self.position += bytes.len() as u64;
    }

    #[inline]
    fn emit_u16(&mut self, value: u16) {
        self.emit(&value.to_le_bytes());
    }

    #[inline]
    fn emit_u32(&mut self, value: u32) {
        self.emit(&value.to_le_bytes());
    }
}

fn size_u32(name: &str, size: u64) -> Result<u32> {
    u32::try_from(size)
        .map_err(|_| ExcelError::limit(format!("entry {} exceeds 4 GiB", name)))
}

/// MS-DOS time and date words; years outside 1980..=2107 are clamped
fn dos_timestamp(value: NaiveDateTime) -> (u16, u16) {
    let year = value.year().clamp(1980, 2107) as u16;
    let time = ((value.hour() as u16) << 11)
        | ((value.minute() as u16) << 5)
        | (value.second() as u16 / 2);
    let date = ((year - 1980) << 9) | ((value.month() as u16) << 5) | value.day() as u16;
    (time, date)
}
