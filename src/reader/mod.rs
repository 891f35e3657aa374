//! Lazy reader over a ZIP archive held as a single random-access byte slice.
//!
//! Opening an archive parses the central directory once, eagerly, into a
//! `Vec<Entry>`: every entry's metadata is available immediately. An
//! entry's compressed bytes are only read and, if needed,
//! inflated when the caller asks for them through [`ZipArchive::read`] or
//! [`ZipArchive::read_raw`] — nothing beyond the central directory is
//! touched up front.

pub mod entry;
pub mod extra;

pub use entry::Entry;

use crate::crc::Crc32;
use crate::error::{FluxZipError, Result};
use crate::format::{
    self, unpack_dos_datetime, CompressionMethod, CENTRAL_DIRECTORY_SIGNATURE,
    CENTRAL_HEADER_FIXED_SIZE, EOCD_FIXED_SIZE, EOCD_SEARCH_WINDOW, EOCD_SIGNATURE,
    LOCAL_FILE_HEADER_SIGNATURE, LOCAL_HEADER_FIXED_SIZE, SENTINEL_16, SENTINEL_32,
    ZIP64_EOCD_LOCATOR_SIGNATURE, ZIP64_EOCD_LOCATOR_SIZE, ZIP64_EOCD_SIGNATURE,
};
use codepage_437::{BorrowFromCp437, CP437_CONTROL};
use flate2::read::DeflateDecoder;
use log::{debug, trace, warn};
use std::borrow::Cow;
use std::io::Read;

/// A parsed ZIP archive backed by a borrowed byte slice.
///
/// The archive never copies or owns the blob: every entry's raw data is
/// served as a sub-slice, so opening and listing entries is cheap
/// regardless of archive size, and reading one entry never pulls in the
/// bytes of any other.
pub struct ZipArchive<'a> {
    blob: &'a [u8],
    entries: Vec<Entry>,
}

impl<'a> ZipArchive<'a> {
    /// Parses the end of central directory record (and, if present, its
    /// ZIP64 counterpart) and then the full central directory.
    pub fn open(blob: &'a [u8]) -> Result<Self> {
        let eocd_offset = find_eocd(blob)?;
        trace!("EOCD found at offset {eocd_offset}");
        let (total_entries, cd_size, cd_offset) = read_eocd(blob, eocd_offset)?;

        let (total_entries, cd_offset) = if total_entries as u64 == SENTINEL_16 as u64
            || cd_size == SENTINEL_32 as u64
            || cd_offset == SENTINEL_32 as u64
        {
            debug!("ZIP64 sentinels present, following locator to the ZIP64 EOCD");
            let (zip64_total, _zip64_cd_size, zip64_cd_offset) = read_zip64_eocd(blob, eocd_offset)?;
            (zip64_total, zip64_cd_offset)
        } else {
            (total_entries as u64, cd_offset)
        };

        let entries = parse_central_directory(blob, cd_offset, total_entries)?;
        debug!("parsed {} central directory entries", entries.len());
        Ok(ZipArchive { blob, entries })
    }

    /// All entries, in the order they appear in the central directory.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Looks up an entry by its exact stored name.
    pub fn by_name(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    /// Reads and fully decompresses one entry's data.
    pub fn read(&self, entry: &Entry) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(entry.size() as usize);
        self.read_raw(entry)?.read_to_end(&mut out)?;
        Ok(out)
    }

    /// Returns a reader that decompresses the entry's data on the fly,
    /// without allocating a buffer for the whole thing up front.
    pub fn read_raw(&self, entry: &Entry) -> Result<Box<dyn Read + 'a>> {
        if entry.is_encrypted() {
            warn!("entry {} is encrypted; this crate cannot decrypt it", entry.name());
            return Err(FluxZipError::UnsupportedMethod(0));
        }

        let data = local_file_data(self.blob, entry)?;
        match entry.compression_method() {
            CompressionMethod::Store => Ok(Box::new(data)),
            CompressionMethod::Deflate => Ok(Box::new(DeflateDecoder::new(data))),
            CompressionMethod::Unsupported(code) => Err(FluxZipError::UnsupportedMethod(code)),
        }
    }

    /// Reads an entry's data and verifies it against its stored CRC-32,
    /// returning [`FluxZipError::BadFormat`] on mismatch.
    pub fn read_verified(&self, entry: &Entry) -> Result<Vec<u8>> {
        let data = self.read(entry)?;
        let mut crc = Crc32::new();
        crc.update(&data);
        if crc.finalize() != entry.crc32() {
            return Err(FluxZipError::BadFormat(format!(
                "CRC-32 mismatch for entry {}",
                entry.name()
            )));
        }
        Ok(data)
    }

    /// Returns the entry's stored bytes exactly as they sit in the
    /// archive, with no decompression applied — distinct from `read`/`text`,
    /// which also inflate DEFLATE-compressed entries.
    pub fn raw_bytes(&self, entry: &Entry) -> Result<&'a [u8]> {
        local_file_data(self.blob, entry)
    }

    /// Reads and fully decompresses one entry's data, decoding it as
    /// UTF-8 (lossily, replacing invalid sequences).
    pub fn text(&self, entry: &Entry) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.read(entry)?).into_owned())
    }

    /// Reconstructs the entry as a standalone `(name, last_modified,
    /// bytes)` triple that owns its data, independent of the archive's
    /// borrowed blob.
    pub fn file(&self, entry: &Entry) -> Result<OwnedFile> {
        Ok(OwnedFile {
            name: entry.name().to_string(),
            last_modified: entry.last_modified(),
            bytes: self.read(entry)?,
        })
    }
}

/// A fully materialized entry: its name, timestamp, and decompressed
/// bytes, with no remaining borrow on the archive it came from.
#[derive(Debug, Clone)]
pub struct OwnedFile {
    pub name: String,
    pub last_modified: i64,
    pub bytes: Vec<u8>,
}

/// Slices out the local header at `entry.local_header_offset()` and skips
/// past its name and extra field to reach the compressed data.
fn local_file_data<'a>(blob: &'a [u8], entry: &Entry) -> Result<&'a [u8]> {
    let offset = entry.local_header_offset() as usize;
    let header = blob
        .get(offset..offset + LOCAL_HEADER_FIXED_SIZE)
        .ok_or_else(|| FluxZipError::BadFormat("local file header runs past end of blob".into()))?;

    let signature = read_u32(header, 0);
    if signature != LOCAL_FILE_HEADER_SIGNATURE {
        return Err(FluxZipError::BadFormat(
            "local file header has the wrong signature".into(),
        ));
    }
    let name_len = read_u16(header, 26) as usize;
    let extra_len = read_u16(header, 28) as usize;

    let data_start = offset + LOCAL_HEADER_FIXED_SIZE + name_len + extra_len;
    let data_end = data_start + entry.compressed_size() as usize;
    blob.get(data_start..data_end)
        .ok_or_else(|| FluxZipError::BadFormat("entry data runs past end of blob".into()))
}

/// Scans backward from the end of the blob for the EOCD signature, within
/// the widest possible comment length (a 16-bit length field plus the fixed record size).
fn find_eocd(blob: &[u8]) -> Result<usize> {
    if blob.len() < EOCD_FIXED_SIZE {
        return Err(FluxZipError::BadFormat("blob too small to contain a ZIP".into()));
    }
    let window_start = blob.len().saturating_sub(EOCD_SEARCH_WINDOW as usize);
    let window = &blob[window_start..];

    for i in (0..=window.len().saturating_sub(4)).rev() {
        if read_u32(window, i) == EOCD_SIGNATURE {
            return Ok(window_start + i);
        }
    }
    Err(FluxZipError::BadFormat(
        "end of central directory record not found".into(),
    ))
}

/// Reads the classic EOCD record's entry count, central directory size,
/// and central directory offset (still possibly ZIP64 sentinels).
fn read_eocd(blob: &[u8], eocd_offset: usize) -> Result<(u16, u64, u64)> {
    let record = blob
        .get(eocd_offset..eocd_offset + EOCD_FIXED_SIZE)
        .ok_or_else(|| FluxZipError::BadFormat("EOCD record runs past end of blob".into()))?;

    let total_entries = read_u16(record, 10);
    let cd_size = read_u32(record, 12) as u64;
    let cd_offset = read_u32(record, 16) as u64;
    Ok((total_entries, cd_size, cd_offset))
}

/// The ZIP64 locator sits immediately before the classic EOCD record,
/// a fixed 20 bytes, so no backward scan is needed.
fn read_zip64_eocd(blob: &[u8], eocd_offset: usize) -> Result<(u64, u64, u64)> {
    if eocd_offset < ZIP64_EOCD_LOCATOR_SIZE {
        return Err(FluxZipError::BadFormat(
            "ZIP64 EOCD locator not found before end of central directory record".into(),
        ));
    }
    let locator_offset = eocd_offset - ZIP64_EOCD_LOCATOR_SIZE;
    let locator = blob
        .get(locator_offset..locator_offset + ZIP64_EOCD_LOCATOR_SIZE)
        .ok_or_else(|| FluxZipError::BadFormat("ZIP64 EOCD locator runs past end of blob".into()))?;

    if read_u32(locator, 0) != ZIP64_EOCD_LOCATOR_SIGNATURE {
        return Err(FluxZipError::BadFormat(
            "ZIP64 EOCD locator has the wrong signature".into(),
        ));
    }
    let zip64_eocd_offset = read_u64(locator, 8) as usize;

    let fixed = blob.get(zip64_eocd_offset..zip64_eocd_offset + 56).ok_or_else(|| {
        FluxZipError::BadFormat("ZIP64 end of central directory record runs past end of blob".into())
    })?;
    if read_u32(fixed, 0) != ZIP64_EOCD_SIGNATURE {
        return Err(FluxZipError::BadFormat(
            "ZIP64 end of central directory record has the wrong signature".into(),
        ));
    }

    let total_entries = read_u64(fixed, 32);
    let cd_size = read_u64(fixed, 40);
    let cd_offset = read_u64(fixed, 48);
    Ok((total_entries, cd_size, cd_offset))
}

/// Walks `total_entries` fixed-size-plus-variable-length central directory
/// headers starting at `cd_offset`, decoding each into an [`Entry`].
fn parse_central_directory(blob: &[u8], cd_offset: u64, total_entries: u64) -> Result<Vec<Entry>> {
    let mut entries = Vec::with_capacity(total_entries.min(1 << 20) as usize);
    let mut cursor = cd_offset as usize;

    for _ in 0..total_entries {
        let header = blob
            .get(cursor..cursor + CENTRAL_HEADER_FIXED_SIZE)
            .ok_or_else(|| FluxZipError::BadFormat("central directory entry runs past end of blob".into()))?;

        if read_u32(header, 0) != CENTRAL_DIRECTORY_SIGNATURE {
            return Err(FluxZipError::BadFormat(
                "central directory entry has the wrong signature".into(),
            ));
        }

        let flags = read_u16(header, 8);
        let method_code = read_u16(header, 10);
        let mod_time = read_u16(header, 12);
        let mod_date = read_u16(header, 14);
        let crc32 = read_u32(header, 16);
        let compressed_size_32 = read_u32(header, 20) as u64;
        let uncompressed_size_32 = read_u32(header, 24) as u64;
        let name_len = read_u16(header, 28) as usize;
        let extra_len = read_u16(header, 30) as usize;
        let comment_len = read_u16(header, 32) as usize;
        let external_attrs = read_u32(header, 38);
        let local_header_offset_32 = read_u32(header, 42) as u64;

        let mut field_cursor = cursor + CENTRAL_HEADER_FIXED_SIZE;
        let name_bytes = blob
            .get(field_cursor..field_cursor + name_len)
            .ok_or_else(|| FluxZipError::BadFormat("entry name runs past end of blob".into()))?;
        field_cursor += name_len;

        let extra_bytes = blob
            .get(field_cursor..field_cursor + extra_len)
            .ok_or_else(|| FluxZipError::BadFormat("entry extra field runs past end of blob".into()))?;
        field_cursor += extra_len;

        let comment_bytes = blob
            .get(field_cursor..field_cursor + comment_len)
            .ok_or_else(|| FluxZipError::BadFormat("entry comment runs past end of blob".into()))?;
        field_cursor += comment_len;

        let want_uncompressed = uncompressed_size_32 == SENTINEL_32 as u64;
        let want_compressed = compressed_size_32 == SENTINEL_32 as u64;
        let want_offset = local_header_offset_32 == SENTINEL_32 as u64;
        let is_zip64 = want_uncompressed || want_compressed || want_offset;

        let zip64 = extra::parse_zip64(extra_bytes, want_uncompressed, want_compressed, want_offset);
        let uncompressed_size = zip64.uncompressed_size.unwrap_or(uncompressed_size_32);
        let compressed_size = zip64.compressed_size.unwrap_or(compressed_size_32);
        let local_header_offset = zip64.local_offset.unwrap_or(local_header_offset_32);

        let is_utf8 = flags & format::GPBF_UTF8 != 0;
        let name = decode_text(name_bytes, is_utf8, extra::unicode_path(extra_bytes));
        let comment = decode_text(comment_bytes, is_utf8, None);

        entries.push(Entry {
            name: name.clone(),
            comment,
            uncompressed_size,
            compressed_size,
            compression_method: CompressionMethod::from_code(method_code),
            crc32,
            last_modified: unpack_dos_datetime(mod_time, mod_date),
            local_header_offset,
            is_directory: external_attrs & format::EXTERNAL_ATTR_DIRECTORY != 0
                || (uncompressed_size == 0 && name.ends_with('/')),
            is_encrypted: flags & format::GPBF_ENCRYPTED != 0,
            is_zip64,
        });

        cursor = field_cursor;
    }

    Ok(entries)
}

/// Decodes a name or comment: UTF-8 if the language-encoding flag is set,
/// else the Unicode Path extra field if one was supplied, else CP437.
///
/// Shared with [`crate::async_reader`], which parses the same central
/// directory layout over a seekable async source instead of a byte slice.
pub(crate) fn decode_text(bytes: &[u8], is_utf8: bool, unicode_path: Option<&[u8]>) -> String {
    if is_utf8 {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    if let Some(path_bytes) = unicode_path {
        if let Ok(s) = std::str::from_utf8(path_bytes) {
            return s.to_string();
        }
    }
    match Cow::borrow_from_cp437(bytes, &CP437_CONTROL) {
        Cow::Borrowed(s) => s.to_string(),
        Cow::Owned(s) => s,
    }
}

pub(crate) fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub(crate) fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

pub(crate) fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}
