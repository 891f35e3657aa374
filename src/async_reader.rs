//! Async counterpart to [`crate::reader`], feature-gated behind `async`.
//!
//! Unlike the sync reader, which borrows a whole archive as `&[u8]`, this
//! one wraps anything that is both `AsyncRead` and `AsyncSeek` — a socket
//! won't do, but a file, an in-memory cursor, or a range-addressable
//! network stream will. Opening still parses the full central directory
//! eagerly; entry data is seeked to and read back only on demand.

use crate::error::{FluxZipError, Result};
use crate::format::{
    self, unpack_dos_datetime, CompressionMethod, CENTRAL_DIRECTORY_SIGNATURE,
    CENTRAL_HEADER_FIXED_SIZE, EOCD_FIXED_SIZE, EOCD_SEARCH_WINDOW, EOCD_SIGNATURE,
    LOCAL_FILE_HEADER_SIGNATURE, LOCAL_HEADER_FIXED_SIZE, SENTINEL_16, SENTINEL_32,
    ZIP64_EOCD_LOCATOR_SIGNATURE, ZIP64_EOCD_LOCATOR_SIZE, ZIP64_EOCD_SIGNATURE,
};
use crate::reader::{decode_text, extra, read_u16, read_u32, read_u64, Entry};
use async_compression::tokio::bufread::DeflateDecoder;
use log::{debug, trace, warn};
use std::io::SeekFrom;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, BufReader, Take};

/// A parsed ZIP archive read lazily from a seekable async source.
///
/// Mirrors [`crate::reader::ZipArchive`] one-for-one, down to sharing its
/// [`Entry`] type and central directory parsing rules; the only difference
/// is that entry bytes are fetched with a seek-then-read instead of a
/// slice index, since there's no whole-archive buffer to borrow from.
pub struct ZipArchive<R> {
    reader: R,
    entries: Vec<Entry>,
}

impl<R: AsyncRead + AsyncSeek + Unpin> ZipArchive<R> {
    /// Parses the end of central directory record (and, if present, its
    /// ZIP64 counterpart) and then the full central directory.
    pub async fn open(mut reader: R) -> Result<Self> {
        let eocd_offset = find_eocd(&mut reader).await?;
        trace!("EOCD found at offset {eocd_offset}");

        reader.seek(SeekFrom::Start(eocd_offset)).await?;
        let mut record = [0u8; EOCD_FIXED_SIZE];
        reader.read_exact(&mut record).await?;
        let total_entries = read_u16(&record, 10);
        let cd_size = read_u32(&record, 12) as u64;
        let cd_offset = read_u32(&record, 16) as u64;

        let (total_entries, cd_offset) = if total_entries as u64 == SENTINEL_16 as u64
            || cd_size == SENTINEL_32 as u64
            || cd_offset == SENTINEL_32 as u64
        {
            debug!("ZIP64 sentinels present, following locator to the ZIP64 EOCD");
            let (zip64_total, _zip64_cd_size, zip64_cd_offset) =
                read_zip64_eocd(&mut reader, eocd_offset).await?;
            (zip64_total, zip64_cd_offset)
        } else {
            (total_entries as u64, cd_offset)
        };

        let entries = parse_central_directory(&mut reader, cd_offset, total_entries).await?;
        debug!("parsed {} central directory entries", entries.len());
        Ok(ZipArchive { reader, entries })
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
    ///
    /// Takes `entry` by reference but needs a mutable seek on `self`, so
    /// borrow it from a clone of what [`Self::entries`] or [`Self::by_name`]
    /// returned rather than from `self` directly.
    pub async fn read(&mut self, entry: &Entry) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(entry.size() as usize);
        match self.read_raw(entry).await? {
            RawEntryReader::Store(mut r) => r.read_to_end(&mut out).await?,
            RawEntryReader::Deflate(mut r) => r.read_to_end(&mut out).await?,
        };
        Ok(out)
    }

    /// Reads an entry's data and verifies it against its stored CRC-32,
    /// returning [`FluxZipError::BadFormat`] on mismatch.
    pub async fn read_verified(&mut self, entry: &Entry) -> Result<Vec<u8>> {
        let data = self.read(entry).await?;
        let mut crc = crate::crc::Crc32::new();
        crc.update(&data);
        if crc.finalize() != entry.crc32() {
            return Err(FluxZipError::BadFormat(format!(
                "CRC-32 mismatch for entry {}",
                entry.name()
            )));
        }
        Ok(data)
    }

    /// Seeks to the entry's compressed data and returns a reader over it,
    /// decompressing on the fly for `DEFLATE` entries.
    async fn read_raw(&mut self, entry: &Entry) -> Result<RawEntryReader<'_, R>> {
        if entry.is_encrypted() {
            warn!("entry {} is encrypted; this crate cannot decrypt it", entry.name());
            return Err(FluxZipError::UnsupportedMethod(0));
        }

        let data = local_file_data(&mut self.reader, entry).await?;
        match entry.compression_method() {
            CompressionMethod::Store => Ok(RawEntryReader::Store(data)),
            CompressionMethod::Deflate => {
                Ok(RawEntryReader::Deflate(DeflateDecoder::new(BufReader::new(data))))
            }
            CompressionMethod::Unsupported(code) => Err(FluxZipError::UnsupportedMethod(code)),
        }
    }

    /// Returns the entry's stored bytes exactly as they sit in the
    /// archive, with no decompression applied.
    pub async fn raw_bytes(&mut self, entry: &Entry) -> Result<Vec<u8>> {
        let mut data = local_file_data(&mut self.reader, entry).await?;
        let mut out = Vec::with_capacity(entry.compressed_size() as usize);
        data.read_to_end(&mut out).await?;
        Ok(out)
    }

    /// Reads and fully decompresses one entry's data, decoding it as
    /// UTF-8 (lossily, replacing invalid sequences).
    pub async fn text(&mut self, entry: &Entry) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.read(entry).await?).into_owned())
    }

    /// Reconstructs the entry as a standalone `(name, last_modified,
    /// bytes)` triple, independent of any further archive state.
    pub async fn file(&mut self, entry: &Entry) -> Result<crate::reader::OwnedFile> {
        Ok(crate::reader::OwnedFile {
            name: entry.name().to_string(),
            last_modified: entry.last_modified(),
            bytes: self.read(entry).await?,
        })
    }

    /// Consumes the archive and returns the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// The two shapes an entry's compressed data can be read back through.
/// Kept as an enum rather than `Box<dyn AsyncRead>` so `read`/`read_verified`
/// don't need a `Send` bound on `R` just to box a trait object.
enum RawEntryReader<'r, R> {
    Store(Take<&'r mut R>),
    Deflate(DeflateDecoder<BufReader<Take<&'r mut R>>>),
}

/// Seeks to the local header at `entry.local_header_offset()`, validates
/// it, and skips past its name and extra field so the returned reader
/// starts exactly at the compressed data.
async fn local_file_data<'r, R: AsyncRead + AsyncSeek + Unpin>(
    reader: &'r mut R,
    entry: &Entry,
) -> Result<Take<&'r mut R>> {
    reader.seek(SeekFrom::Start(entry.local_header_offset())).await?;

    let mut header = [0u8; LOCAL_HEADER_FIXED_SIZE];
    reader.read_exact(&mut header).await?;
    if read_u32(&header, 0) != LOCAL_FILE_HEADER_SIGNATURE {
        return Err(FluxZipError::BadFormat(
            "local file header has the wrong signature".into(),
        ));
    }
    let name_len = read_u16(&header, 26) as i64;
    let extra_len = read_u16(&header, 28) as i64;
    reader.seek(SeekFrom::Current(name_len + extra_len)).await?;

    Ok(reader.take(entry.compressed_size()))
}

/// Scans backward from the end of the stream for the EOCD signature,
/// within the widest possible comment length (a 16-bit length field plus the fixed record size).
async fn find_eocd<R: AsyncRead + AsyncSeek + Unpin>(reader: &mut R) -> Result<u64> {
    let len = reader.seek(SeekFrom::End(0)).await?;
    if (len as usize) < EOCD_FIXED_SIZE {
        return Err(FluxZipError::BadFormat("stream too small to contain a ZIP".into()));
    }
    let window_size = EOCD_SEARCH_WINDOW.min(len);
    let window_start = len - window_size;

    reader.seek(SeekFrom::Start(window_start)).await?;
    let mut window = vec![0u8; window_size as usize];
    reader.read_exact(&mut window).await?;

    for i in (0..=window.len().saturating_sub(4)).rev() {
        if read_u32(&window, i) == EOCD_SIGNATURE {
            return Ok(window_start + i as u64);
        }
    }
    Err(FluxZipError::BadFormat(
        "end of central directory record not found".into(),
    ))
}

/// The ZIP64 locator sits immediately before the classic EOCD record,
/// a fixed 20 bytes, so no backward scan is needed.
async fn read_zip64_eocd<R: AsyncRead + AsyncSeek + Unpin>(
    reader: &mut R,
    eocd_offset: u64,
) -> Result<(u64, u64, u64)> {
    let locator_size = ZIP64_EOCD_LOCATOR_SIZE as u64;
    if eocd_offset < locator_size {
        return Err(FluxZipError::BadFormat(
            "ZIP64 EOCD locator not found before end of central directory record".into(),
        ));
    }
    reader.seek(SeekFrom::Start(eocd_offset - locator_size)).await?;
    let mut locator = [0u8; ZIP64_EOCD_LOCATOR_SIZE];
    reader.read_exact(&mut locator).await?;
    if read_u32(&locator, 0) != ZIP64_EOCD_LOCATOR_SIGNATURE {
        return Err(FluxZipError::BadFormat(
            "ZIP64 EOCD locator has the wrong signature".into(),
        ));
    }
    let zip64_eocd_offset = read_u64(&locator, 8);

    reader.seek(SeekFrom::Start(zip64_eocd_offset)).await?;
    let mut fixed = [0u8; 56];
    reader.read_exact(&mut fixed).await?;
    if read_u32(&fixed, 0) != ZIP64_EOCD_SIGNATURE {
        return Err(FluxZipError::BadFormat(
            "ZIP64 end of central directory record has the wrong signature".into(),
        ));
    }

    let total_entries = read_u64(&fixed, 32);
    let cd_size = read_u64(&fixed, 40);
    let cd_offset = read_u64(&fixed, 48);
    Ok((total_entries, cd_size, cd_offset))
}

/// Walks `total_entries` fixed-size-plus-variable-length central directory
/// headers starting at `cd_offset`, decoding each into an [`Entry`].
async fn parse_central_directory<R: AsyncRead + AsyncSeek + Unpin>(
    reader: &mut R,
    cd_offset: u64,
    total_entries: u64,
) -> Result<Vec<Entry>> {
    reader.seek(SeekFrom::Start(cd_offset)).await?;
    let mut entries = Vec::with_capacity(total_entries.min(1 << 20) as usize);

    for _ in 0..total_entries {
        let mut header = [0u8; CENTRAL_HEADER_FIXED_SIZE];
        reader.read_exact(&mut header).await?;
        if read_u32(&header, 0) != CENTRAL_DIRECTORY_SIGNATURE {
            return Err(FluxZipError::BadFormat(
                "central directory entry has the wrong signature".into(),
            ));
        }

        let flags = read_u16(&header, 8);
        let method_code = read_u16(&header, 10);
        let mod_time = read_u16(&header, 12);
        let mod_date = read_u16(&header, 14);
        let crc32 = read_u32(&header, 16);
        let compressed_size_32 = read_u32(&header, 20) as u64;
        let uncompressed_size_32 = read_u32(&header, 24) as u64;
        let name_len = read_u16(&header, 28) as usize;
        let extra_len = read_u16(&header, 30) as usize;
        let comment_len = read_u16(&header, 32) as usize;
        let external_attrs = read_u32(&header, 38);
        let local_header_offset_32 = read_u32(&header, 42) as u64;

        let mut name_bytes = vec![0u8; name_len];
        reader.read_exact(&mut name_bytes).await?;
        let mut extra_bytes = vec![0u8; extra_len];
        reader.read_exact(&mut extra_bytes).await?;
        let mut comment_bytes = vec![0u8; comment_len];
        reader.read_exact(&mut comment_bytes).await?;

        let want_uncompressed = uncompressed_size_32 == SENTINEL_32 as u64;
        let want_compressed = compressed_size_32 == SENTINEL_32 as u64;
        let want_offset = local_header_offset_32 == SENTINEL_32 as u64;
        let is_zip64 = want_uncompressed || want_compressed || want_offset;

        let zip64 = extra::parse_zip64(&extra_bytes, want_uncompressed, want_compressed, want_offset);
        let uncompressed_size = zip64.uncompressed_size.unwrap_or(uncompressed_size_32);
        let compressed_size = zip64.compressed_size.unwrap_or(compressed_size_32);
        let local_header_offset = zip64.local_offset.unwrap_or(local_header_offset_32);

        let is_utf8 = flags & format::GPBF_UTF8 != 0;
        let name = decode_text(&name_bytes, is_utf8, extra::unicode_path(&extra_bytes));
        let comment = decode_text(&comment_bytes, is_utf8, None);
        let is_directory = external_attrs & format::EXTERNAL_ATTR_DIRECTORY != 0
            || (uncompressed_size == 0 && name.ends_with('/'));
        let is_encrypted = flags & format::GPBF_ENCRYPTED != 0;

        entries.push(Entry {
            name,
            comment,
            uncompressed_size,
            compressed_size,
            compression_method: CompressionMethod::from_code(method_code),
            crc32,
            last_modified: unpack_dos_datetime(mod_time, mod_date),
            local_header_offset,
            is_directory,
            is_encrypted,
            is_zip64,
        });
    }

    Ok(entries)
}
