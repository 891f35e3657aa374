//! Streaming ZIP writer that never seeks.
//!
//! Entries are compressed on the fly as their data streams in, one at a
//! time, and every size/offset field a later extractor needs is recovered
//! after the fact from a trailing data descriptor and the central
//! directory written at the end — nothing is patched back into an
//! earlier part of the output.

pub mod entry;

pub use entry::EntryOptions;

use crate::crc::Crc32;
use crate::error::{FluxZipError, Result};
use crate::format::{
    self, entry_needs_zip64, pack_dos_datetime, CENTRAL_DIRECTORY_SIGNATURE,
    DATA_DESCRIPTOR_SIGNATURE, DEFAULT_GPBF, EOCD_SIGNATURE, LOCAL_FILE_HEADER_SIGNATURE,
    SENTINEL_16, SENTINEL_32, VERSION_CLASSIC, VERSION_ZIP64, ZIP64_EOCD_LOCATOR_SIGNATURE,
    ZIP64_EOCD_SIGNATURE, ZIP64_EOCD_SIZE_FIELD, ZIP64_EXTRA_TAG,
};
use log::{debug, trace, warn};
use std::collections::HashSet;
use std::io::Write;

/// A byte-counting wrapper around the caller's sink. This is the only
/// notion of "position" the writer has; it is never used to seek, only to
/// remember offsets for the central directory written at the very end.
struct OffsetWriter<W> {
    inner: W,
    offset: u64,
}

impl<W: Write> OffsetWriter<W> {
    fn new(inner: W) -> Self {
        OffsetWriter { inner, offset: 0 }
    }
}

impl<W: Write> Write for OffsetWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.offset += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

struct CurrentEntry<W: Write> {
    name: String,
    comment: String,
    last_modified: i64,
    is_directory: bool,
    local_header_offset: u64,
    data_start_offset: u64,
    crc: Crc32,
    uncompressed_count: u64,
    output: OffsetWriter<W>,
}

struct FinishedEntry {
    name: String,
    comment: String,
    last_modified: i64,
    is_directory: bool,
    local_header_offset: u64,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
}

/// Writes ZIP entries to any [`Write`] sink, one at a time, without ever
/// seeking backwards.
///
/// Call [`ZipWriter::start_entry`] to begin an entry, [`ZipWriter::write_data`]
/// zero or more times to stream its bytes, then either start the next
/// entry (which implicitly closes the previous one) or call
/// [`ZipWriter::finish`] to close the archive.
pub struct ZipWriter<W: Write> {
    output: Option<OffsetWriter<W>>,
    current_entry: Option<CurrentEntry<W>>,
    finished_entries: Vec<FinishedEntry>,
    seen_names: HashSet<String>,
}

impl<W: Write> ZipWriter<W> {
    pub fn new(sink: W) -> Self {
        ZipWriter {
            output: Some(OffsetWriter::new(sink)),
            current_entry: None,
            finished_entries: Vec::new(),
            seen_names: HashSet::new(),
        }
    }

    /// Begins a new entry, implicitly finishing whatever entry was open.
    pub fn start_entry(&mut self, options: EntryOptions) -> Result<()> {
        self.finish_current_entry()?;

        let name = options.stored_name();
        if !self.seen_names.insert(name.clone()) {
            return Err(FluxZipError::DuplicateName(name));
        }

        let mut output = self
            .output
            .take()
            .expect("writer output is missing between entries");
        let local_header_offset = output.offset;

        write_local_header(&mut output, &name, options.last_modified, local_header_offset)?;
        let data_start_offset = output.offset;

        trace!("start_entry: {name} at offset {local_header_offset}");
        self.current_entry = Some(CurrentEntry {
            name,
            comment: options.comment,
            last_modified: options.last_modified,
            is_directory: options.directory,
            local_header_offset,
            data_start_offset,
            crc: Crc32::new(),
            uncompressed_count: 0,
            output,
        });
        Ok(())
    }

    /// Streams more of the current entry's uncompressed bytes.
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        let entry = self
            .current_entry
            .as_mut()
            .ok_or_else(|| FluxZipError::BadFormat("no entry is open".into()))?;

        entry.crc.update(data);
        entry.uncompressed_count += data.len() as u64;
        entry.output.write_all(data)?;
        Ok(())
    }

    /// Closes the current entry, writing its trailing data descriptor.
    /// A no-op if no entry is open.
    pub fn finish_current_entry(&mut self) -> Result<()> {
        let Some(entry) = self.current_entry.take() else {
            return Ok(());
        };

        let crc32 = entry.crc.finalize();
        let uncompressed_size = entry.uncompressed_count;
        let mut output = entry.output;
        let compressed_size = output.offset - entry.data_start_offset;

        write_data_descriptor(
            &mut output,
            crc32,
            compressed_size,
            uncompressed_size,
            entry.local_header_offset,
        )?;

        debug!(
            "finished entry {}: {uncompressed_size} bytes, crc32={crc32:#010x}",
            entry.name
        );
        self.finished_entries.push(FinishedEntry {
            name: entry.name,
            comment: entry.comment,
            last_modified: entry.last_modified,
            is_directory: entry.is_directory,
            local_header_offset: entry.local_header_offset,
            crc32,
            compressed_size,
            uncompressed_size,
        });
        self.output = Some(output);
        Ok(())
    }

    /// Closes the final entry (if any), writes the central directory and
    /// end-of-central-directory records, and returns the underlying sink.
    pub fn finish(mut self) -> Result<W> {
        self.finish_current_entry()?;
        let mut output = self
            .output
            .take()
            .expect("writer output is missing at finish");

        let cd_offset = output.offset;
        for entry in &self.finished_entries {
            write_central_directory_entry(&mut output, entry)?;
        }
        let cd_size = output.offset - cd_offset;

        let needs_zip64 = self.finished_entries.len() > u16::MAX as usize
            || cd_size > u32::MAX as u64
            || cd_offset > u32::MAX as u64;

        if needs_zip64 {
            warn!(
                "archive promoted to ZIP64: {} entries, cd_size={cd_size}, cd_offset={cd_offset}",
                self.finished_entries.len()
            );
            write_zip64_eocd(&mut output, self.finished_entries.len() as u64, cd_size, cd_offset)?;
        }
        write_eocd(&mut output, self.finished_entries.len(), cd_size, cd_offset)?;

        output.flush()?;
        debug!("finish: {} entries, {} bytes total", self.finished_entries.len(), output.offset);
        Ok(output.inner)
    }
}

fn write_local_header<W: Write>(
    output: &mut OffsetWriter<W>,
    name: &str,
    last_modified: i64,
    local_header_offset: u64,
) -> Result<()> {
    let (dos_time, dos_date) = pack_dos_datetime(last_modified);
    let name_bytes = name.as_bytes();
    // Sizes aren't known yet (they trail in the data descriptor), but the
    // offset this header is being written at already is, so a ZIP64
    // local offset can be flagged up front instead of only at flush time.
    let version = if entry_needs_zip64(0, 0, local_header_offset) {
        VERSION_ZIP64
    } else {
        VERSION_CLASSIC
    };

    output.write_all(&LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes())?;
    output.write_all(&version.to_le_bytes())?;
    output.write_all(&DEFAULT_GPBF.to_le_bytes())?;
    output.write_all(&0u16.to_le_bytes())?; // compression method: always STORE
    output.write_all(&dos_time.to_le_bytes())?;
    output.write_all(&dos_date.to_le_bytes())?;
    output.write_all(&0u32.to_le_bytes())?; // crc-32: deferred to the data descriptor
    output.write_all(&0u32.to_le_bytes())?; // compressed size: deferred
    output.write_all(&0u32.to_le_bytes())?; // uncompressed size: deferred
    output.write_all(&(name_bytes.len() as u16).to_le_bytes())?;
    output.write_all(&0u16.to_le_bytes())?; // extra field length: writer emits none locally
    output.write_all(name_bytes)?;
    Ok(())
}

/// Writes the trailing data descriptor. Uses the 24-byte ZIP64 form (8-byte
/// sizes) whenever this entry needs ZIP64 by any of its three quantities,
/// not just when the sizes themselves overflow.
fn write_data_descriptor<W: Write>(
    output: &mut OffsetWriter<W>,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    local_header_offset: u64,
) -> Result<()> {
    output.write_all(&DATA_DESCRIPTOR_SIGNATURE.to_le_bytes())?;
    output.write_all(&crc32.to_le_bytes())?;
    if entry_needs_zip64(compressed_size, uncompressed_size, local_header_offset) {
        output.write_all(&compressed_size.to_le_bytes())?;
        output.write_all(&uncompressed_size.to_le_bytes())?;
    } else {
        output.write_all(&(compressed_size as u32).to_le_bytes())?;
        output.write_all(&(uncompressed_size as u32).to_le_bytes())?;
    }
    Ok(())
}

fn write_central_directory_entry<W: Write>(
    output: &mut OffsetWriter<W>,
    entry: &FinishedEntry,
) -> Result<()> {
    let is_zip64 = entry_needs_zip64(
        entry.compressed_size,
        entry.uncompressed_size,
        entry.local_header_offset,
    );
    let version = if is_zip64 { VERSION_ZIP64 } else { VERSION_CLASSIC };
    let (dos_time, dos_date) = pack_dos_datetime(entry.last_modified);
    let name_bytes = entry.name.as_bytes();
    let comment_bytes = entry.comment.as_bytes();

    let mut zip64_extra = Vec::new();
    if entry.uncompressed_size > u32::MAX as u64 {
        zip64_extra.extend_from_slice(&entry.uncompressed_size.to_le_bytes());
    }
    if entry.compressed_size > u32::MAX as u64 {
        zip64_extra.extend_from_slice(&entry.compressed_size.to_le_bytes());
    }
    if entry.local_header_offset > u32::MAX as u64 {
        zip64_extra.extend_from_slice(&entry.local_header_offset.to_le_bytes());
    }
    let extra = if zip64_extra.is_empty() {
        Vec::new()
    } else {
        let mut extra = Vec::with_capacity(4 + zip64_extra.len());
        extra.extend_from_slice(&ZIP64_EXTRA_TAG.to_le_bytes());
        extra.extend_from_slice(&(zip64_extra.len() as u16).to_le_bytes());
        extra.extend_from_slice(&zip64_extra);
        extra
    };

    output.write_all(&CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes())?;
    output.write_all(&version.to_le_bytes())?; // version made by
    output.write_all(&version.to_le_bytes())?; // version needed to extract
    output.write_all(&DEFAULT_GPBF.to_le_bytes())?;
    output.write_all(&0u16.to_le_bytes())?; // compression method: always STORE
    output.write_all(&dos_time.to_le_bytes())?;
    output.write_all(&dos_date.to_le_bytes())?;
    output.write_all(&entry.crc32.to_le_bytes())?;
    write_sized_u32(output, entry.compressed_size)?;
    write_sized_u32(output, entry.uncompressed_size)?;
    output.write_all(&(name_bytes.len() as u16).to_le_bytes())?;
    output.write_all(&(extra.len() as u16).to_le_bytes())?;
    output.write_all(&(comment_bytes.len() as u16).to_le_bytes())?;
    output.write_all(&0u16.to_le_bytes())?; // disk number start
    output.write_all(&0u16.to_le_bytes())?; // internal file attributes
    let external_attrs = if entry.is_directory {
        format::EXTERNAL_ATTR_DIRECTORY
    } else {
        0
    };
    output.write_all(&external_attrs.to_le_bytes())?;
    write_sized_u32(output, entry.local_header_offset)?;
    output.write_all(name_bytes)?;
    output.write_all(&extra)?;
    output.write_all(comment_bytes)?;
    Ok(())
}

fn write_sized_u32<W: Write>(output: &mut OffsetWriter<W>, value: u64) -> Result<()> {
    if value > u32::MAX as u64 {
        output.write_all(&SENTINEL_32.to_le_bytes())?;
    } else {
        output.write_all(&(value as u32).to_le_bytes())?;
    }
    Ok(())
}

fn write_zip64_eocd<W: Write>(
    output: &mut OffsetWriter<W>,
    entry_count: u64,
    cd_size: u64,
    cd_offset: u64,
) -> Result<()> {
    let zip64_eocd_offset = output.offset;

    output.write_all(&ZIP64_EOCD_SIGNATURE.to_le_bytes())?;
    output.write_all(&ZIP64_EOCD_SIZE_FIELD.to_le_bytes())?;
    output.write_all(&VERSION_ZIP64.to_le_bytes())?; // version made by
    output.write_all(&VERSION_ZIP64.to_le_bytes())?; // version needed to extract
    output.write_all(&0u32.to_le_bytes())?; // disk number
    output.write_all(&0u32.to_le_bytes())?; // disk with start of central directory
    output.write_all(&entry_count.to_le_bytes())?; // entries on this disk
    output.write_all(&entry_count.to_le_bytes())?; // total entries
    output.write_all(&cd_size.to_le_bytes())?;
    output.write_all(&cd_offset.to_le_bytes())?;

    output.write_all(&ZIP64_EOCD_LOCATOR_SIGNATURE.to_le_bytes())?;
    output.write_all(&0u32.to_le_bytes())?; // disk with zip64 EOCD
    output.write_all(&zip64_eocd_offset.to_le_bytes())?;
    output.write_all(&1u32.to_le_bytes())?; // total number of disks
    Ok(())
}

fn write_eocd<W: Write>(
    output: &mut OffsetWriter<W>,
    entry_count: usize,
    cd_size: u64,
    cd_offset: u64,
) -> Result<()> {
    output.write_all(&EOCD_SIGNATURE.to_le_bytes())?;
    output.write_all(&0u16.to_le_bytes())?; // disk number
    output.write_all(&0u16.to_le_bytes())?; // disk with start of central directory

    let entry_count_field = if entry_count > u16::MAX as usize {
        SENTINEL_16
    } else {
        entry_count as u16
    };
    output.write_all(&entry_count_field.to_le_bytes())?;
    output.write_all(&entry_count_field.to_le_bytes())?;
    write_sized_u32(output, cd_size)?;
    write_sized_u32(output, cd_offset)?;
    output.write_all(&0u16.to_le_bytes())?; // comment length
    Ok(())
}
