//! Async counterpart to [`crate::writer`], feature-gated behind `async`.
//!
//! Same seek-free protocol as the sync writer, driven over
//! `tokio::io::AsyncWrite` instead of `std::io::Write`, so it streams
//! straight onto a socket or any other non-seekable async sink.

use crate::error::{FluxZipError, Result};
use crate::format::{
    self, entry_needs_zip64, pack_dos_datetime, CENTRAL_DIRECTORY_SIGNATURE,
    DATA_DESCRIPTOR_SIGNATURE, DEFAULT_GPBF, EOCD_SIGNATURE, LOCAL_FILE_HEADER_SIGNATURE,
    SENTINEL_16, SENTINEL_32, VERSION_CLASSIC, VERSION_ZIP64, ZIP64_EOCD_LOCATOR_SIGNATURE,
    ZIP64_EOCD_SIGNATURE, ZIP64_EOCD_SIZE_FIELD, ZIP64_EXTRA_TAG,
};
use crate::writer::EntryOptions;
use crc32fast::Hasher as Crc32Hasher;
use log::{debug, trace, warn};
use pin_project_lite::pin_project;
use std::collections::HashSet;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncWrite, AsyncWriteExt};

pin_project! {
    /// Counts bytes written through it; the only notion of "position" the
    /// async writer has, since it never seeks.
    struct AsyncOffsetWriter<W> {
        #[pin]
        inner: W,
        offset: u64,
    }
}

impl<W> AsyncOffsetWriter<W> {
    fn new(inner: W) -> Self {
        AsyncOffsetWriter { inner, offset: 0 }
    }
}

impl<W: AsyncWrite> AsyncWrite for AsyncOffsetWriter<W> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.project();
        let poll = this.inner.poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &poll {
            *this.offset += *n as u64;
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }
}

struct CurrentEntry<W: AsyncWrite + Unpin> {
    name: String,
    comment: String,
    last_modified: i64,
    is_directory: bool,
    local_header_offset: u64,
    data_start_offset: u64,
    crc: Crc32Hasher,
    uncompressed_count: u64,
    output: AsyncOffsetWriter<W>,
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

/// Async streaming ZIP writer. See [`crate::writer::ZipWriter`] for the
/// entry protocol; this mirrors it one-for-one over `AsyncWrite`.
pub struct ZipWriter<W: AsyncWrite + Unpin> {
    output: Option<AsyncOffsetWriter<W>>,
    current_entry: Option<CurrentEntry<W>>,
    finished_entries: Vec<FinishedEntry>,
    seen_names: HashSet<String>,
}

impl<W: AsyncWrite + Unpin> ZipWriter<W> {
    pub fn new(sink: W) -> Self {
        ZipWriter {
            output: Some(AsyncOffsetWriter::new(sink)),
            current_entry: None,
            finished_entries: Vec::new(),
            seen_names: HashSet::new(),
        }
    }

    pub async fn start_entry(&mut self, options: EntryOptions) -> Result<()> {
        self.finish_current_entry().await?;

        let name = options.stored_name();
        if !self.seen_names.insert(name.clone()) {
            return Err(FluxZipError::DuplicateName(name));
        }

        let mut output = self
            .output
            .take()
            .expect("writer output is missing between entries");
        let local_header_offset = output.offset;

        write_local_header(&mut output, &name, options.last_modified, local_header_offset).await?;
        let data_start_offset = output.offset;

        trace!("start_entry: {name} at offset {local_header_offset}");
        self.current_entry = Some(CurrentEntry {
            name,
            comment: options.comment,
            last_modified: options.last_modified,
            is_directory: options.directory,
            local_header_offset,
            data_start_offset,
            crc: Crc32Hasher::new(),
            uncompressed_count: 0,
            output,
        });
        Ok(())
    }

    pub async fn write_data(&mut self, data: &[u8]) -> Result<()> {
        let entry = self
            .current_entry
            .as_mut()
            .ok_or_else(|| FluxZipError::BadFormat("no entry is open".into()))?;

        entry.crc.update(data);
        entry.uncompressed_count += data.len() as u64;
        entry.output.write_all(data).await?;
        Ok(())
    }

    pub async fn finish_current_entry(&mut self) -> Result<()> {
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
        )
        .await?;

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

    /// Closes the final entry, writes the central directory and
    /// end-of-central-directory records, flushes and shuts down the
    /// sink (required for multipart-style sinks to complete), and
    /// returns it.
    pub async fn finish(mut self) -> Result<W> {
        self.finish_current_entry().await?;
        let mut output = self
            .output
            .take()
            .expect("writer output is missing at finish");

        let cd_offset = output.offset;
        for entry in &self.finished_entries {
            write_central_directory_entry(&mut output, entry).await?;
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
            write_zip64_eocd(&mut output, self.finished_entries.len() as u64, cd_size, cd_offset)
                .await?;
        }
        write_eocd(&mut output, self.finished_entries.len(), cd_size, cd_offset).await?;

        output.flush().await?;
        output.shutdown().await?;
        debug!("finish: {} entries, {} bytes total", self.finished_entries.len(), output.offset);
        Ok(output.inner)
    }
}

async fn write_local_header<W: AsyncWrite + Unpin>(
    output: &mut AsyncOffsetWriter<W>,
    name: &str,
    last_modified: i64,
    local_header_offset: u64,
) -> Result<()> {
    let (dos_time, dos_date) = pack_dos_datetime(last_modified);
    let name_bytes = name.as_bytes();
    let version = if entry_needs_zip64(0, 0, local_header_offset) {
        VERSION_ZIP64
    } else {
        VERSION_CLASSIC
    };

    output.write_all(&LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes()).await?;
    output.write_all(&version.to_le_bytes()).await?;
    output.write_all(&DEFAULT_GPBF.to_le_bytes()).await?;
    output.write_all(&0u16.to_le_bytes()).await?; // compression method: always STORE
    output.write_all(&dos_time.to_le_bytes()).await?;
    output.write_all(&dos_date.to_le_bytes()).await?;
    output.write_all(&0u32.to_le_bytes()).await?;
    output.write_all(&0u32.to_le_bytes()).await?;
    output.write_all(&0u32.to_le_bytes()).await?;
    output.write_all(&(name_bytes.len() as u16).to_le_bytes()).await?;
    output.write_all(&0u16.to_le_bytes()).await?;
    output.write_all(name_bytes).await?;
    Ok(())
}

async fn write_data_descriptor<W: AsyncWrite + Unpin>(
    output: &mut AsyncOffsetWriter<W>,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    local_header_offset: u64,
) -> Result<()> {
    output.write_all(&DATA_DESCRIPTOR_SIGNATURE.to_le_bytes()).await?;
    output.write_all(&crc32.to_le_bytes()).await?;
    if entry_needs_zip64(compressed_size, uncompressed_size, local_header_offset) {
        output.write_all(&compressed_size.to_le_bytes()).await?;
        output.write_all(&uncompressed_size.to_le_bytes()).await?;
    } else {
        output.write_all(&(compressed_size as u32).to_le_bytes()).await?;
        output.write_all(&(uncompressed_size as u32).to_le_bytes()).await?;
    }
    Ok(())
}

async fn write_central_directory_entry<W: AsyncWrite + Unpin>(
    output: &mut AsyncOffsetWriter<W>,
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

    output.write_all(&CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes()).await?;
    output.write_all(&version.to_le_bytes()).await?;
    output.write_all(&version.to_le_bytes()).await?;
    output.write_all(&DEFAULT_GPBF.to_le_bytes()).await?;
    output.write_all(&0u16.to_le_bytes()).await?; // compression method: always STORE
    output.write_all(&dos_time.to_le_bytes()).await?;
    output.write_all(&dos_date.to_le_bytes()).await?;
    output.write_all(&entry.crc32.to_le_bytes()).await?;
    write_sized_u32(output, entry.compressed_size).await?;
    write_sized_u32(output, entry.uncompressed_size).await?;
    output.write_all(&(name_bytes.len() as u16).to_le_bytes()).await?;
    output.write_all(&(extra.len() as u16).to_le_bytes()).await?;
    output.write_all(&(comment_bytes.len() as u16).to_le_bytes()).await?;
    output.write_all(&0u16.to_le_bytes()).await?;
    output.write_all(&0u16.to_le_bytes()).await?;
    let external_attrs = if entry.is_directory {
        format::EXTERNAL_ATTR_DIRECTORY
    } else {
        0
    };
    output.write_all(&external_attrs.to_le_bytes()).await?;
    write_sized_u32(output, entry.local_header_offset).await?;
    output.write_all(name_bytes).await?;
    output.write_all(&extra).await?;
    output.write_all(comment_bytes).await?;
    Ok(())
}

async fn write_sized_u32<W: AsyncWrite + Unpin>(
    output: &mut AsyncOffsetWriter<W>,
    value: u64,
) -> Result<()> {
    if value > u32::MAX as u64 {
        output.write_all(&SENTINEL_32.to_le_bytes()).await?;
    } else {
        output.write_all(&(value as u32).to_le_bytes()).await?;
    }
    Ok(())
}

async fn write_zip64_eocd<W: AsyncWrite + Unpin>(
    output: &mut AsyncOffsetWriter<W>,
    entry_count: u64,
    cd_size: u64,
    cd_offset: u64,
) -> Result<()> {
    let zip64_eocd_offset = output.offset;

    output.write_all(&ZIP64_EOCD_SIGNATURE.to_le_bytes()).await?;
    output.write_all(&ZIP64_EOCD_SIZE_FIELD.to_le_bytes()).await?;
    output.write_all(&VERSION_ZIP64.to_le_bytes()).await?;
    output.write_all(&VERSION_ZIP64.to_le_bytes()).await?;
    output.write_all(&0u32.to_le_bytes()).await?;
    output.write_all(&0u32.to_le_bytes()).await?;
    output.write_all(&entry_count.to_le_bytes()).await?;
    output.write_all(&entry_count.to_le_bytes()).await?;
    output.write_all(&cd_size.to_le_bytes()).await?;
    output.write_all(&cd_offset.to_le_bytes()).await?;

    output.write_all(&ZIP64_EOCD_LOCATOR_SIGNATURE.to_le_bytes()).await?;
    output.write_all(&0u32.to_le_bytes()).await?;
    output.write_all(&zip64_eocd_offset.to_le_bytes()).await?;
    output.write_all(&1u32.to_le_bytes()).await?;
    Ok(())
}

async fn write_eocd<W: AsyncWrite + Unpin>(
    output: &mut AsyncOffsetWriter<W>,
    entry_count: usize,
    cd_size: u64,
    cd_offset: u64,
) -> Result<()> {
    output.write_all(&EOCD_SIGNATURE.to_le_bytes()).await?;
    output.write_all(&0u16.to_le_bytes()).await?;
    output.write_all(&0u16.to_le_bytes()).await?;

    let entry_count_field = if entry_count > u16::MAX as usize {
        SENTINEL_16
    } else {
        entry_count as u16
    };
    output.write_all(&entry_count_field.to_le_bytes()).await?;
    output.write_all(&entry_count_field.to_le_bytes()).await?;
    write_sized_u32(output, cd_size).await?;
    write_sized_u32(output, cd_offset).await?;
    output.write_all(&0u16.to_le_bytes()).await?;
    Ok(())
}
