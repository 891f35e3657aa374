//! The entry handle returned by [`crate::reader::ZipArchive`] iteration and
//! lookup: everything the central directory knows about one file, derived
//! once when the archive is opened.

use crate::format::CompressionMethod;

/// Metadata for one entry, parsed out of its central directory file header.
///
/// Unlike the writer's [`crate::writer::EntryOptions`], this is a read-only
/// snapshot: it borrows nothing from the source blob directly so it can be
/// cloned and handed around freely; the entry's raw bytes are fetched
/// separately, on demand, through [`crate::reader::ZipArchive::read`].
#[derive(Debug, Clone)]
pub struct Entry {
    pub(crate) name: String,
    pub(crate) comment: String,
    pub(crate) uncompressed_size: u64,
    pub(crate) compressed_size: u64,
    pub(crate) compression_method: CompressionMethod,
    pub(crate) crc32: u32,
    pub(crate) last_modified: i64,
    pub(crate) local_header_offset: u64,
    pub(crate) is_directory: bool,
    pub(crate) is_encrypted: bool,
    pub(crate) is_zip64: bool,
}

impl Entry {
    /// The entry's path as stored in the archive, using `/` separators.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Per-entry comment, empty when the archive carried none.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Decompressed size in bytes.
    pub fn size(&self) -> u64 {
        self.uncompressed_size
    }

    /// On-disk size in bytes, before decompression.
    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    pub fn compression_method(&self) -> CompressionMethod {
        self.compression_method
    }

    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Last modified time, milliseconds since the Unix epoch, recovered
    /// from the archive's MS-DOS date/time fields (2-second resolution).
    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }

    /// Whether this entry represents a directory rather than a file.
    pub fn is_dir(&self) -> bool {
        self.is_directory
    }

    pub fn is_file(&self) -> bool {
        !self.is_directory
    }

    /// Whether the general purpose bit flag's encryption bit is set. This
    /// crate cannot decrypt such entries; [`crate::reader::ZipArchive::read`]
    /// returns [`crate::error::FluxZipError::UnsupportedMethod`] for them.
    pub fn is_encrypted(&self) -> bool {
        self.is_encrypted
    }

    /// Whether any of this entry's size/offset fields overflowed 32 bits
    /// and had to be recovered from a ZIP64 extra field.
    pub fn is_zip64(&self) -> bool {
        self.is_zip64
    }

    /// Overrides the name on this handle. This is an in-memory rename only:
    /// it does not touch the archive the entry was parsed from, and a fresh
    /// [`crate::reader::ZipArchive::by_name`] lookup still uses the name on
    /// disk.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Overrides the last-modified timestamp on this handle, in milliseconds
    /// since the Unix epoch. In-memory only, like [`Entry::set_name`].
    pub fn set_last_modified(&mut self, last_modified: i64) {
        self.last_modified = last_modified;
    }

    /// The entry's local header offset within the archive: where the
    /// local file header that precedes its data begins.
    pub fn offset(&self) -> u64 {
        self.local_header_offset
    }

    pub(crate) fn local_header_offset(&self) -> u64 {
        self.local_header_offset
    }
}
