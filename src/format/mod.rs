//! Binary layout constants for the PKZIP format: signatures, sentinels,
//! and field widths shared by the writer and reader pipelines.
//!
//! Nothing here performs I/O; it's the vocabulary both sides speak.

pub mod datetime;

pub use datetime::{pack_dos_datetime, unpack_dos_datetime};

/// Local file header signature (`PK\x03\x04`).
pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4b50;
/// Data descriptor signature (`PK\x07\x08`).
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;
/// Central directory file header signature (`PK\x01\x02`).
pub const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0201_4b50;
/// End of central directory record signature (`PK\x05\x06`).
pub const EOCD_SIGNATURE: u32 = 0x0605_4b50;
/// ZIP64 end of central directory record signature (`PK\x06\x06`).
pub const ZIP64_EOCD_SIGNATURE: u32 = 0x0606_4b50;
/// ZIP64 end of central directory locator signature (`PK\x06\x07`).
pub const ZIP64_EOCD_LOCATOR_SIGNATURE: u32 = 0x0706_4b50;

/// Sentinel written into a 32-bit field when the real value lives in the
/// ZIP64 extra field.
pub const SENTINEL_32: u32 = 0xFFFF_FFFF;
/// Sentinel written into a 16-bit count field when ZIP64 is in effect.
pub const SENTINEL_16: u16 = 0xFFFF;

/// ZIP64 extended information extra field tag.
pub const ZIP64_EXTRA_TAG: u16 = 0x0001;
/// Info-ZIP Unicode Path extra field tag.
pub const UNICODE_PATH_EXTRA_TAG: u16 = 0x7075;

/// General purpose bit flag: file is encrypted.
pub const GPBF_ENCRYPTED: u16 = 1 << 0;
/// General purpose bit flag: sizes/CRC live in a trailing data descriptor.
pub const GPBF_DATA_DESCRIPTOR: u16 = 1 << 3;
/// General purpose bit flag: name and comment are UTF-8 (language encoding flag).
pub const GPBF_UTF8: u16 = 1 << 11;

/// Default general purpose bit flags this crate's writer emits.
pub const DEFAULT_GPBF: u16 = GPBF_DATA_DESCRIPTOR | GPBF_UTF8;

/// `version needed to extract` / `version made by` for classic entries.
pub const VERSION_CLASSIC: u16 = 20;
/// `version needed to extract` / `version made by` once ZIP64 is involved.
pub const VERSION_ZIP64: u16 = 45;

/// External attribute bit marking a central directory entry as a directory
/// (Unix `S_IFDIR` lives in the high word; bit 4 of the low word is the
/// legacy MS-DOS directory attribute every extractor still honors).
pub const EXTERNAL_ATTR_DIRECTORY: u32 = 1 << 4;

/// The maximum distance the EOCD search scans back from the end of the
/// blob: a 16-bit comment length (65535) plus the fixed 22-byte record.
pub const EOCD_SEARCH_WINDOW: u64 = 22 + 0xFFFF;

/// Fixed size of the End of Central Directory record, comment excluded.
pub const EOCD_FIXED_SIZE: usize = 22;
/// Fixed size of the ZIP64 End of Central Directory Locator.
pub const ZIP64_EOCD_LOCATOR_SIZE: usize = 20;
/// Size of the "size of zip64 end of central directory record" field's
/// worth of fixed fields that follow the 12-byte (signature + size) header.
pub const ZIP64_EOCD_SIZE_FIELD: u64 = 44;
/// Fixed size of a central directory file header, name/extra/comment excluded.
pub const CENTRAL_HEADER_FIXED_SIZE: usize = 46;
/// Fixed size of a local file header, name/extra excluded.
pub const LOCAL_HEADER_FIXED_SIZE: usize = 30;

/// Compression methods this crate understands.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Method 0: stored as-is.
    Store,
    /// Method 8: DEFLATE (RFC 1951).
    Deflate,
    /// Any other method code; reading it is an `UnsupportedMethod` error.
    Unsupported(u16),
}

impl CompressionMethod {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => CompressionMethod::Store,
            8 => CompressionMethod::Deflate,
            other => CompressionMethod::Unsupported(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            CompressionMethod::Store => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unsupported(code) => code,
        }
    }
}

/// Whether any of an entry's three size-ish quantities overflows a 32-bit
/// field, which is the per-entry ZIP64 promotion trigger.
pub fn entry_needs_zip64(compressed_size: u64, uncompressed_size: u64, local_offset: u64) -> bool {
    compressed_size > u32::MAX as u64
        || uncompressed_size > u32::MAX as u64
        || local_offset > u32::MAX as u64
}
