//! Error types for fluxzip.

use std::io;

/// Result type for fluxzip operations.
pub type Result<T> = std::result::Result<T, FluxZipError>;

/// Error taxonomy for reading and writing ZIP archives.
#[derive(Debug)]
pub enum FluxZipError {
    /// I/O error from the underlying reader, writer, or entry source.
    /// Also covers a source stream failing mid-write.
    Io(io::Error),
    /// The blob isn't a well-formed ZIP archive: EOCD missing, a
    /// central directory entry's span runs off the end of the blob,
    /// a signature mismatch, or similar.
    BadFormat(String),
    /// The writer saw the same entry name twice.
    DuplicateName(String),
    /// An entry uses a compression method other than STORE or DEFLATE.
    UnsupportedMethod(u16),
    /// Lookup by name found nothing.
    EntryNotFound(String),
}

impl std::fmt::Display for FluxZipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FluxZipError::Io(e) => write!(f, "I/O error: {e}"),
            FluxZipError::BadFormat(msg) => write!(f, "bad ZIP format: {msg}"),
            FluxZipError::DuplicateName(name) => write!(f, "duplicate entry name: {name}"),
            FluxZipError::UnsupportedMethod(method) => {
                write!(f, "unsupported compression method: {method}")
            }
            FluxZipError::EntryNotFound(name) => write!(f, "entry not found: {name}"),
        }
    }
}

impl std::error::Error for FluxZipError {}

impl From<io::Error> for FluxZipError {
    fn from(err: io::Error) -> Self {
        FluxZipError::Io(err)
    }
}
