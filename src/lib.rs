//! # fluxzip: streaming ZIP archive codec with full ZIP64 support
//!
//! `fluxzip` writes ZIP archives one entry at a time, without ever seeking
//! backward in its output, and reads them lazily from any random-access
//! byte slice, parsing the central directory once and fetching each
//! entry's bytes only when asked for. ZIP64 is handled transparently in
//! both directions: entries or archives that overflow a 32-bit field get
//! the ZIP64 extra fields and end-of-central-directory records they need,
//! with no separate API to opt into.
//!
//! ## Writing
//!
//! ```no_run
//! use fluxzip::writer::{EntryOptions, ZipWriter};
//! use std::fs::File;
//!
//! let file = File::create("output.zip")?;
//! let mut writer = ZipWriter::new(file);
//!
//! writer.start_entry(EntryOptions::new("hello.txt"))?;
//! writer.write_data(b"Hello, World!")?;
//!
//! writer.finish()?;
//! # Ok::<(), fluxzip::FluxZipError>(())
//! ```
//!
//! ## Reading
//!
//! ```no_run
//! use fluxzip::reader::ZipArchive;
//!
//! let bytes = std::fs::read("output.zip")?;
//! let archive = ZipArchive::open(&bytes)?;
//!
//! for entry in archive.entries() {
//!     println!("{}: {} bytes", entry.name(), entry.size());
//! }
//!
//! let data = archive.read(archive.by_name("hello.txt").unwrap())?;
//! # Ok::<(), fluxzip::FluxZipError>(())
//! ```
//!
//! The `async` feature adds [`async_reader`] and [`async_writer`],
//! mirroring this API over `tokio::io::AsyncRead` / `AsyncWrite` for
//! archives read from or written to a network socket.

pub mod crc;
pub mod error;
pub mod format;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_reader;
#[cfg(feature = "async")]
pub mod async_writer;

pub use error::{FluxZipError, Result};
pub use reader::{Entry, OwnedFile, ZipArchive};
pub use writer::{EntryOptions, ZipWriter};
