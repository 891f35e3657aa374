//! Per-entry options accepted by [`crate::writer::ZipWriter::start_entry`].

use std::time::{SystemTime, UNIX_EPOCH};

/// Describes the entry about to be written: its name, timestamp, and
/// whether it's a directory marker.
///
/// Construct with [`EntryOptions::new`] and chain the setters; unset fields
/// default to the current time. The writer always stores entries verbatim
/// (method 0); DEFLATE and every other compression method are a read-side
/// concern only.
#[derive(Debug, Clone)]
pub struct EntryOptions {
    pub(crate) name: String,
    pub(crate) last_modified: i64,
    pub(crate) directory: bool,
    pub(crate) comment: String,
}

impl EntryOptions {
    pub fn new(name: impl Into<String>) -> Self {
        EntryOptions {
            name: name.into(),
            last_modified: now_millis(),
            directory: false,
            comment: String::new(),
        }
    }

    /// Mark the entry as a directory: no data should be written to it and
    /// a trailing `/` is appended to the name if missing.
    pub fn directory(mut self) -> Self {
        self.directory = true;
        self
    }

    /// Overrides the default "now" last-modified timestamp, in milliseconds
    /// since the Unix epoch.
    pub fn last_modified(mut self, epoch_millis: i64) -> Self {
        self.last_modified = epoch_millis;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// The name as it will be written: surrounding whitespace trimmed, with
    /// a trailing slash enforced for directory entries.
    pub(crate) fn stored_name(&self) -> String {
        let trimmed = self.name.trim();
        if self.directory && !trimmed.ends_with('/') {
            format!("{trimmed}/")
        } else {
            trimmed.to_string()
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
