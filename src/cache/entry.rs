// Derived view of an entry file.
// An entry has no stored metadata of its own: size and expiry come from the file.

use std::fs::Metadata;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata for an entry file on disk.
///
/// `expires_at` is the file's modification time. `set` overwrites it with the
/// expiry instant, so the time it was written cannot be recovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    /// Location of the entry file.
    pub path: PathBuf,
    /// Size of the stored payload in bytes.
    pub size: u64,
    /// Instant after which the entry is no longer served.
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub(crate) fn from_metadata(path: PathBuf, metadata: &Metadata) -> std::io::Result<Self> {
        Ok(Self {
            path,
            size: metadata.len(),
            expires_at: DateTime::<Utc>::from(metadata.modified()?),
        })
    }

    /// Fresh means the expiry marker is strictly after `now`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Check if this entry is still served.
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    /// Check if this entry has expired.
    pub fn is_expired(&self) -> bool {
        !self.is_fresh()
    }
}

/// Observable state of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    /// No file exists for the key.
    Absent,
    /// An empty file exists that was never populated.
    Placeholder(CacheEntry),
    /// A file exists whose expiry marker is in the future.
    Fresh(CacheEntry),
    /// A file exists whose expiry marker is now or in the past.
    Stale(CacheEntry),
}

impl EntryState {
    pub(crate) fn classify(entry: CacheEntry, now: SystemTime) -> Self {
        if entry.is_fresh_at(DateTime::<Utc>::from(now)) {
            EntryState::Fresh(entry)
        } else if entry.size == 0 {
            EntryState::Placeholder(entry)
        } else {
            EntryState::Stale(entry)
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, EntryState::Fresh(_))
    }

    pub fn entry(&self) -> Option<&CacheEntry> {
        match self {
            EntryState::Absent => None,
            EntryState::Placeholder(entry) | EntryState::Fresh(entry) | EntryState::Stale(entry) => {
                Some(entry)
            }
        }
    }
}
