// Error types for the file cache.
// Separates cache misses from filesystem failures so callers can tell them apart.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    /// No fresh value exists for the key: the entry is absent, a placeholder, or expired.
    #[error("Cache miss: {key}")]
    Miss { key: String },

    #[error("Cannot create cache directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Content was written but the expiry marker could not be set.
    #[error("Failed to set expiry on {}: {source}", .path.display())]
    Expiry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The requested TTL pushes the expiry past what the clock can represent.
    #[error("TTL out of range: {0:?}")]
    TtlOutOfRange(std::time::Duration),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    pub(crate) fn miss(key: &str) -> Self {
        CacheError::Miss {
            key: key.to_string(),
        }
    }

    /// True when the error means "no valid value", not a malfunction.
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::Miss { .. })
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
