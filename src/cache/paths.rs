// Cache path utilities.
// Maps keys to fixed-length, filesystem-safe entry file names.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

/// Strategy for turning a cache key into a file name stem.
///
/// Implementations must be deterministic. Output is passed through
/// name sanitizing before use, so a hasher cannot escape the cache root.
pub trait KeyHasher: Send + Sync {
    fn hash(&self, key: &str) -> String;

    /// Whether `stem` could have come from [`hash`](Self::hash). Sweeps only
    /// touch files whose stem passes this check.
    fn is_hash(&self, stem: &str) -> bool;
}

/// SHA-256 of the key as 64 lowercase hex characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl KeyHasher for Sha256Hasher {
    fn hash(&self, key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    fn is_hash(&self, stem: &str) -> bool {
        stem.len() == 64 && stem.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

/// Entry file name for `key`: `<hash><suffix>`.
pub fn entry_name(hasher: &dyn KeyHasher, key: &str, suffix: &str) -> String {
    format!("{}{}", sanitize_name(&hasher.hash(key)), suffix)
}

/// Full entry path for `key` under `root`.
pub fn entry_path(root: &Path, hasher: &dyn KeyHasher, key: &str, suffix: &str) -> PathBuf {
    root.join(entry_name(hasher, key, suffix))
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Hidden sibling used while an entry is being written.
/// Unique per process and per call, so concurrent writers never share one.
pub fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{}.tmp.{}.{}", name, std::process::id(), n))
}

/// Whether a directory entry name is a cache entry: a stem produced by
/// `hasher` followed by `suffix`. Hidden files (in-flight temp files) never count.
pub fn is_entry_name(name: &str, hasher: &dyn KeyHasher, suffix: &str) -> bool {
    if name.starts_with('.') {
        return false;
    }
    match name.strip_suffix(suffix) {
        Some(stem) if !stem.is_empty() => hasher.is_hash(stem),
        _ => false,
    }
}

/// Sanitize a name for use in filesystem paths.
/// Replaces problematic characters with underscores.
fn sanitize_name(name: &str) -> String {
    let name: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            _ => c,
        })
        .collect();
    if name.is_empty() || name.starts_with('.') {
        format!("_{name}")
    } else {
        name
    }
}
