// filecache: a filesystem key/value cache.
// Values live in one file per key; expiry is the file's modification time.

pub mod cache;
pub mod error;

pub use cache::{CacheConfig, CacheEntry, CacheStore, EntryState, KeyHasher, Sha256Hasher};
pub use error::{CacheError, Result};
