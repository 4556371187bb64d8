// Filesystem cache.
// One file per key; the file's modification time is the entry's expiry.

pub mod config;
pub mod entry;
pub mod paths;
pub mod store;

pub use config::{CacheConfig, DEFAULT_RETENTION};
pub use entry::{CacheEntry, EntryState};
pub use paths::{KeyHasher, Sha256Hasher};
pub use store::CacheStore;
