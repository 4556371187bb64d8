// Cache store for reading and writing entries.
// Handles key resolution, expiry checks and filesystem operations.

use std::fmt;
use std::fs::{self, File, FileTimes, Metadata, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::config::CacheConfig;
use super::entry::{CacheEntry, EntryState};
use super::paths::{self, KeyHasher, Sha256Hasher};
use crate::error::{CacheError, Result};

/// Filesystem key/value store.
///
/// Each key owns one file under the configured root. The file's modification
/// time is the entry's expiry: `set` pushes it `retention` into the future and
/// `get` only serves files whose modification time is still ahead of the clock.
///
/// There is no locking. Writes land through a rename, so a concurrent reader
/// sees either the previous or the new payload in full.
pub struct CacheStore {
    config: CacheConfig,
    hasher: Arc<dyn KeyHasher>,
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    /// Create a store from validated settings. Touches nothing on disk.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            hasher: Arc::new(Sha256Hasher),
        })
    }

    /// Store rooted at `./data/cache/` with default settings.
    pub fn open_default() -> Result<Self> {
        Self::new(CacheConfig::default())
    }

    /// Replace the key hasher.
    pub fn with_hasher(mut self, hasher: impl KeyHasher + 'static) -> Self {
        self.hasher = Arc::new(hasher);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Entry path for `key`. Pure: no filesystem access.
    pub fn path_for(&self, key: &str) -> PathBuf {
        paths::entry_path(
            &self.config.root,
            self.hasher.as_ref(),
            key,
            &self.config.suffix,
        )
    }

    /// Entry path for `key`, creating the root directory if it is missing.
    pub fn resolve(&self, key: &str) -> Result<PathBuf> {
        self.ensure_root()?;
        Ok(self.path_for(key))
    }

    /// Create an empty entry file at `path` unless one exists.
    /// Returns whether a file was created.
    pub fn ensure(&self, path: &Path) -> Result<bool> {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(self.config.file_mode);

        match options.open(path) {
            Ok(_) => {
                debug!(path = %path.display(), "Created placeholder entry");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the value for `key` if it is still fresh.
    ///
    /// Absent, placeholder and expired entries all yield [`CacheError::Miss`];
    /// bytes of an expired entry are never returned.
    pub fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve_entry(key)?;

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(key = %key, "Cache miss: absent");
                return Err(CacheError::miss(key));
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.modified()? <= SystemTime::now() {
            debug!(key = %key, path = %path.display(), "Cache miss: expired");
            return Err(CacheError::miss(key));
        }

        let bytes = fs::read(&path)?;
        debug!(key = %key, size = bytes.len(), "Cache hit");
        Ok(bytes)
    }

    /// Like [`get`](Self::get), with misses folded into `None`.
    pub fn get_if_fresh(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.get(key) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.is_miss() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Store `value` under `key`, fresh for the configured retention.
    pub fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.set_with_ttl(key, value, self.config.retention())
    }

    /// Store `value` under `key`, fresh for `ttl`.
    ///
    /// Fails unless both the content and the expiry marker were written. On
    /// failure any previous entry for the key is left as it was.
    pub fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let path = self.resolve_entry(key)?;

        let now = SystemTime::now();
        let expires_at = now
            .checked_add(ttl)
            .ok_or(CacheError::TtlOutOfRange(ttl))?;

        let temp_path = paths::temp_path(&path);
        let written = self
            .write_temp(&temp_path, &path, value, now, expires_at)
            .and_then(|()| fs::rename(&temp_path, &path).map_err(CacheError::from));

        if let Err(err) = written {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(path = %temp_path.display(), error = %cleanup, "Failed to remove temp file");
                }
            }
            return Err(err);
        }

        debug!(
            key = %key,
            size = value.len(),
            expires_at = %DateTime::<Utc>::from(expires_at),
            "Stored cache entry"
        );
        Ok(())
    }

    /// Remove the entry for `key`. Removing an absent entry succeeds.
    pub fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve_entry(key)?;

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(key = %key, path = %path.display(), "Deleted cache entry");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether `key` has a fresh entry. Never reads the payload.
    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.inspect(key)?.is_fresh())
    }

    /// Report the state of `key` without creating anything.
    pub fn inspect(&self, key: &str) -> Result<EntryState> {
        let path = self.path_for(key);

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(EntryState::Absent),
            Err(e) => return Err(e.into()),
        };

        let entry = CacheEntry::from_metadata(path, &metadata)?;
        Ok(EntryState::classify(entry, SystemTime::now()))
    }

    /// Mark the entry for `key` as expired now, keeping its bytes on disk.
    pub fn expire(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);

        // Setting explicit times only needs ownership on unix, not write access.
        let mut options = OpenOptions::new();
        #[cfg(unix)]
        options.read(true);
        #[cfg(not(unix))]
        options.write(true);

        let file = match options.open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(CacheError::miss(key)),
            Err(e) => return Err(e.into()),
        };

        file.set_modified(SystemTime::now())
            .map_err(|source| CacheError::Expiry {
                path: path.clone(),
                source,
            })?;

        debug!(key = %key, path = %path.display(), "Expired cache entry");
        Ok(())
    }

    /// Delete every entry that is not fresh. Returns how many were removed.
    ///
    /// Expired entries are otherwise kept on disk indefinitely; this is the
    /// only sweep and it runs only when called.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        for (path, metadata) in self.entry_files()? {
            if metadata.modified()? > now {
                continue;
            }
            if remove_if_present(&path)? {
                removed += 1;
            }
        }

        info!(root = %self.config.root.display(), removed, "Purged expired cache entries");
        Ok(removed)
    }

    /// Delete every entry regardless of freshness. Returns how many were
    /// removed. Files in the root that are not entries are left alone.
    pub fn clear(&self) -> Result<usize> {
        warn!(root = %self.config.root.display(), "Clearing filesystem cache");

        let mut removed = 0;
        for (path, _) in self.entry_files()? {
            if remove_if_present(&path)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn ensure_root(&self) -> Result<()> {
        let root = &self.config.root;
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(self.config.dir_mode);

        builder.create(root).map_err(|source| CacheError::Directory {
            path: root.clone(),
            source,
        })
    }

    /// Resolve `key`, also creating a placeholder when configured to.
    fn resolve_entry(&self, key: &str) -> Result<PathBuf> {
        let path = self.resolve(key)?;
        if self.config.create_placeholders {
            self.ensure(&path)?;
        }
        Ok(path)
    }

    fn write_temp(
        &self,
        temp_path: &Path,
        path: &Path,
        value: &[u8],
        now: SystemTime,
        expires_at: SystemTime,
    ) -> Result<()> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(self.config.file_mode);

        let mut file = options.open(temp_path)?;
        file.write_all(value)?;
        file.sync_all()?;

        let times = FileTimes::new()
            .set_accessed(now)
            .set_modified(expires_at);
        apply_times(&file, times).map_err(|source| CacheError::Expiry {
            path: path.to_path_buf(),
            source,
        })
    }

    fn entry_files(&self) -> Result<Vec<(PathBuf, Metadata)>> {
        let dir = match fs::read_dir(&self.config.root) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for item in dir {
            let item = item?;
            let name = item.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !paths::is_entry_name(name, self.hasher.as_ref(), &self.config.suffix) {
                continue;
            }
            let metadata = item.metadata()?;
            if metadata.is_file() {
                files.push((item.path(), metadata));
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
thread_local! {
    static FAIL_APPLY_TIMES: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

fn apply_times(file: &File, times: FileTimes) -> io::Result<()> {
    #[cfg(test)]
    {
        if FAIL_APPLY_TIMES.with(|fail| fail.get()) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
    }
    file.set_times(times)
}

fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
