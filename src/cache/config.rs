// Cache configuration.
// Root directory, file suffix, permission modes and retention horizon for a store.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Default root directory, relative to the working directory.
pub const DEFAULT_ROOT: &str = "./data/cache/";

/// Default entry file suffix.
pub const DEFAULT_SUFFIX: &str = ".bin";

/// Default mode for the root directory and entry files.
pub const DEFAULT_MODE: u32 = 0o775;

/// Default retention horizon: one year.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Settings for a [`CacheStore`](super::CacheStore).
///
/// Missing fields take their defaults when deserialized, so a config file only
/// needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding one file per key.
    pub root: PathBuf,
    /// Appended to the hashed key to form the file name.
    pub suffix: String,
    /// Mode for the root directory when it is created (unix only).
    pub dir_mode: u32,
    /// Mode for entry files when they are created (unix only).
    pub file_mode: u32,
    /// Seconds an entry stays fresh after `set`.
    pub retention_secs: u64,
    /// Create an empty placeholder file whenever a key is resolved, even for reads.
    pub create_placeholders: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            suffix: DEFAULT_SUFFIX.to_string(),
            dir_mode: DEFAULT_MODE,
            file_mode: DEFAULT_MODE,
            retention_secs: DEFAULT_RETENTION.as_secs(),
            create_placeholders: false,
        }
    }
}

impl CacheConfig {
    /// Default settings rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Default settings rooted in the platform cache directory for `app`
    /// (~/.cache/<app> on Linux).
    pub fn for_app(app: &str) -> Option<Self> {
        ProjectDirs::from("", "", app).map(|dirs| Self::new(dirs.cache_dir()))
    }

    /// Load settings from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: CacheConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention_secs = retention.as_secs();
        self
    }

    pub fn with_modes(mut self, dir_mode: u32, file_mode: u32) -> Self {
        self.dir_mode = dir_mode;
        self.file_mode = file_mode;
        self
    }

    pub fn with_placeholders(mut self, create_placeholders: bool) -> Self {
        self.create_placeholders = create_placeholders;
        self
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// Reject settings that would produce unusable paths or entries that are
    /// never fresh.
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(CacheError::InvalidConfig("root must not be empty".into()));
        }
        if self.suffix.is_empty() {
            return Err(CacheError::InvalidConfig("suffix must not be empty".into()));
        }
        if self.suffix.contains(['/', '\\']) {
            return Err(CacheError::InvalidConfig(format!(
                "suffix must not contain a path separator: {:?}",
                self.suffix
            )));
        }
        if self.retention_secs == 0 {
            return Err(CacheError::InvalidConfig(
                "retention must be at least one second".into(),
            ));
        }
        if self.dir_mode > 0o7777 || self.file_mode > 0o7777 {
            return Err(CacheError::InvalidConfig(format!(
                "modes out of range: dir {:o}, file {:o}",
                self.dir_mode, self.file_mode
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.root, PathBuf::from("./data/cache/"));
        assert_eq!(config.suffix, ".bin");
        assert_eq!(config.dir_mode, 0o775);
        assert_eq!(config.retention(), Duration::from_secs(31_536_000));
        assert!(!config.create_placeholders);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_settings() {
        let err = CacheConfig::new("").validate().unwrap_err();
        assert!(matches!(err, CacheError::InvalidConfig(_)));

        let err = CacheConfig::new("/tmp/c").with_suffix("").validate().unwrap_err();
        assert!(matches!(err, CacheError::InvalidConfig(_)));

        let err = CacheConfig::new("/tmp/c").with_suffix("a/b").validate().unwrap_err();
        assert!(matches!(err, CacheError::InvalidConfig(_)));

        let err = CacheConfig::new("/tmp/c")
            .with_retention(Duration::from_millis(500))
            .validate()
            .unwrap_err();
        assert!(matches!(err, CacheError::InvalidConfig(_)));

        let err = CacheConfig::new("/tmp/c")
            .with_modes(0o10000, 0o644)
            .validate()
            .unwrap_err();
        assert!(matches!(err, CacheError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_json_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.json");
        fs::write(&path, r#"{ "root": "/var/cache/app", "retention_secs": 60 }"#).unwrap();

        let config = CacheConfig::from_json_file(&path).unwrap();
        assert_eq!(config.root, PathBuf::from("/var/cache/app"));
        assert_eq!(config.retention(), Duration::from_secs(60));
        assert_eq!(config.suffix, ".bin");
        assert_eq!(config.file_mode, 0o775);
    }

    #[test]
    fn test_from_json_file_errors() {
        let temp_dir = TempDir::new().unwrap();

        let missing = temp_dir.path().join("missing.json");
        assert!(matches!(
            CacheConfig::from_json_file(&missing),
            Err(CacheError::Io(_))
        ));

        let malformed = temp_dir.path().join("bad.json");
        fs::write(&malformed, "{ not json").unwrap();
        assert!(matches!(
            CacheConfig::from_json_file(&malformed),
            Err(CacheError::Json(_))
        ));

        let invalid = temp_dir.path().join("invalid.json");
        fs::write(&invalid, r#"{ "retention_secs": 0 }"#).unwrap();
        assert!(matches!(
            CacheConfig::from_json_file(&invalid),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_for_app_uses_cache_dir() {
        // Headless environments may have no home directory.
        if let Some(config) = CacheConfig::for_app("filecache-test") {
            assert!(config.root.ends_with("filecache-test"));
            assert_eq!(config.suffix, ".bin");
        }
    }
}
