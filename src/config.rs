//! Cache configuration
//!
//! There are no process-wide defaults: a [`CacheConfig`] value is handed to
//! [`CachedClient`](crate::CachedClient) and from there to the store.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::cache::Ttl;

/// Default cache directory, relative to the working directory
pub const DEFAULT_CACHE_DIR: &str = ".cache";

/// Where responses are cached and for how long by default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Directory where cache files are stored
    pub cache_dir: PathBuf,
    /// TTL used when the caller asks for the default
    pub default_ttl: Ttl,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            default_ttl: Ttl::ONE_DAY,
        }
    }
}

impl CacheConfig {
    /// Configuration rooted at a custom cache directory
    pub fn with_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    /// Configuration using the per-user cache directory
    ///
    /// Uses `~/.cache/reqcache/` on Linux, or the equivalent platform path.
    /// Returns `None` if the directory cannot be determined (e.g., no home directory).
    pub fn for_user() -> Option<Self> {
        Self::user_cache_dir().map(Self::with_dir)
    }

    pub fn user_cache_dir() -> Option<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "reqcache")?;
        Some(project_dirs.cache_dir().to_path_buf())
    }

    pub fn default_ttl(mut self, ttl: Ttl) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}
