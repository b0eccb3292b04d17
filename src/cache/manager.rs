//! Cache manager for whole-directory operations
//!
//! Provides a `CacheManager` that reports statistics across every entry in a cache
//! directory and clears it, on top of [`CacheStore`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::store::{CacheStore, StoreError};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Aggregate view of a cache directory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Whether the cache directory exists
    pub exists: bool,
    /// Absolute path of the cache directory
    pub cache_dir: PathBuf,
    /// Number of entry files, including unreadable ones
    pub total_files: usize,
    /// Entries that would be served as hits right now
    pub valid_entries: usize,
    /// Entries whose TTL has run out
    pub expired_entries: usize,
    /// Combined size of all entry files
    pub total_size_bytes: u64,
}

impl CacheStats {
    /// Total size in MiB, rounded to two decimals
    pub fn total_size_mb(&self) -> f64 {
        (self.total_size_bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
    }
}

/// Outcome of [`CacheManager::clear`]
#[derive(Debug, Default)]
pub struct ClearReport {
    /// Number of files removed
    pub deleted: usize,
    /// Files that could not be removed; the rest were still attempted
    pub failures: Vec<StoreError>,
}

impl ClearReport {
    /// True when every file was removed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Manages statistics and cleanup for one cache directory
#[derive(Debug, Clone)]
pub struct CacheManager {
    store: CacheStore,
}

impl CacheManager {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }

    /// Creates a CacheManager for a custom cache directory
    pub fn with_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self::new(CacheStore::new(cache_dir))
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Statistics as of now
    pub fn stats(&self) -> Result<CacheStats, StoreError> {
        self.stats_at(Utc::now())
    }

    /// Statistics with validity judged at `now`
    ///
    /// Files whose content cannot be decoded still count toward `total_files` and
    /// `total_size_bytes`, but are neither valid nor expired.
    pub fn stats_at(&self, now: DateTime<Utc>) -> Result<CacheStats, StoreError> {
        let dir = self.store.cache_dir();
        let mut stats = CacheStats {
            exists: dir.is_dir(),
            cache_dir: std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf()),
            total_files: 0,
            valid_entries: 0,
            expired_entries: 0,
            total_size_bytes: 0,
        };

        for listed in self.store.list()? {
            stats.total_files += 1;
            stats.total_size_bytes += listed.size_bytes;
            match &listed.entry {
                Ok(entry) if entry.is_expired(now) => stats.expired_entries += 1,
                Ok(_) => stats.valid_entries += 1,
                Err(err) => debug!(path = %listed.path.display(), error = %err, "unreadable cache file"),
            }
        }

        Ok(stats)
    }

    /// Deletes every file the store owns, continuing past individual failures
    pub fn clear(&self) -> ClearReport {
        let mut report = ClearReport::default();

        let paths = match self.store.owned_files() {
            Ok(paths) => paths,
            Err(err) => {
                warn!(error = %err, "failed to scan cache directory");
                report.failures.push(err);
                return report;
            }
        };

        self.remove_all(paths, &mut report);
        debug!(
            deleted = report.deleted,
            failed = report.failures.len(),
            "cleared cache directory"
        );
        report
    }

    /// Deletes each path, recording failures and moving on to the next one
    fn remove_all(&self, paths: Vec<PathBuf>, report: &mut ClearReport) {
        for path in paths {
            match self.store.remove_file(&path) {
                Ok(true) => report.deleted += 1,
                Ok(false) => debug!(path = %path.display(), "cache file already gone"),
                Err(err) => {
                    warn!(error = %err, "failed to delete cache file");
                    report.failures.push(err);
                }
            }
        }
    }
}

/// Deletes all cached responses in `cache_dir` and returns how many files were removed
///
/// Failures are logged; use [`CacheManager::clear`] to inspect them.
pub fn clear_cache(cache_dir: impl AsRef<Path>) -> usize {
    CacheManager::with_dir(cache_dir.as_ref()).clear().deleted
}

/// Statistics for the cache in `cache_dir`
pub fn get_cache_info(cache_dir: impl AsRef<Path>) -> Result<CacheStats, StoreError> {
    CacheManager::with_dir(cache_dir.as_ref()).stats()
}
