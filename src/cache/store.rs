//! File-backed storage for cache entries
//!
//! One JSON file per key in a flat directory. Writes go to a temporary file in the
//! same directory which is then renamed over the final path, so a reader sees
//! either the previous complete entry or the new complete entry, never a torn one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::key::CacheKey;
use super::ttl::Ttl;
use crate::http::CachedResponse;

/// Version tag written into every entry file
pub const SCHEMA_VERSION: u32 = 1;

const ENTRY_EXTENSION: &str = ".json";
const TEMP_SUFFIX: &str = ".tmp";

/// Errors from reading or writing cache files
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed
    #[error("Cache I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Entry could not be encoded or decoded
    #[error("Invalid cache entry: {0}")]
    Serde(#[from] serde_json::Error),

    /// Entry was written by an incompatible schema
    #[error("Unsupported cache schema version {found} (expected {})", SCHEMA_VERSION)]
    SchemaVersion { found: u32 },

    /// File content belongs to a different key than its name says
    #[error("Cache file holds key {found}, expected {expected}")]
    KeyMismatch { found: CacheKey, expected: CacheKey },

    /// Entries produced under a disabled TTL are never stored
    #[error("Refusing to store an entry with a disabled TTL")]
    NotCacheable,
}

impl StoreError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
        move |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// A stored response and the metadata that governs its validity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Schema version of the file this entry was read from
    pub version: u32,
    /// Key this entry is stored under
    pub key: CacheKey,
    /// When the response was fetched
    pub created_at: DateTime<Utc>,
    /// TTL the response was fetched with
    pub ttl: Ttl,
    /// The captured response
    pub response: CachedResponse,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time
    pub fn new(key: CacheKey, ttl: Ttl, response: CachedResponse) -> Self {
        Self {
            version: SCHEMA_VERSION,
            key,
            created_at: Utc::now(),
            ttl,
            response,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.ttl.is_expired(self.created_at, now)
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

/// One file found in the cache directory by [`CacheStore::list`]
#[derive(Debug)]
pub struct ListedEntry {
    pub key: CacheKey,
    pub path: PathBuf,
    /// Size on disk, counted even when the content cannot be decoded
    pub size_bytes: u64,
    pub entry: Result<CacheEntry, StoreError>,
}

/// Reads and writes cache entries in a single directory
#[derive(Debug, Clone)]
pub struct CacheStore {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
}

impl CacheStore {
    /// Creates a store rooted at `cache_dir`; the directory is created on first write
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path to the cache file for the given key
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(format!("{}{}", key, ENTRY_EXTENSION))
    }

    fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.cache_dir).map_err(StoreError::io(&self.cache_dir))
    }

    /// Decodes the bytes of an entry file
    pub fn decode(bytes: &[u8]) -> Result<CacheEntry, StoreError> {
        let probe: VersionProbe = serde_json::from_slice(bytes)?;
        if probe.version != SCHEMA_VERSION {
            return Err(StoreError::SchemaVersion {
                found: probe.version,
            });
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    fn read_entry(&self, path: &Path, key: &CacheKey) -> Result<CacheEntry, StoreError> {
        let bytes = fs::read(path).map_err(StoreError::io(path))?;
        let entry = Self::decode(&bytes)?;
        if entry.key != *key {
            return Err(StoreError::KeyMismatch {
                found: entry.key,
                expected: key.clone(),
            });
        }
        Ok(entry)
    }

    /// Reads the entry for `key`
    ///
    /// Returns `None` when there is no entry, and also when the file cannot be read or
    /// decoded; the caller then fetches fresh data instead of failing.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let path = self.entry_path(key);
        match self.read_entry(&path, key) {
            Ok(entry) => Some(entry),
            Err(err) if err.is_not_found() => None,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable cache entry");
                None
            }
        }
    }

    /// Writes an entry, replacing any previous entry for the same key
    pub fn put(&self, entry: &CacheEntry) -> Result<(), StoreError> {
        if !entry.ttl.is_cacheable() {
            return Err(StoreError::NotCacheable);
        }
        self.ensure_dir()?;

        let json = serde_json::to_vec_pretty(entry)?;
        let path = self.entry_path(&entry.key);

        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", entry.key))
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.cache_dir)
            .map_err(StoreError::io(&self.cache_dir))?;
        temp.write_all(&json).map_err(StoreError::io(temp.path()))?;
        temp.as_file().sync_all().map_err(StoreError::io(temp.path()))?;
        temp.persist(&path).map_err(|err| StoreError::Io {
            path: path.clone(),
            source: err.error,
        })?;

        debug!(key = %entry.key, bytes = json.len(), ttl = %entry.ttl, "stored cache entry");
        Ok(())
    }

    /// Removes the entry for `key`; returns whether a file was deleted
    pub fn delete(&self, key: &CacheKey) -> Result<bool, StoreError> {
        self.remove_file(&self.entry_path(key))
    }

    /// Removes one file returned by [`CacheStore::owned_files`]
    ///
    /// A file that is already gone, because a concurrent writer renamed it into
    /// place or another clear got there first, returns `Ok(false)`.
    pub fn remove_file(&self, path: &Path) -> Result<bool, StoreError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Lists every entry file with its size and decoded content
    ///
    /// A missing cache directory lists as empty.
    pub fn list(&self) -> Result<Vec<ListedEntry>, StoreError> {
        let mut listed = Vec::new();
        for path in self.scan(|name| entry_key(name).is_some())? {
            let Some(key) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(entry_key)
            else {
                continue;
            };
            // Skip files removed between the scan and now
            let Ok(metadata) = fs::metadata(&path) else {
                continue;
            };
            let entry = self.read_entry(&path, &key);
            listed.push(ListedEntry {
                key,
                path,
                size_bytes: metadata.len(),
                entry,
            });
        }
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(listed)
    }

    /// Paths of every file this store owns: entries plus temporaries left by
    /// interrupted writes
    pub fn owned_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        self.scan(|name| entry_key(name).is_some() || is_temp_name(name))
    }

    fn scan(&self, wanted: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>, StoreError> {
        let dir = match fs::read_dir(&self.cache_dir) {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.cache_dir.clone(),
                    source,
                })
            }
        };

        let mut paths = Vec::new();
        for dir_entry in dir {
            let dir_entry = dir_entry.map_err(StoreError::io(&self.cache_dir))?;
            let is_file = dir_entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            let name = dir_entry.file_name();
            if is_file && name.to_str().is_some_and(&wanted) {
                paths.push(dir_entry.path());
            }
        }
        Ok(paths)
    }
}

fn entry_key(file_name: &str) -> Option<CacheKey> {
    file_name
        .strip_suffix(ENTRY_EXTENSION)
        .and_then(CacheKey::parse)
}

fn is_temp_name(file_name: &str) -> bool {
    file_name.starts_with('.') && file_name.ends_with(TEMP_SUFFIX)
}
