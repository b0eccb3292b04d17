//! Disk-backed response cache
//!
//! This module derives cache keys from requests, decides entry validity from a TTL,
//! and persists captured responses as one JSON file per key. Storage failures never
//! fail a request: unreadable entries count as misses and failed writes are logged.

mod key;
mod manager;
mod store;
mod ttl;

pub use key::{CacheKey, RequestDescriptor};
pub use manager::{clear_cache, get_cache_info, CacheManager, CacheStats, ClearReport};
pub use store::{CacheEntry, CacheStore, ListedEntry, StoreError, SCHEMA_VERSION};
pub use ttl::{IntoTtl, Ttl, TtlError, TTL_DISABLED, TTL_ONE_DAY, TTL_PERMANENT};
