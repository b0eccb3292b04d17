//! reqcache - HTTP requests with a TTL-governed disk cache
//!
//! The library exposes [`CachedClient`] together with the cache and HTTP building
//! blocks it is made of, so the binary and the integration tests share one code path.

pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod http;

pub use cache::{
    clear_cache, get_cache_info, CacheEntry, CacheKey, CacheManager, CacheStats, CacheStore,
    ClearReport, IntoTtl, RequestDescriptor, StoreError, Ttl, TtlError, TTL_DISABLED,
    TTL_ONE_DAY, TTL_PERMANENT,
};
pub use client::{CachedClient, RequestError};
pub use config::{CacheConfig, DEFAULT_CACHE_DIR};
pub use http::{
    CachedResponse, Method, RequestBody, RequestOptions, ReqwestTransport, Transport,
    TransportError,
};
