//! Cached HTTP client
//!
//! [`CachedClient`] sits in front of a [`Transport`]. For each request it validates
//! the TTL, derives the cache key, and either serves a stored response or calls the
//! transport and stores what comes back. A TTL of [`Ttl::Disabled`] skips the cache
//! completely.

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{
    CacheEntry, CacheKey, CacheManager, CacheStats, CacheStore, ClearReport, IntoTtl,
    RequestDescriptor, StoreError, Ttl, TtlError,
};
use crate::config::CacheConfig;
use crate::http::{
    CachedResponse, Method, OptionsError, RequestOptions, ReqwestTransport, Transport,
    TransportError,
};

/// Errors surfaced to callers of [`CachedClient`]
///
/// Cache read and write failures are not part of this type: they are logged and the
/// request falls back to, or still returns, the network response.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The TTL argument was rejected; nothing was attempted
    #[error("Invalid cache TTL: {0}")]
    InvalidTtl(#[from] TtlError),

    /// The request options were rejected; nothing was attempted
    #[error("Invalid request options: {0}")]
    InvalidOptions(#[from] OptionsError),

    /// The transport failed; passed through unchanged
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// HTTP client with a TTL-governed disk cache
///
/// Safe to share across tasks and threads. Concurrent misses on the same key are
/// not coalesced: each one calls the transport and writes the entry, and the last
/// completed write wins.
#[derive(Debug, Clone)]
pub struct CachedClient<T = ReqwestTransport> {
    config: CacheConfig,
    store: CacheStore,
    transport: T,
}

impl CachedClient<ReqwestTransport> {
    /// Creates a client using `reqwest` as the transport
    pub fn new(config: CacheConfig) -> Self {
        Self::with_transport(config, ReqwestTransport::new())
    }
}

impl Default for CachedClient<ReqwestTransport> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<T: Transport> CachedClient<T> {
    /// Creates a client with a custom transport
    pub fn with_transport(config: CacheConfig, transport: T) -> Self {
        let store = CacheStore::new(config.cache_dir.clone());
        Self {
            config,
            store,
            transport,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn default_ttl(&self) -> Ttl {
        self.config.default_ttl
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Makes a request, serving it from the cache when a valid entry exists
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `url` - Request URL; its query string is merged with `options.params`, an
    ///   explicit parameter replacing the URL's parameter of the same name
    /// * `ttl` - `0` disables caching, `-1` caches forever, `n > 0` caches for n seconds
    /// * `options` - Parameters, headers, body and transport settings
    ///
    /// # Returns
    /// * `Ok(CachedResponse)` from the cache or the network
    /// * `Err(RequestError)` if the TTL or options are invalid, or the transport fails
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        ttl: impl IntoTtl,
        options: RequestOptions,
    ) -> Result<CachedResponse, RequestError> {
        let ttl = ttl.into_ttl()?;
        options.validate()?;

        // The request goes out exactly as it is keyed: base URL plus merged params
        let descriptor = RequestDescriptor::from_request(method, url, &options);
        let options = RequestOptions {
            params: descriptor.query_pairs(),
            ..options
        };
        let url = descriptor.url();

        if !ttl.is_cacheable() {
            debug!(%method, url, "cache disabled, passing request through");
            return Ok(self.transport.send(method, url, &options).await?);
        }

        let key = CacheKey::compute(&descriptor);
        match self.store.get(&key) {
            Some(entry) if !entry.is_expired(Utc::now()) => {
                debug!(%key, %method, url, "cache hit");
                return Ok(entry.response.mark_cached());
            }
            Some(_) => debug!(%key, %method, url, "cache entry expired"),
            None => debug!(%key, %method, url, "cache miss"),
        }

        let response = self.transport.send(method, url, &options).await?;

        let entry = CacheEntry::new(key, ttl, response);
        if let Err(err) = self.store.put(&entry) {
            warn!(key = %entry.key, error = %err, "failed to write cache entry");
        }
        Ok(entry.response)
    }

    /// Make a GET request with TTL-based caching control
    pub async fn get(
        &self,
        url: &str,
        ttl: impl IntoTtl,
        options: RequestOptions,
    ) -> Result<CachedResponse, RequestError> {
        self.request(Method::Get, url, ttl, options).await
    }

    /// Make a POST request with TTL-based caching control
    pub async fn post(
        &self,
        url: &str,
        ttl: impl IntoTtl,
        options: RequestOptions,
    ) -> Result<CachedResponse, RequestError> {
        self.request(Method::Post, url, ttl, options).await
    }

    /// Make a PUT request with TTL-based caching control
    pub async fn put(
        &self,
        url: &str,
        ttl: impl IntoTtl,
        options: RequestOptions,
    ) -> Result<CachedResponse, RequestError> {
        self.request(Method::Put, url, ttl, options).await
    }

    /// Make a DELETE request with TTL-based caching control
    pub async fn delete(
        &self,
        url: &str,
        ttl: impl IntoTtl,
        options: RequestOptions,
    ) -> Result<CachedResponse, RequestError> {
        self.request(Method::Delete, url, ttl, options).await
    }

    /// Make a PATCH request with TTL-based caching control
    pub async fn patch(
        &self,
        url: &str,
        ttl: impl IntoTtl,
        options: RequestOptions,
    ) -> Result<CachedResponse, RequestError> {
        self.request(Method::Patch, url, ttl, options).await
    }

    /// Make a HEAD request with TTL-based caching control
    pub async fn head(
        &self,
        url: &str,
        ttl: impl IntoTtl,
        options: RequestOptions,
    ) -> Result<CachedResponse, RequestError> {
        self.request(Method::Head, url, ttl, options).await
    }

    /// Make an OPTIONS request with TTL-based caching control
    pub async fn options(
        &self,
        url: &str,
        ttl: impl IntoTtl,
        options: RequestOptions,
    ) -> Result<CachedResponse, RequestError> {
        self.request(Method::Options, url, ttl, options).await
    }

    /// Deletes every cached response in the configured directory
    pub fn clear_cache(&self) -> ClearReport {
        CacheManager::new(self.store.clone()).clear()
    }

    /// Statistics for the configured cache directory
    pub fn cache_info(&self) -> Result<CacheStats, StoreError> {
        CacheManager::new(self.store.clone()).stats()
    }
}
