//! Integration tests for the cached client
//!
//! A counting transport stands in for the network so the tests can assert exactly
//! how many requests reached it.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;

use reqcache::{
    CacheConfig, CacheEntry, CacheKey, CacheStore, CachedClient, CachedResponse, Method,
    RequestDescriptor, RequestError, RequestOptions, Transport, TransportError, Ttl, TtlError,
    TTL_DISABLED, TTL_PERMANENT,
};

/// Transport that answers every request with "response N", N counting from 1
#[derive(Debug, Default)]
struct CountingTransport {
    calls: AtomicUsize,
    /// Every request as it would appear on the wire: URL plus encoded query
    sent: Mutex<Vec<String>>,
    status: Option<u16>,
    delay: Option<Duration>,
    fail: bool,
}

impl CountingTransport {
    fn with_status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for CountingTransport {
    async fn send(
        &self,
        _method: Method,
        url: &str,
        options: &RequestOptions,
    ) -> Result<CachedResponse, TransportError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let mut wire = url::Url::parse(url).map_err(|err| TransportError::Other(err.to_string()))?;
        if !options.params.is_empty() {
            wire.query_pairs_mut().extend_pairs(&options.params);
        }
        self.sent.lock().unwrap().push(wire.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(TransportError::Other("connection refused".to_string()));
        }
        Ok(CachedResponse::new(self.status.unwrap_or(200), url)
            .with_header("Content-Type", "text/plain")
            .with_body(format!("response {}", n)))
    }
}

fn client_in(dir: &Path, transport: CountingTransport) -> CachedClient<CountingTransport> {
    CachedClient::with_transport(CacheConfig::with_dir(dir), transport)
}

fn cache_files(dir: &Path) -> usize {
    match fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

#[tokio::test]
async fn test_disabled_ttl_always_hits_network_and_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let cache_dir = temp.path().join("cache");
    let client = client_in(&cache_dir, CountingTransport::default());

    let first = client.get("https://api.example.com/uuid", TTL_DISABLED, RequestOptions::new()).await.unwrap();
    let second = client.get("https://api.example.com/uuid", TTL_DISABLED, RequestOptions::new()).await.unwrap();

    assert_eq!(client.transport().calls(), 2);
    assert_eq!(first.text(), "response 1");
    assert_eq!(second.text(), "response 2");
    assert!(!second.from_cache());
    assert!(!cache_dir.exists(), "disabled TTL must not create the cache directory");
}

#[tokio::test]
async fn test_default_ttl_serves_second_request_from_cache() {
    let temp = TempDir::new().unwrap();
    let client = client_in(temp.path(), CountingTransport::default());
    let ttl = client.default_ttl();

    let first = client.get("https://api.example.com/uuid", ttl, RequestOptions::new()).await.unwrap();
    let second = client.get("https://api.example.com/uuid", ttl, RequestOptions::new()).await.unwrap();

    assert_eq!(client.transport().calls(), 1);
    assert!(!first.from_cache());
    assert!(second.from_cache());
    assert_eq!(second.text(), "response 1");
    assert_eq!(second.status(), 200);
    assert_eq!(second.header("content-type"), Some("text/plain"));
    assert_eq!(cache_files(temp.path()), 1);
}

#[tokio::test]
async fn test_param_order_does_not_change_the_key() {
    let temp = TempDir::new().unwrap();
    let client = client_in(temp.path(), CountingTransport::default());

    client
        .get("https://api.example.com/search", 3600_i64, RequestOptions::new().param("a", "1").param("b", "2"))
        .await
        .unwrap();
    let reordered = client
        .get("https://api.example.com/search", 3600_i64, RequestOptions::new().param("b", "2").param("a", "1"))
        .await
        .unwrap();
    let in_url = client
        .get("https://api.example.com/search?b=2&a=1", 3600_i64, RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(client.transport().calls(), 1);
    assert!(reordered.from_cache());
    assert!(in_url.from_cache());
}

#[tokio::test]
async fn test_methods_are_cached_separately() {
    let temp = TempDir::new().unwrap();
    let client = client_in(temp.path(), CountingTransport::default());
    let url = "https://api.example.com/items";

    let get = client.get(url, 3600_i64, RequestOptions::new()).await.unwrap();
    let post = client.post(url, 3600_i64, RequestOptions::new()).await.unwrap();

    assert_eq!(client.transport().calls(), 2);
    assert_eq!(get.text(), "response 1");
    assert_eq!(post.text(), "response 2");
    assert_eq!(cache_files(temp.path()), 2);
}

#[tokio::test]
async fn test_json_bodies_with_reordered_keys_share_an_entry() {
    let temp = TempDir::new().unwrap();
    let client = client_in(temp.path(), CountingTransport::default());
    let url = "https://api.example.com/users";

    client
        .post(url, TTL_PERMANENT, RequestOptions::new().json(serde_json::json!({"name": "Alice", "age": 30})))
        .await
        .unwrap();
    let again = client
        .post(url, TTL_PERMANENT, RequestOptions::new().json(serde_json::json!({"age": 30, "name": "Alice"})))
        .await
        .unwrap();
    let other = client
        .post(url, TTL_PERMANENT, RequestOptions::new().json(serde_json::json!({"name": "Bob"})))
        .await
        .unwrap();

    assert!(again.from_cache());
    assert!(!other.from_cache());
    assert_eq!(client.transport().calls(), 2);
}

#[tokio::test]
async fn test_expired_entry_is_refetched_and_overwritten() {
    let temp = TempDir::new().unwrap();
    let client = client_in(temp.path(), CountingTransport::default());
    let url = "https://api.example.com/uuid";

    let key = CacheKey::compute(&RequestDescriptor::from_request(Method::Get, url, &RequestOptions::new()));
    let stale_at = Utc::now() - chrono::Duration::hours(2);
    let stale = CacheEntry::new(
        key.clone(),
        Ttl::try_from(60_i64).unwrap(),
        CachedResponse::new(200, url).with_body("stale"),
    )
    .with_created_at(stale_at);
    client.store().put(&stale).unwrap();

    let response = client.get(url, 60_i64, RequestOptions::new()).await.unwrap();

    assert_eq!(client.transport().calls(), 1);
    assert_eq!(response.text(), "response 1");
    assert!(!response.from_cache());

    let refreshed = client.store().get(&key).expect("entry rewritten");
    assert!(refreshed.created_at > stale_at);
    assert_eq!(refreshed.response.text(), "response 1");
    assert_eq!(cache_files(temp.path()), 1);
}

#[tokio::test]
async fn test_permanent_entry_never_expires() {
    let temp = TempDir::new().unwrap();
    let client = client_in(temp.path(), CountingTransport::default());
    let url = "https://api.example.com/config";

    let key = CacheKey::compute(&RequestDescriptor::new(Method::Get, url));
    let ancient = CacheEntry::new(key, Ttl::Permanent, CachedResponse::new(200, url).with_body("forever"))
        .with_created_at(Utc::now() - chrono::Duration::days(3650));
    client.store().put(&ancient).unwrap();

    let response = client.get(url, TTL_PERMANENT, RequestOptions::new()).await.unwrap();

    assert_eq!(client.transport().calls(), 0);
    assert!(response.from_cache());
    assert_eq!(response.text(), "forever");
}

#[tokio::test]
async fn test_invalid_ttl_is_rejected_before_any_io() {
    let temp = TempDir::new().unwrap();
    let cache_dir = temp.path().join("cache");
    let client = client_in(&cache_dir, CountingTransport::default());
    let url = "https://api.example.com/uuid";

    let negative = client.get(url, -2_i64, RequestOptions::new()).await;
    let fractional = client.get(url, 1.5_f64, RequestOptions::new()).await;

    assert!(matches!(negative, Err(RequestError::InvalidTtl(_))));
    assert!(matches!(fractional, Err(RequestError::InvalidTtl(_))));
    assert_eq!(client.transport().calls(), 0);
    assert!(!cache_dir.exists());
}

#[tokio::test]
async fn test_integral_float_ttl_is_rejected() {
    let temp = TempDir::new().unwrap();
    let cache_dir = temp.path().join("cache");
    let client = client_in(&cache_dir, CountingTransport::default());

    let result = client.get("https://api.example.com/a", 60.0_f64, RequestOptions::new()).await;

    match result {
        Err(RequestError::InvalidTtl(TtlError::NotAnInteger(raw))) => assert_eq!(raw, "60"),
        other => panic!("expected a non-integer TTL error, got {:?}", other),
    }
    assert_eq!(client.transport().calls(), 0);
    assert!(!cache_dir.exists());
}

#[tokio::test]
async fn test_url_query_and_explicit_params_are_sent_as_keyed() {
    let temp = TempDir::new().unwrap();
    let client = client_in(temp.path(), CountingTransport::default());

    client
        .get("https://api.example.com/y?a=1&b=2", 3600_i64, RequestOptions::new().param("a", "9"))
        .await
        .unwrap();
    let second = client
        .get("https://api.example.com/y?a=2&b=2#top", 3600_i64, RequestOptions::new().param("a", "9"))
        .await
        .unwrap();

    // Both requests go out as the same merged query, so sharing an entry is correct
    assert!(second.from_cache());
    assert_eq!(
        client.transport().sent(),
        vec!["https://api.example.com/y?a=9&b=2".to_string()]
    );
}

#[tokio::test]
async fn test_disabled_ttl_sends_merged_params_too() {
    let temp = TempDir::new().unwrap();
    let client = client_in(temp.path(), CountingTransport::default());

    client
        .get("https://api.example.com/y?b=2&a=1", TTL_DISABLED, RequestOptions::new().param("a", "9"))
        .await
        .unwrap();

    assert_eq!(
        client.transport().sent(),
        vec!["https://api.example.com/y?a=9&b=2".to_string()]
    );
}

#[tokio::test]
async fn test_transport_error_propagates_and_is_not_cached() {
    let temp = TempDir::new().unwrap();
    let cache_dir = temp.path().join("cache");
    let client = client_in(&cache_dir, CountingTransport::failing());

    let result = client.get("https://api.example.com/down", 3600_i64, RequestOptions::new()).await;

    match result {
        Err(RequestError::Transport(TransportError::Other(msg))) => {
            assert_eq!(msg, "connection refused")
        }
        other => panic!("expected transport error, got {:?}", other),
    }
    assert!(!cache_dir.exists(), "failed requests must not create cache files");
}

#[tokio::test]
async fn test_error_status_responses_are_cached() {
    let temp = TempDir::new().unwrap();
    let client = client_in(temp.path(), CountingTransport::with_status(404));

    let first = client.get("https://api.example.com/missing", 3600_i64, RequestOptions::new()).await.unwrap();
    let second = client.get("https://api.example.com/missing", 3600_i64, RequestOptions::new()).await.unwrap();

    assert_eq!(first.status(), 404);
    assert!(!first.is_success());
    assert!(second.from_cache());
    assert_eq!(second.status(), 404);
    assert_eq!(client.transport().calls(), 1);
}

#[tokio::test]
async fn test_corrupt_entry_is_treated_as_miss() {
    let temp = TempDir::new().unwrap();
    let client = client_in(temp.path(), CountingTransport::default());
    let url = "https://api.example.com/uuid";

    let key = CacheKey::compute(&RequestDescriptor::new(Method::Get, url));
    fs::write(client.store().entry_path(&key), b"{ not json").unwrap();

    let response = client.get(url, 3600_i64, RequestOptions::new()).await.unwrap();

    assert_eq!(client.transport().calls(), 1);
    assert!(!response.from_cache());
    let repaired = client.store().get(&key).expect("corrupt entry overwritten");
    assert_eq!(repaired.response.text(), "response 1");
}

#[tokio::test]
async fn test_cache_write_failure_still_returns_response() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("not-a-dir");
    fs::write(&blocker, b"occupied").unwrap();
    let client = client_in(&blocker, CountingTransport::default());

    let first = client.get("https://api.example.com/uuid", 3600_i64, RequestOptions::new()).await.unwrap();
    let second = client.get("https://api.example.com/uuid", 3600_i64, RequestOptions::new()).await.unwrap();

    assert_eq!(first.text(), "response 1");
    assert_eq!(second.text(), "response 2");
    assert_eq!(client.transport().calls(), 2);
}

#[tokio::test]
async fn test_clear_and_info_through_client() {
    let temp = TempDir::new().unwrap();
    let client = client_in(temp.path(), CountingTransport::default());

    for i in 0..3 {
        let url = format!("https://api.example.com/items/{}", i);
        client.get(&url, 3600_i64, RequestOptions::new()).await.unwrap();
    }

    let info = client.cache_info().unwrap();
    assert_eq!(info.total_files, 3);
    assert_eq!(info.valid_entries, 3);
    assert_eq!(info.expired_entries, 0);
    assert!(info.total_size_bytes > 0);

    let report = client.clear_cache();
    assert_eq!(report.deleted, 3);
    assert!(report.is_complete());

    let info = client.cache_info().unwrap();
    assert_eq!(info.total_files, 0);
    assert_eq!(info.total_size_bytes, 0);

    let refetched = client.get("https://api.example.com/items/0", 3600_i64, RequestOptions::new()).await.unwrap();
    assert!(!refetched.from_cache());
    assert_eq!(client.transport().calls(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_requests_leave_one_readable_entry() {
    let temp = TempDir::new().unwrap();
    let client = Arc::new(client_in(
        temp.path(),
        CountingTransport::slow(Duration::from_millis(50)),
    ));
    let url = "https://api.example.com/uuid";

    let mut handles = Vec::new();
    for _ in 0..2 {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            client.get(url, 3600_i64, RequestOptions::new()).await
        }));
    }
    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert!(response.text().starts_with("response "));
    }

    let calls = client.transport().calls();
    assert!((1..=2).contains(&calls), "unexpected call count {}", calls);

    let store = CacheStore::new(temp.path());
    let key = CacheKey::compute(&RequestDescriptor::new(Method::Get, url));
    let entry = store.get(&key).expect("one complete entry on disk");
    assert!(entry.response.text().starts_with("response "));
    assert_eq!(cache_files(temp.path()), 1, "no temporary files left behind");

    let after = client.get(url, 3600_i64, RequestOptions::new()).await.unwrap();
    assert!(after.from_cache());
    assert_eq!(client.transport().calls(), calls);
}
