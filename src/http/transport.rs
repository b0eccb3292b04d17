use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use super::{CachedResponse, Method, RequestBody, RequestOptions};

/// Errors reported by a transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Failure from a non-reqwest transport
    #[error("Transport failed: {0}")]
    Other(String),
}

/// Performs the actual network transaction for the cache
///
/// Implementations own connection handling, TLS, redirects and timeouts. The cache
/// calls `send` only on a miss and stores whatever `Ok` value comes back, including
/// error statuses such as 404.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        method: Method,
        url: &str,
        options: &RequestOptions,
    ) -> Result<CachedResponse, TransportError>;
}

/// Default transport backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    /// Create a new transport with default settings
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Create a new transport with a custom HTTP client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        method: Method,
        url: &str,
        options: &RequestOptions,
    ) -> Result<CachedResponse, TransportError> {
        let mut builder = self.client.request(method.into(), url);

        if !options.params.is_empty() {
            builder = builder.query(&options.params);
        }
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some((username, password)) = &options.basic_auth {
            builder = builder.basic_auth(username, password.as_ref());
        }
        if let Some(token) = &options.bearer_token {
            builder = builder.bearer_auth(token);
        }
        builder = match &options.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Form(fields)) => builder.form(fields),
            Some(RequestBody::Text(text)) => builder.body(text.clone()),
            Some(RequestBody::Bytes(bytes)) => builder.body(bytes.clone()),
            None => builder,
        };
        if !options.extensions.is_empty() {
            debug!(
                count = options.extensions.len(),
                "reqwest transport has no use for request extensions"
            );
        }

        let response = builder.send().await?;
        Ok(capture(response).await?)
    }
}

/// Drains a reqwest response into a [`CachedResponse`]
async fn capture(response: reqwest::Response) -> Result<CachedResponse, reqwest::Error> {
    let status = response.status();
    let mut captured = CachedResponse::new(status.as_u16(), response.url().as_str());
    if let Some(reason) = status.canonical_reason() {
        captured = captured.with_reason(reason);
    }
    for (name, value) in response.headers() {
        captured = captured.with_header(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
    }

    let body = response.bytes().await?;
    Ok(captured.with_body(body.to_vec()))
}
