use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

/// Upper bound on provider-specific entries in [`RequestOptions::extensions`]
pub const MAX_EXTENSIONS: usize = 32;

/// Errors raised when request options are rejected before any I/O happens
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    /// More extension entries than [`MAX_EXTENSIONS`]
    #[error("Too many request extensions: {0} (at most {} allowed)", MAX_EXTENSIONS)]
    TooManyExtensions(usize),
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Raw bytes sent as-is
    Bytes(Vec<u8>),
    /// UTF-8 text sent as-is
    Text(String),
    /// JSON document, sent with `Content-Type: application/json`
    Json(serde_json::Value),
    /// URL-encoded form fields
    Form(BTreeMap<String, String>),
}

impl RequestBody {
    /// Bytes that identify this body for caching purposes
    ///
    /// JSON objects are rendered with sorted keys and form fields are encoded in
    /// key order, so two bodies that differ only in field order produce the same bytes.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        match self {
            RequestBody::Bytes(bytes) => bytes.clone(),
            RequestBody::Text(text) => text.as_bytes().to_vec(),
            RequestBody::Json(value) => value.to_string().into_bytes(),
            RequestBody::Form(fields) => url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(fields)
                .finish()
                .into_bytes(),
        }
    }
}

/// Everything about a request besides its method and URL
///
/// The cache only looks at `params` and `body` when deriving keys; every other
/// field, including `extensions`, is handed to the transport untouched.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query parameters, merged with any query string already present in the URL
    pub params: Vec<(String, String)>,
    /// Extra request headers
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Option<RequestBody>,
    /// Per-request timeout enforced by the transport
    pub timeout: Option<Duration>,
    /// HTTP basic credentials (username, optional password)
    pub basic_auth: Option<(String, Option<String>)>,
    /// Bearer token for the `Authorization` header
    pub bearer_token: Option<String>,
    /// Provider-specific settings passed through to the transport
    pub extensions: BTreeMap<String, String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn json(self, value: serde_json::Value) -> Self {
        self.body(RequestBody::Json(value))
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.body(RequestBody::Text(text.into()))
    }

    pub fn bytes(self, bytes: impl Into<Vec<u8>>) -> Self {
        self.body(RequestBody::Bytes(bytes.into()))
    }

    pub fn form<I, K, V>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.body(RequestBody::Form(fields))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.basic_auth = Some((username.into(), password));
        self
    }

    pub fn bearer_auth(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn extension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Checks the options before any cache or network activity
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.extensions.len() > MAX_EXTENSIONS {
            return Err(OptionsError::TooManyExtensions(self.extensions.len()));
        }
        Ok(())
    }
}
