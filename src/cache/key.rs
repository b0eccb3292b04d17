//! Cache key derivation
//!
//! A [`RequestDescriptor`] captures the parts of a request that decide cache
//! equivalence: method, URL without its query string, the query parameters as a
//! sorted map, and the request body. [`CacheKey::compute`] digests its canonical
//! form with SHA-256.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::http::{Method, RequestOptions};

/// The cache-relevant view of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    method: Method,
    url: String,
    params: BTreeMap<String, Vec<String>>,
    body: Option<Vec<u8>>,
}

impl RequestDescriptor {
    /// Creates a descriptor, moving any query string in `url` into the parameter map
    ///
    /// The fragment is dropped since it never reaches the server.
    pub fn new(method: Method, url: &str) -> Self {
        let without_fragment = url.split_once('#').map_or(url, |(head, _)| head);
        let (base, query) = without_fragment
            .split_once('?')
            .unwrap_or((without_fragment, ""));

        let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }

        Self {
            method,
            url: base.to_string(),
            params,
            body: None,
        }
    }

    /// Builds the descriptor for a request the cached client is about to issue
    pub fn from_request(method: Method, url: &str, options: &RequestOptions) -> Self {
        let descriptor = Self::new(method, url).with_params(
            options
                .params
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str())),
        );
        match &options.body {
            Some(body) => descriptor.with_body(body.canonical_bytes()),
            None => descriptor,
        }
    }

    /// Adds explicit parameters; a key given here replaces the same key from the URL
    pub fn with_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut explicit: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in params {
            explicit.entry(key.into()).or_default().push(value.into());
        }
        self.params.extend(explicit);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// URL with query string and fragment removed
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn params(&self) -> &BTreeMap<String, Vec<String>> {
        &self.params
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// The merged parameters as ordered pairs, in the order they are keyed and sent
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |value| (key.clone(), value.clone())))
            .collect()
    }

    /// `METHOD|url|sorted-params|body-hash`
    fn canonical_string(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for (key, values) in &self.params {
            for value in values {
                query.append_pair(key, value);
            }
        }
        let body_hash = self.body.as_deref().map(sha256_hex).unwrap_or_default();

        format!(
            "{}|{}|{}|{}",
            self.method.as_str(),
            self.url,
            query.finish(),
            body_hash
        )
    }
}

/// Fixed-length, filesystem-safe identifier of a cache-equivalent request
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Length of a key in hex characters
    pub const LEN: usize = 64;

    /// Derives the key for a descriptor
    pub fn compute(descriptor: &RequestDescriptor) -> Self {
        Self(sha256_hex(descriptor.canonical_string().as_bytes()))
    }

    /// Accepts only strings shaped like a computed key
    pub fn parse(s: &str) -> Option<Self> {
        let well_formed = s.len() == Self::LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        well_formed.then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
