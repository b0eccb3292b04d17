use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A captured HTTP response
///
/// This is the only response shape the cache deals in: transports produce it,
/// cache entries store it, and callers receive it whether it came from the
/// network or from disk. Header names are stored lower-cased; each name maps to
/// every value the server sent for it, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    url: String,
    headers: BTreeMap<String, Vec<String>>,
    #[serde(with = "body_base64")]
    body: Vec<u8>,
    #[serde(skip)]
    from_cache: bool,
}

impl CachedResponse {
    /// Creates an empty response with the given status and final URL
    pub fn new(status: u16, url: impl Into<String>) -> Self {
        Self {
            status,
            reason: None,
            url: url.into(),
            headers: BTreeMap::new(),
            body: Vec::new(),
            from_cache: false,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Appends a header value; repeated names accumulate
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub(crate) fn mark_cached(mut self) -> Self {
        self.from_cache = true;
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the status code is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &BTreeMap<String, Vec<String>> {
        &self.headers
    }

    /// First value of a header, looked up case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_all(name).first().map(String::as_str)
    }

    /// All values of a header, looked up case-insensitively
    pub fn header_all(&self, name: &str) -> &[String] {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Body decoded as UTF-8, with invalid sequences replaced
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Body parsed as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// True when this value was served from the disk cache instead of the network
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }
}

/// Stores body bytes as a base64 string so entries stay valid JSON
mod body_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
