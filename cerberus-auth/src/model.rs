//! Version-neutral request/response model.
//!
//! Both wire generations of the check schema are normalized into these types
//! before the checker runs, and the checker's answer is translated back out
//! of them. One `Request` and one `Response` exist per inbound call; nothing
//! here is pooled or shared across calls.

use std::collections::HashMap;

/// Response header carrying the machine-readable decision classification.
/// Used only for metrics labeling, never for control flow.
pub const REASON_HEADER: &str = "X-Cerberus-Reason";

/// Context key signaling that the original request already carried an
/// upstream authentication credential.
pub const HAS_UPSTREAM_AUTH: &str = "HasUpstreamAuth";

/// String-keyed header collection shared by [`Request`] and [`Response`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(HashMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a header by exact key match.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, String>> for Headers {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Internal neutral form of an authorization check request.
///
/// Built per call by a version normalizer; read-only once handed to the
/// checker. Fields absent in one wire generation normalize to their
/// `Default` values so checker behavior is identical across versions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// Proxy-supplied context extensions, including [`HAS_UPSTREAM_AUTH`].
    pub context: HashMap<String, String>,
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub host: String,
    pub scheme: String,
    pub protocol: String,
    pub body: String,
    pub headers: Headers,
    pub source_principal: String,
    pub source_address: String,
    pub destination_principal: String,
    pub destination_address: String,
}

impl Request {
    /// Whether the proxy flagged this request as carrying upstream
    /// authentication.
    pub fn has_upstream_auth(&self) -> bool {
        self.context
            .get(HAS_UPSTREAM_AUTH)
            .map(|v| v == "true")
            .unwrap_or(false)
    }
}

/// Internal neutral form of a decision outcome, produced by the checker and
/// immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// Allow or deny the proxied request.
    pub allow: bool,
    /// HTTP status returned to the downstream client on deny.
    pub status_code: u16,
    /// Body returned to the downstream client on deny.
    pub body: String,
    /// Headers appended on allow, or attached to the deny response.
    pub headers: Headers,
    /// Request headers the proxy should strip before forwarding.
    /// Representable on the wire only in v3; dropped by the v2 translation.
    pub headers_to_remove: Vec<String>,
}

/// Decision classification extracted from the [`REASON_HEADER`] response
/// header. Empty when the checker set no reason.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CerberusReason(String);

impl CerberusReason {
    pub fn from_response(response: &Response) -> Self {
        Self(
            response
                .headers
                .get(REASON_HEADER)
                .unwrap_or_default()
                .to_string(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CerberusReason {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
