//! HTTP message envelopes for the host-does-IO pattern.
//!
//! # Design
//! `Request` and `Response` are plain data. A `Transport` turns a `Request`
//! into a `Response`; everything above it (redirects, caching, decoding)
//! works on these values only, which keeps the pipeline deterministic and
//! testable with scripted transports.
//!
//! Both envelopes are immutable once built. Adding a header consumes the
//! request and returns a new one, so a dispatcher can never alias the
//! caller's original. A response's predecessor link is fixed at the moment
//! the response is linked into a chain and can never be replaced.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Delete,
    Get,
    Head,
    Patch,
    Post,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Delete => "DELETE",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Patch => "PATCH",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }

    /// Case-insensitive comparison against a method name.
    pub fn is(&self, name: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(name)
    }

    /// Whether the method is defined with a request body. Other methods may
    /// still carry one, e.g. `DELETE` of a repository file.
    pub fn has_body(&self) -> bool {
        matches!(self, Method::Patch | Method::Post | Method::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive header map.
///
/// Names are stored lower-cased in insertion order. A missing header is
/// distinct from a header whose value is the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.0
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert a header unless one with the same name is already present.
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        if !self.contains(name) {
            self.0.push((name.to_ascii_lowercase(), value.into()));
        }
    }

    /// Insert a header, replacing any existing value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        match self.0.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        let index = self.0.iter().position(|(key, _)| *key == name)?;
        Some(self.0.remove(index).1)
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

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    /// Later duplicates overwrite earlier ones.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.set(name.as_ref(), value);
        }
        headers
    }
}

/// Request payload handed to `Api::create_request`.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Sent verbatim, no `Content-Type` is implied.
    Text(String),
    /// Encoded to JSON text with `Content-Type: application/json; charset=utf-8`.
    Json(serde_json::Value),
}

impl Body {
    /// Convert any serializable value into a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Body::Json(serde_json::to_value(value)?))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Body::Json(value)
    }
}

/// An outbound call described as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    url: String,
    headers: Headers,
    body: Option<String>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>, headers: Headers, body: Option<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers,
            body,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Add a header unless the request already carries one with that name.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Set a header, overwriting any existing value.
    pub fn with_header_set(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Same method, headers and body aimed at another URL.
    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self {
            method: self.method,
            url: url.into(),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

/// A completed exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    code: u16,
    headers: Headers,
    #[serde(with = "base64_body")]
    body: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous: Option<Box<Response>>,
}

/// Response bodies are persisted as base64 so binary payloads survive.
mod base64_body {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match body {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| STANDARD.decode(encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}

impl Response {
    pub const S200_OK: u16 = 200;
    pub const S301_MOVED_PERMANENTLY: u16 = 301;
    pub const S302_FOUND: u16 = 302;
    pub const S304_NOT_MODIFIED: u16 = 304;
    pub const S307_TEMPORARY_REDIRECT: u16 = 307;
    pub const S400_BAD_REQUEST: u16 = 400;
    pub const S401_UNAUTHORIZED: u16 = 401;
    pub const S403_FORBIDDEN: u16 = 403;
    pub const S404_NOT_FOUND: u16 = 404;
    pub const S422_UNPROCESSABLE_ENTITY: u16 = 422;

    pub fn new(code: u16, headers: Headers, body: Option<Vec<u8>>) -> Self {
        Self {
            code,
            headers,
            body,
            previous: None,
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn is_code(&self, code: u16) -> bool {
        self.code == code
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains(name)
    }

    /// Raw body bytes as received.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// The body as text; `None` when absent or not valid UTF-8.
    pub fn body_text(&self) -> Option<&str> {
        self.body().and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// The response this one superseded (redirect source, live 304, ...).
    pub fn previous(&self) -> Option<&Response> {
        self.previous.as_deref()
    }

    /// Link `previous` as this response's predecessor.
    ///
    /// Linking `None` leaves the response unchanged. Linking a predecessor
    /// onto a response that already has one is a `Logic` error.
    pub fn with_previous(mut self, previous: Option<Response>) -> Result<Self> {
        let Some(previous) = previous else {
            return Ok(self);
        };
        if self.previous.is_some() {
            return Err(ApiError::Logic("Previous response is already set.".to_string()));
        }
        self.previous = Some(Box::new(previous));
        Ok(self)
    }

    /// Predecessors, nearest first.
    pub fn history(&self) -> impl Iterator<Item = &Response> {
        std::iter::successors(self.previous(), |response| response.previous())
    }

    /// The same response without its predecessor chain.
    pub(crate) fn snapshot(&self) -> Self {
        Self::new(self.code, self.headers.clone(), self.body.clone())
    }
}
