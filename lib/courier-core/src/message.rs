//! Standard outgoing HTTP message.
//!
//! An [`HttpRequest`] is what a resolved request is turned into right before it
//! reaches a [`crate::Transport`]: method, final URL (query included), headers in
//! the order they were merged, and an already materialized body.
//!
//! # Example
//!
//! ```
//! use courier_core::{HttpRequest, Method};
//!
//! let request = HttpRequest::builder(Method::Get, "https://api.example.com".parse().unwrap())
//!     .header("Accept", "application/json")
//!     .query("page", "1")
//!     .build();
//! assert_eq!(request.url().as_str(), "https://api.example.com/?page=1");
//! ```

use std::time::Duration;

use bytes::Bytes;
use url::Url;

use crate::Method;

/// An HTTP request ready for a transport.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    timeout: Option<Duration>,
}

impl HttpRequest {
    /// Creates a new [`HttpRequestBuilder`].
    #[must_use]
    pub fn builder(method: Method, url: Url) -> HttpRequestBuilder {
        HttpRequestBuilder::new(method, url)
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Request URL, query string included.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request headers, in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Single header value by name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Request body.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Per-message timeout, overriding the transport default.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Consume into (method, url, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (Method, Url, Vec<(String, String)>, Option<Bytes>) {
        (self.method, self.url, self.headers, self.body)
    }
}

/// Builder for constructing [`HttpRequest`] instances.
#[derive(Debug, Clone)]
pub struct HttpRequestBuilder {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    timeout: Option<Duration>,
}

impl HttpRequestBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    /// Sets a header, replacing any previous value with the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    /// Sets multiple headers, in order.
    #[must_use]
    pub fn headers(self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        headers
            .into_iter()
            .fold(self, |builder, (name, value)| builder.header(name, value))
    }

    /// Appends a query parameter to the URL.
    #[must_use]
    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(name, value);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a per-message timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn json<T: serde::Serialize>(self, value: &T) -> crate::Result<Self> {
        let body = crate::to_json(value)?;
        Ok(self.header("Content-Type", "application/json").body(body))
    }

    /// Builds the [`HttpRequest`].
    #[must_use]
    pub fn build(self) -> HttpRequest {
        HttpRequest {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("valid URL")
    }

    #[test]
    fn header_replaces_case_insensitively_and_keeps_position() {
        let request = HttpRequest::builder(Method::Get, url("https://api.example.com"))
            .header("Accept", "text/plain")
            .header("X-Trace", "1")
            .header("accept", "application/json")
            .build();

        assert_eq!(request.headers().len(), 2);
        assert_eq!(request.header("ACCEPT"), Some("application/json"));
        assert_eq!(
            request.headers().first().map(|(name, _)| name.as_str()),
            Some("Accept")
        );
    }

    #[test]
    fn query_pairs_are_appended() {
        let request = HttpRequest::builder(Method::Get, url("https://api.example.com/users?a=1"))
            .query("page", "2")
            .build();
        assert_eq!(
            request.url().as_str(),
            "https://api.example.com/users?a=1&page=2"
        );
    }

    #[test]
    fn json_body_sets_content_type() {
        let request = HttpRequest::builder(Method::Post, url("https://api.example.com"))
            .json(&serde_json::json!({"name": "courier"}))
            .expect("json")
            .timeout(Duration::from_secs(5))
            .build();

        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(
            request.body().map(|body| body.to_vec()),
            Some(br#"{"name":"courier"}"#.to_vec())
        );
        assert_eq!(request.timeout(), Some(Duration::from_secs(5)));
    }
}
