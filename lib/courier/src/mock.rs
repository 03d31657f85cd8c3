//! Mock client: canned responses substituted for real transport calls.
//!
//! A [`MockClient`] attached to a call (explicitly, on the request, or on the
//! connector, in that order of precedence) is consulted by the built-in
//! `determine_mock_response` stage. Matching order:
//!
//! 1. the ordered sequence ([`MockClient::push`]), consumed front to back,
//! 2. responses registered for a request name ([`MockClient::for_request`]),
//! 3. URL patterns with `*` wildcards ([`MockClient::for_url`]),
//! 4. closures ([`MockClient::with`]).
//!
//! When nothing matches, resolution fails with [`crate::Error::NoMockResponse`].
//! Clones share state, so a test can keep a handle and assert on what was sent.
//!
//! # Example
//!
//! ```
//! use courier::{MockClient, MockResponse};
//! use serde_json::json;
//!
//! let mock = MockClient::new()
//!     .for_url("api.example.com/users/*", MockResponse::json(json!({"id": 1}), 200))
//!     .push(MockResponse::text("first", 200));
//! assert!(mock.nothing_sent());
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use courier_core::{HttpResponse, Method};

use crate::{Error, PendingRequest, Result};

/// A canned response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: Bytes,
    failure: Option<String>,
}

impl MockResponse {
    /// Response with a raw body.
    #[must_use]
    pub fn new(body: impl Into<Bytes>, status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
            failure: None,
        }
    }

    /// Empty `200 OK`.
    #[must_use]
    pub fn ok() -> Self {
        Self::new(Bytes::new(), 200)
    }

    /// JSON response with `Content-Type: application/json`.
    #[must_use]
    pub fn json(value: serde_json::Value, status: u16) -> Self {
        Self::new(value.to_string(), status).with_header("Content-Type", "application/json")
    }

    /// Plain text response.
    #[must_use]
    pub fn text(body: impl Into<String>, status: u16) -> Self {
        Self::new(body.into(), status).with_header("Content-Type", "text/plain")
    }

    /// Simulated transport failure; sending fails with a connection error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(Bytes::new(), 0)
        }
    }

    /// Adds a response header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Converts into a transport response.
    ///
    /// # Errors
    ///
    /// Returns a connection error for [`MockResponse::connection_error`].
    pub fn into_http_response(self) -> Result<HttpResponse> {
        match self.failure {
            Some(message) => Err(Error::connection(message)),
            None => Ok(HttpResponse::new(self.status, self.headers, self.body)),
        }
    }
}

/// A request seen by a [`MockClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Request name (type name unless overridden).
    pub name: String,
    /// Method.
    pub method: Method,
    /// Final URL, query included.
    pub url: String,
    /// Final headers, in merge order.
    pub headers: Vec<(String, String)>,
    /// Materialized body.
    pub body: Option<Bytes>,
    /// Response status, `None` when sending failed.
    pub status: Option<u16>,
}

impl RecordedRequest {
    /// Header value (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

type MockCallback = Arc<dyn Fn(&PendingRequest) -> Option<MockResponse> + Send + Sync>;

#[derive(Default)]
struct MockState {
    sequence: VecDeque<MockResponse>,
    by_name: Vec<(String, MockResponse)>,
    by_url: Vec<(String, MockResponse)>,
    callbacks: Vec<MockCallback>,
    recorded: Vec<RecordedRequest>,
}

/// Shared source of simulated responses.
#[derive(Clone, Default)]
pub struct MockClient {
    state: Arc<Mutex<MockState>>,
}

impl fmt::Debug for MockClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MockClient")
            .field("queued", &state.sequence.len())
            .field("by_name", &state.by_name.len())
            .field("by_url", &state.by_url.len())
            .field("callbacks", &state.callbacks.len())
            .field("recorded", &state.recorded.len())
            .finish()
    }
}

impl MockClient {
    /// Creates an empty mock client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock client answering every request with the given responses, in order.
    #[must_use]
    pub fn sequence(responses: impl IntoIterator<Item = MockResponse>) -> Self {
        let client = Self::new();
        client.lock().sequence.extend(responses);
        client
    }

    /// Queues a response for the next unmatched request.
    #[must_use]
    pub fn push(self, response: MockResponse) -> Self {
        self.lock().sequence.push_back(response);
        self
    }

    /// Answers requests of type `R`.
    #[must_use]
    pub fn for_request<R: ?Sized>(self, response: MockResponse) -> Self {
        self.for_request_named(std::any::type_name::<R>(), response)
    }

    /// Answers requests whose [`crate::Request::name`] is `name`.
    #[must_use]
    pub fn for_request_named(self, name: impl Into<String>, response: MockResponse) -> Self {
        self.lock().by_name.push((name.into(), response));
        self
    }

    /// Answers requests whose URL matches `pattern` (`*` matches anything).
    ///
    /// Patterns without a scheme are matched against the URL without its scheme.
    #[must_use]
    pub fn for_url(self, pattern: impl Into<String>, response: MockResponse) -> Self {
        self.lock().by_url.push((pattern.into(), response));
        self
    }

    /// Answers requests for which `callback` returns a response.
    #[must_use]
    pub fn with<F>(self, callback: F) -> Self
    where
        F: Fn(&PendingRequest) -> Option<MockResponse> + Send + Sync + 'static,
    {
        self.lock().callbacks.push(Arc::new(callback));
        self
    }

    /// Finds the response for a request, consuming it if it came from the sequence.
    #[must_use]
    pub fn find_response(&self, pending: &PendingRequest) -> Option<MockResponse> {
        let mut state = self.lock();
        if let Some(response) = state.sequence.pop_front() {
            return Some(response);
        }

        let name = pending.request_name();
        if let Some((_, response)) = state.by_name.iter().find(|(key, _)| key == name) {
            return Some(response.clone());
        }

        let url = pending.url();
        if let Some((_, response)) = state
            .by_url
            .iter()
            .find(|(pattern, _)| url_matches(pattern, &url))
        {
            return Some(response.clone());
        }

        let callbacks = state.callbacks.clone();
        drop(state);
        callbacks.iter().find_map(|callback| callback(pending))
    }

    /// Records a sent request.
    pub fn record(&self, request: RecordedRequest) {
        self.lock().recorded.push(request);
    }

    /// Every recorded request, in send order.
    #[must_use]
    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.lock().recorded.clone()
    }

    /// Last recorded request.
    #[must_use]
    pub fn last_recorded(&self) -> Option<RecordedRequest> {
        self.lock().recorded.last().cloned()
    }

    /// Number of recorded requests.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.lock().recorded.len()
    }

    /// Returns `true` if any recorded request satisfies `predicate`.
    pub fn was_sent(&self, predicate: impl Fn(&RecordedRequest) -> bool) -> bool {
        self.lock().recorded.iter().any(predicate)
    }

    /// Returns `true` if a request of type `R` was sent.
    #[must_use]
    pub fn was_sent_request<R: ?Sized>(&self) -> bool {
        let name = std::any::type_name::<R>();
        self.was_sent(|recorded| recorded.name == name)
    }

    /// Returns `true` if nothing was sent.
    #[must_use]
    pub fn nothing_sent(&self) -> bool {
        self.lock().recorded.is_empty()
    }

    /// Forgets recorded requests.
    pub fn clear_recorded(&self) {
        self.lock().recorded.clear();
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn url_matches(pattern: &str, url: &str) -> bool {
    if pattern.contains("://") {
        return wildcard_match(pattern.as_bytes(), url.as_bytes());
    }
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    wildcard_match(pattern.as_bytes(), without_scheme.as_bytes())
}

/// Glob match where `*` matches any run of characters.
fn wildcard_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(b'*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if Some(&c) == text.get(t) => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    pattern.get(p..).is_some_and(|rest| rest.iter().all(|&c| c == b'*'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_patterns() {
        assert!(wildcard_match(b"*", b"anything"));
        assert!(wildcard_match(b"api.test/users/*", b"api.test/users/42"));
        assert!(wildcard_match(b"api.test/*/posts", b"api.test/users/posts"));
        assert!(!wildcard_match(b"api.test/users", b"api.test/users/42"));
        assert!(wildcard_match(b"a*b*c", b"aXXbYYc"));
        assert!(!wildcard_match(b"a*b*c", b"aXXbYY"));
    }

    #[test]
    fn url_patterns_ignore_scheme_unless_given() {
        assert!(url_matches("api.test/*", "https://api.test/users"));
        assert!(url_matches("https://api.test/*", "https://api.test/users"));
        assert!(!url_matches("http://api.test/*", "https://api.test/users"));
    }

    #[test]
    fn connection_error_fails_conversion() {
        let err = MockResponse::connection_error("refused")
            .into_http_response()
            .expect_err("simulated failure");
        assert!(err.is_connection());

        let ok = MockResponse::json(serde_json::json!({"ok": true}), 201)
            .into_http_response()
            .expect("response");
        assert_eq!(ok.status(), 201);
        assert_eq!(ok.header("content-type"), Some("application/json"));
    }

    #[test]
    fn clones_share_recordings() {
        let mock = MockClient::new();
        let handle = mock.clone();
        mock.record(RecordedRequest {
            name: "GetUser".to_string(),
            method: Method::Get,
            url: "https://api.test/users/1".to_string(),
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            body: None,
            status: Some(200),
        });

        assert_eq!(handle.sent_count(), 1);
        assert!(handle.was_sent(|r| r.url.ends_with("/users/1")));
        assert_eq!(
            handle.last_recorded().and_then(|r| r.header("accept").map(str::to_string)),
            Some("application/json".to_string())
        );
        handle.clear_recorded();
        assert!(mock.nothing_sent());
    }
}
