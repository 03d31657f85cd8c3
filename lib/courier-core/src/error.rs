//! Error types for courier.
//!
//! Errors fall into four families:
//! - configuration errors raised while a request is resolved
//!   ([`Error::BodyTypeMismatch`], [`Error::InvalidResponseType`], ...),
//! - errors propagated unmodified from capability boot hooks and middleware
//!   ([`Error::Custom`]),
//! - transport errors, wrapped with request context ([`Error::Transport`]),
//! - HTTP status failures surfaced on demand ([`Error::Request`]).

use bytes::Bytes;
use derive_more::{Display, Error, From};

use crate::Method;

/// Main error type for courier operations.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// The response carried a 4xx or 5xx status.
    #[display("{method} {url} failed with HTTP status {status}")]
    #[from(skip)]
    Request {
        /// Method of the failed request.
        method: Method,
        /// Final URL of the failed request.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body.
        #[error(not(source))]
        body: Bytes,
    },

    /// A transport-level failure, with the request it happened on.
    #[display("{method} {url}: {source}")]
    #[from(skip)]
    Transport {
        /// Method of the request being sent.
        method: Method,
        /// Final URL of the request being sent.
        url: String,
        /// Underlying transport error.
        source: Box<Error>,
    },

    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// Request timeout.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// Connector and request declare bodies of different kinds.
    #[display("body type mismatch: connector body is {connector}, request body is {request}")]
    #[from(skip)]
    BodyTypeMismatch {
        /// Kind of the connector body.
        connector: &'static str,
        /// Kind of the request body.
        request: &'static str,
    },

    /// A response was converted into a type other than the resolved one.
    #[display("invalid response type: resolved `{resolved}`, requested `{requested}`")]
    #[from(skip)]
    InvalidResponseType {
        /// Name of the resolved response type.
        resolved: &'static str,
        /// Name of the requested response type.
        requested: &'static str,
    },

    /// Invalid request configuration.
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// A mock client was attached but had no response for the request.
    #[display("no mock response matched {method} {url}")]
    #[from(skip)]
    NoMockResponse {
        /// Method of the unmatched request.
        method: Method,
        /// Final URL of the unmatched request.
        url: String,
    },

    /// Pagination could not proceed.
    #[display("pagination error: {_0}")]
    #[from(skip)]
    Pagination(#[error(not(source))] String),

    /// JSON serialization error.
    #[display("JSON serialization error: {_0}")]
    #[from]
    JsonSerialization(serde_json::Error),

    /// JSON deserialization error with path context.
    #[display("JSON deserialization error at '{path}': {message}")]
    #[from(skip)]
    JsonDeserialization {
        /// JSON path to the error (e.g., "user.address.city").
        path: String,
        /// Error message.
        message: String,
    },

    /// Form URL-encoded serialization error.
    #[display("form serialization error: {_0}")]
    #[from]
    FormSerialization(serde_urlencoded::ser::Error),

    /// Query string serialization error.
    #[display("query serialization error: {_0}")]
    #[from]
    QuerySerialization(serde_html_form::ser::Error),

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),

    /// An error raised by user code (capability boot hooks, middleware, authenticators).
    #[display("{_0}")]
    #[from(skip)]
    Custom(#[error(not(source))] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a pagination error.
    #[must_use]
    pub fn pagination(message: impl Into<String>) -> Self {
        Self::Pagination(message.into())
    }

    /// Wrap any user error so it can travel through the pipeline unchanged.
    #[must_use]
    pub fn custom(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Custom(error.into())
    }

    /// Wrap a transport error with the request it happened on.
    #[must_use]
    pub fn transport(method: Method, url: impl Into<String>, source: Self) -> Self {
        Self::Transport {
            method,
            url: url.into(),
            source: Box::new(source),
        }
    }

    /// Create a JSON deserialization error with path context.
    #[must_use]
    pub fn json_deserialization(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JsonDeserialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// The innermost error, looking through [`Error::Transport`] wrappers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Transport { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), Self::Timeout)
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self.root(), Self::Connection(_))
    }

    /// Returns `true` if the error happened while resolving a request, before any dispatch.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::BodyTypeMismatch { .. }
                | Self::InvalidResponseType { .. }
                | Self::InvalidRequest(_)
                | Self::InvalidUrl(_)
        )
    }

    /// Returns the HTTP status code if this is a status failure.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if this is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// Returns `true` if this is a server error (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| (500..600).contains(&s))
    }

    /// Returns the response body if this is a status failure.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        match self {
            Self::Request { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Try to decode the body of a status failure as JSON.
    ///
    /// Returns `None` when the error carries no response body.
    pub fn decode_body<T: serde::de::DeserializeOwned>(&self) -> Option<Result<T>> {
        self.body().map(|body| crate::from_json(body))
    }
}
