//! Wire-level types and traits for the courier HTTP client.
//!
//! This crate provides the collaborators the resolution engine builds on:
//! - [`Method`] - HTTP method enum
//! - [`HttpRequest`] and [`HttpRequestBuilder`] - the standard outgoing message
//! - [`HttpResponse`] - the raw response handed back by a transport
//! - [`Transport`] - object-safe trait sending an [`HttpRequest`]
//! - [`Error`] and [`Result`] - error handling shared by every courier crate
//! - [`Part`] and [`encode_multipart`] - multipart encoding
//! - [`StatusCode`] - HTTP status codes (re-exported from `http` crate)

mod body;
mod error;
mod message;
mod method;
mod multipart;
pub mod prelude;
mod response;
mod transport;

pub use body::{ContentType, from_json, from_json_value, to_form, to_json, to_query_string};
pub use error::{Error, Result};
pub use message::{HttpRequest, HttpRequestBuilder};
pub use method::Method;
pub use multipart::{Part, encode_multipart, generate_boundary, multipart_content_type};
pub use response::HttpResponse;
pub use transport::{Transport, TransportFuture};

// Re-export http crate types for status codes
pub use http::StatusCode;
