//! Prelude module for convenient imports.
//!
//! ```ignore
//! use courier_core::prelude::*;
//! ```

pub use crate::{
    ContentType, Error, HttpRequest, HttpRequestBuilder, HttpResponse, Method, Part, Result,
    Transport, TransportFuture, from_json, to_form, to_json,
};
