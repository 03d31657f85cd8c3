//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and traits for easy
//! glob importing:
//!
//! ```
//! use courier::prelude::*;
//! ```

pub use crate::{
    AcceptsJson, AlwaysThrowOnErrors, Authenticator, Body, Capability, ConfigStore, Connector,
    ConnectorExt, Delay, Error, FromResponse, Headers, HttpRequest, HttpResponse, JsonApi, Method,
    MiddlewarePipeline, MockClient, MockResponse, Part, PendingRequest, Query, Request,
    ResolvedRequest, Response, Result, StatusCode, TokenAuthenticator, Transport,
};
pub use serde::{Deserialize, Serialize};
