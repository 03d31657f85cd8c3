//! Connector/request HTTP client for Rust.
//!
//! A [`Connector`] describes an API (base URL, default headers, authentication,
//! middleware...), a [`Request`] describes one call. Sending a request resolves
//! both into a frozen [`ResolvedRequest`] through a fixed protocol, runs the
//! request-phase middleware, then dispatches it to a [`Transport`] or a
//! [`MockClient`].
//!
//! # Example
//!
//! ```no_run
//! use courier::prelude::*;
//!
//! #[derive(Debug, Deserialize)]
//! pub struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! struct Api;
//!
//! impl Connector for Api {
//!     fn resolve_base_url(&self) -> String {
//!         "https://api.example.com".to_string()
//!     }
//!
//!     fn capabilities(&self) -> Vec<std::sync::Arc<dyn Capability>> {
//!         vec![std::sync::Arc::new(JsonApi)]
//!     }
//! }
//!
//! struct GetUser(u64);
//!
//! impl Request for GetUser {
//!     fn method(&self) -> Method {
//!         Method::Get
//!     }
//!
//!     fn resolve_endpoint(&self) -> String {
//!         format!("/users/{}", self.0)
//!     }
//! }
//!
//! # async fn run() -> courier::Result<()> {
//! let user: User = Api.send(&GetUser(42))?.await?.dto()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! ```
//! use courier::prelude::*;
//!
//! # struct Api;
//! # impl Connector for Api {
//! #     fn resolve_base_url(&self) -> String { "https://api.example.com".into() }
//! # }
//! # struct GetUser(u64);
//! # impl Request for GetUser {
//! #     fn method(&self) -> Method { Method::Get }
//! #     fn resolve_endpoint(&self) -> String { format!("/users/{}", self.0) }
//! # }
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> courier::Result<()> {
//! let mock = MockClient::new().for_url("api.example.com/users/*", MockResponse::text("ok", 200));
//!
//! let response = Api.send_with_mock(&GetUser(1), mock.clone())?.await?;
//! assert!(response.is_simulated());
//! assert_eq!(mock.sent_count(), 1);
//! # Ok(())
//! # }
//! ```

mod auth;
mod body;
mod capability;
mod client;
mod config;
mod connector;
mod delay;
mod dispatch;
pub mod middleware;
mod mock;
mod paginator;
mod pending;
mod pool;
pub mod prelude;
mod request;
mod response;
mod store;

pub use auth::{
    Authenticator, BasicAuthenticator, HeaderAuthenticator, QueryAuthenticator,
    TokenAuthenticator,
};
pub use body::{Body, BodyKind, BoundaryStreamFactory, FixedBoundary, MultipartBody, StreamFactory};
pub use capability::{
    AcceptsJson, AlwaysThrowOnErrors, Capability, CapabilityRegistry, HasTimeout, JsonApi,
    UserAgent, discover,
};
pub use client::{BoxedService, HyperClient, HyperClientBuilder, ServiceFuture, default_transport, https_connector};
pub use config::{
    ClientConfig, ClientConfigBuilder, DEFAULT_USER_AGENT, GlobalConfig, GlobalConfigBuilder,
};
pub use connector::Connector;
pub use delay::Delay;
pub use dispatch::{ConnectorExt, dispatch};
pub use middleware::{MiddlewarePipeline, Pipe};
pub use mock::{MockClient, MockResponse, RecordedRequest};
pub use paginator::{PageHooks, Pagination, Paginator, PaginatorState};
pub use pending::{PendingRequest, ResolveOptions, ResolvedRequest};
pub use pool::{Concurrency, Pool, PoolSummary};
pub use request::Request;
pub use response::{FromResponse, Hydrator, Response, ResponseType};
pub use store::{ArrayStore, ConfigStore, Headers, Query};

// Re-export tower for transport layers
pub use tower;

// Re-export core types
pub use courier_core::{
    ContentType, Error, HttpRequest, HttpRequestBuilder, HttpResponse, Method, Part, Result,
    StatusCode, Transport, TransportFuture, from_json, from_json_value, to_form, to_json,
    to_query_string,
};
