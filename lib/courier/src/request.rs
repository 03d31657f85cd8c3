//! Request: the description of one API call.
//!
//! # Example
//!
//! ```
//! use courier::{Method, Query, Request};
//!
//! struct ListRepos {
//!     org: String,
//!     page: u32,
//! }
//!
//! impl Request for ListRepos {
//!     fn method(&self) -> Method {
//!         Method::Get
//!     }
//!
//!     fn resolve_endpoint(&self) -> String {
//!         format!("/orgs/{}/repos", self.org)
//!     }
//!
//!     fn query(&self) -> Query {
//!         Query::new().with("page", self.page.to_string())
//!     }
//! }
//! ```

use std::sync::Arc;

use courier_core::Method;

use crate::capability::Capability;
use crate::{
    Authenticator, Body, ConfigStore, Delay, Headers, Hydrator, MiddlewarePipeline, MockClient,
    PendingRequest, Query, ResponseType, Result,
};

/// One API call. Every value overrides the connector's on collision.
pub trait Request: Send + Sync {
    /// HTTP method.
    fn method(&self) -> Method;

    /// Endpoint, joined to the connector base URL. Absolute URLs are used as is.
    fn resolve_endpoint(&self) -> String;

    /// Name used by mock matching and recordings.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Headers.
    fn headers(&self) -> Headers {
        Headers::new()
    }

    /// Query parameters.
    fn query(&self) -> Query {
        Query::new()
    }

    /// Per-call config.
    fn config(&self) -> ConfigStore {
        ConfigStore::new()
    }

    /// Middleware run after the connector's.
    fn middleware(&self) -> MiddlewarePipeline {
        MiddlewarePipeline::new()
    }

    /// Body.
    fn body(&self) -> Option<Body> {
        None
    }

    /// Delay, replacing the connector's when set.
    fn delay(&self) -> Delay {
        Delay::none()
    }

    /// Authenticator, replacing the connector's when set.
    fn authenticator(&self) -> Option<Arc<dyn Authenticator>> {
        None
    }

    /// Mock client, replacing the connector's when set.
    fn mock_client(&self) -> Option<MockClient> {
        None
    }

    /// Response type, replacing the connector's when set.
    fn response_type(&self) -> Option<ResponseType> {
        None
    }

    /// Hydrator, replacing the connector's when set.
    fn hydrator(&self) -> Option<Hydrator> {
        None
    }

    /// Attached capabilities, booted after the connector's.
    fn capabilities(&self) -> Vec<Arc<dyn Capability>> {
        Vec::new()
    }

    /// Runs right after the connector's boot hook.
    ///
    /// # Errors
    ///
    /// Errors abort resolution unchanged.
    fn boot(&self, _pending: &mut PendingRequest) -> Result<()> {
        Ok(())
    }
}
