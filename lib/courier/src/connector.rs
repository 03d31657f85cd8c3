//! Connector: the reusable description of an API.
//!
//! Every method except [`Connector::resolve_base_url`] has a default. Values are
//! recomputed for each call and never written back, so a connector can be
//! shared by many concurrent resolutions.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use courier::{Authenticator, Connector, Headers, TokenAuthenticator};
//!
//! struct GitHub {
//!     token: String,
//! }
//!
//! impl Connector for GitHub {
//!     fn resolve_base_url(&self) -> String {
//!         "https://api.github.com".to_string()
//!     }
//!
//!     fn headers(&self) -> Headers {
//!         Headers::from([("Accept", "application/vnd.github+json")])
//!     }
//!
//!     fn authenticator(&self) -> Option<Arc<dyn Authenticator>> {
//!         Some(Arc::new(TokenAuthenticator::new(self.token.clone())))
//!     }
//! }
//! ```

use std::sync::Arc;

use courier_core::Transport;

use crate::capability::Capability;
use crate::{
    Authenticator, Body, ConfigStore, Delay, GlobalConfig, Headers, Hydrator, MiddlewarePipeline,
    MockClient, PendingRequest, Query, ResponseType, Result, default_transport,
};

/// Defaults shared by every request sent through an API.
pub trait Connector: Send + Sync {
    /// Base URL every endpoint is joined to.
    fn resolve_base_url(&self) -> String;

    /// Default headers.
    fn headers(&self) -> Headers {
        Headers::new()
    }

    /// Default query parameters.
    fn query(&self) -> Query {
        Query::new()
    }

    /// Default per-call config.
    fn config(&self) -> ConfigStore {
        ConfigStore::new()
    }

    /// Middleware run before the request's own.
    fn middleware(&self) -> MiddlewarePipeline {
        MiddlewarePipeline::new()
    }

    /// Default body.
    fn body(&self) -> Option<Body> {
        None
    }

    /// Default delay.
    fn delay(&self) -> Delay {
        Delay::none()
    }

    /// Default authenticator.
    fn authenticator(&self) -> Option<Arc<dyn Authenticator>> {
        None
    }

    /// Default mock client.
    fn mock_client(&self) -> Option<MockClient> {
        None
    }

    /// Default response type.
    fn response_type(&self) -> Option<ResponseType> {
        None
    }

    /// Default hydrator for [`crate::Response::dto`].
    fn hydrator(&self) -> Option<Hydrator> {
        None
    }

    /// Attached capabilities, booted before the request's.
    fn capabilities(&self) -> Vec<Arc<dyn Capability>> {
        Vec::new()
    }

    /// Last chance to adjust the request, before middleware runs.
    ///
    /// # Errors
    ///
    /// Errors abort resolution unchanged.
    fn boot(&self, _pending: &mut PendingRequest) -> Result<()> {
        Ok(())
    }

    /// Transport used for real sends.
    fn transport(&self) -> Arc<dyn Transport> {
        default_transport()
    }

    /// Global settings: default user agent, global middleware, stream factory.
    fn global_config(&self) -> Arc<GlobalConfig> {
        GlobalConfig::shared()
    }
}

impl<C: Connector + ?Sized> Connector for Arc<C> {
    fn resolve_base_url(&self) -> String {
        (**self).resolve_base_url()
    }

    fn headers(&self) -> Headers {
        (**self).headers()
    }

    fn query(&self) -> Query {
        (**self).query()
    }

    fn config(&self) -> ConfigStore {
        (**self).config()
    }

    fn middleware(&self) -> MiddlewarePipeline {
        (**self).middleware()
    }

    fn body(&self) -> Option<Body> {
        (**self).body()
    }

    fn delay(&self) -> Delay {
        (**self).delay()
    }

    fn authenticator(&self) -> Option<Arc<dyn Authenticator>> {
        (**self).authenticator()
    }

    fn mock_client(&self) -> Option<MockClient> {
        (**self).mock_client()
    }

    fn response_type(&self) -> Option<ResponseType> {
        (**self).response_type()
    }

    fn hydrator(&self) -> Option<Hydrator> {
        (**self).hydrator()
    }

    fn capabilities(&self) -> Vec<Arc<dyn Capability>> {
        (**self).capabilities()
    }

    fn boot(&self, pending: &mut PendingRequest) -> Result<()> {
        (**self).boot(pending)
    }

    fn transport(&self) -> Arc<dyn Transport> {
        (**self).transport()
    }

    fn global_config(&self) -> Arc<GlobalConfig> {
        (**self).global_config()
    }
}
