//! Configuration types.
//!
//! - [`ClientConfig`] configures the [`crate::HyperClient`] transport.
//! - [`GlobalConfig`] carries the settings every resolution starts from: the
//!   default user agent, global middleware and the multipart stream factory.
//!   Connectors hand it to the resolution engine through
//!   [`crate::Connector::global_config`].

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::body::{BoundaryStreamFactory, StreamFactory};
use crate::MiddlewarePipeline;

/// Default `User-Agent` header value.
pub const DEFAULT_USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

/// [`crate::HyperClient`] settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Timeout of messages that carry none.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Idle connections kept per host.
    pub pool_idle_per_host: usize,
    /// How long an idle connection is kept.
    pub pool_idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

impl ClientConfig {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for [`ClientConfig`], starting from the defaults.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Timeout of messages that carry none.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Idle connections kept per host.
    #[must_use]
    pub const fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.config.pool_idle_per_host = count;
        self
    }

    /// How long an idle connection is kept.
    #[must_use]
    pub const fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

// ============================================================================
// Global configuration
// ============================================================================

/// Settings injected into every resolution.
#[derive(Clone)]
pub struct GlobalConfig {
    user_agent: Option<String>,
    middleware: MiddlewarePipeline,
    stream_factory: Arc<dyn StreamFactory>,
}

impl fmt::Debug for GlobalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalConfig")
            .field("user_agent", &self.user_agent)
            .field("middleware", &self.middleware)
            .field("stream_factory", &self.stream_factory)
            .finish()
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            middleware: MiddlewarePipeline::new(),
            stream_factory: Arc::new(BoundaryStreamFactory),
        }
    }
}

impl GlobalConfig {
    /// Starts a builder from the defaults.
    #[must_use]
    pub fn builder() -> GlobalConfigBuilder {
        GlobalConfigBuilder::default()
    }

    /// Process-wide default, immutable once created.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<GlobalConfig>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::default())))
    }

    /// Default `User-Agent`, if any.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Middleware appended after connector and request middleware.
    #[must_use]
    pub const fn middleware(&self) -> &MiddlewarePipeline {
        &self.middleware
    }

    /// Factory handed to multipart bodies.
    #[must_use]
    pub const fn stream_factory(&self) -> &Arc<dyn StreamFactory> {
        &self.stream_factory
    }
}

/// Builder for [`GlobalConfig`].
#[derive(Debug, Clone, Default)]
pub struct GlobalConfigBuilder {
    config: GlobalConfig,
}

impl GlobalConfigBuilder {
    /// Set the default `User-Agent`.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Send no default `User-Agent`.
    #[must_use]
    pub fn without_user_agent(mut self) -> Self {
        self.config.user_agent = None;
        self
    }

    /// Set the global middleware.
    #[must_use]
    pub fn middleware(mut self, middleware: MiddlewarePipeline) -> Self {
        self.config.middleware = middleware;
        self
    }

    /// Set the multipart stream factory.
    #[must_use]
    pub fn stream_factory(mut self, factory: impl StreamFactory + 'static) -> Self {
        self.config.stream_factory = Arc::new(factory);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> GlobalConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builder_keeps_unset_defaults() {
        assert_eq!(ClientConfig::builder().build(), ClientConfig::default());

        let config = ClientConfig::builder()
            .timeout(Duration::from_secs(60))
            .pool_idle_per_host(16)
            .build();
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.pool_idle_per_host, 16);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn shared_global_config_is_a_single_instance() {
        assert!(Arc::ptr_eq(&GlobalConfig::shared(), &GlobalConfig::shared()));
        assert_eq!(GlobalConfig::shared().user_agent(), Some(DEFAULT_USER_AGENT));
    }

    #[test]
    fn global_builder() {
        let mut middleware = MiddlewarePipeline::new();
        middleware.on_request_named("global", |_| Ok(None));

        let config = GlobalConfig::builder()
            .without_user_agent()
            .middleware(middleware)
            .build();
        assert_eq!(config.user_agent(), None);
        assert_eq!(config.middleware().request_pipe_names(), ["global"]);
    }
}
