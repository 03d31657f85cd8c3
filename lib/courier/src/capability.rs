//! Capabilities: optional, composable behavior attached to connectors and requests.
//!
//! A connector or request declares its capabilities explicitly through
//! `capabilities()`. A capability may attach further capabilities; discovery is
//! recursive (depth-first, declaration order) and each discovered capability is
//! booted exactly once per declaring side.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use courier::{AcceptsJson, Capability, PendingRequest, Result};
//!
//! struct Tenant(&'static str);
//!
//! impl Capability for Tenant {
//!     fn name(&self) -> &str {
//!         "tenant"
//!     }
//!
//!     fn capabilities(&self) -> Vec<Arc<dyn Capability>> {
//!         vec![Arc::new(AcceptsJson)]
//!     }
//!
//!     fn boot(&self, pending: &mut PendingRequest) -> Result<()> {
//!         pending.headers_mut().add("X-Tenant", self.0);
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::{PendingRequest, Result};

/// A behavior unit with an optional boot hook.
pub trait Capability: Send + Sync {
    /// Name used to boot each capability once.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Capabilities attached by this one.
    fn capabilities(&self) -> Vec<Arc<dyn Capability>> {
        Vec::new()
    }

    /// Called once with the request being built.
    ///
    /// # Errors
    ///
    /// Errors abort resolution unchanged.
    fn boot(&self, _pending: &mut PendingRequest) -> Result<()> {
        Ok(())
    }
}

/// Flattened capabilities of one connector/request pair, in boot order.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    connector: Vec<Arc<dyn Capability>>,
    request: Vec<Arc<dyn Capability>>,
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("connector", &self.connector.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("request", &self.request.iter().map(|c| c.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl CapabilityRegistry {
    /// Discovers the capabilities declared by both sides.
    #[must_use]
    pub fn new(connector: &[Arc<dyn Capability>], request: &[Arc<dyn Capability>]) -> Self {
        Self {
            connector: discover(connector),
            request: discover(request),
        }
    }

    /// Names in boot order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.connector
            .iter()
            .chain(&self.request)
            .map(|capability| capability.name())
            .collect()
    }

    /// Boots connector capabilities, then request capabilities.
    ///
    /// # Errors
    ///
    /// Stops at the first failing boot hook and returns its error.
    pub fn boot(&self, pending: &mut PendingRequest) -> Result<()> {
        for capability in self.connector.iter().chain(&self.request) {
            tracing::trace!(capability = capability.name(), "booting capability");
            capability.boot(pending)?;
        }
        Ok(())
    }
}

/// Depth-first pre-order walk, skipping names already seen.
#[must_use]
pub fn discover(declared: &[Arc<dyn Capability>]) -> Vec<Arc<dyn Capability>> {
    fn walk(
        capabilities: &[Arc<dyn Capability>],
        seen: &mut HashSet<String>,
        out: &mut Vec<Arc<dyn Capability>>,
    ) {
        for capability in capabilities {
            if !seen.insert(capability.name().to_string()) {
                continue;
            }
            out.push(Arc::clone(capability));
            walk(&capability.capabilities(), seen, out);
        }
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    walk(declared, &mut seen, &mut out);
    out
}

// ============================================================================
// Ready-made capabilities
// ============================================================================

/// Sends `Accept: application/json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptsJson;

impl Capability for AcceptsJson {
    fn name(&self) -> &str {
        "accepts_json"
    }

    fn boot(&self, pending: &mut PendingRequest) -> Result<()> {
        pending.headers_mut().add("Accept", "application/json");
        Ok(())
    }
}

/// Overrides the default `User-Agent`.
#[derive(Debug, Clone)]
pub struct UserAgent(pub String);

impl UserAgent {
    /// Creates the capability.
    #[must_use]
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self(user_agent.into())
    }
}

impl Capability for UserAgent {
    fn name(&self) -> &str {
        "user_agent"
    }

    fn boot(&self, pending: &mut PendingRequest) -> Result<()> {
        pending.headers_mut().add("User-Agent", self.0.clone());
        Ok(())
    }
}

/// Writes `timeout` and `connect_timeout` (seconds) into the request config.
#[derive(Debug, Clone, Copy)]
pub struct HasTimeout {
    /// Whole request timeout.
    pub request: Duration,
    /// Connection timeout.
    pub connect: Duration,
}

impl Default for HasTimeout {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(30),
            connect: Duration::from_secs(10),
        }
    }
}

impl Capability for HasTimeout {
    fn name(&self) -> &str {
        "has_timeout"
    }

    fn boot(&self, pending: &mut PendingRequest) -> Result<()> {
        pending
            .config_mut()
            .add("timeout", Value::from(self.request.as_secs_f64()))
            .add("connect_timeout", Value::from(self.connect.as_secs_f64()));
        Ok(())
    }
}

/// Turns every 4xx/5xx response into [`crate::Error::Request`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysThrowOnErrors;

impl Capability for AlwaysThrowOnErrors {
    fn name(&self) -> &str {
        "always_throw_on_errors"
    }

    fn boot(&self, pending: &mut PendingRequest) -> Result<()> {
        pending
            .middleware_mut()
            .on_response_named("always_throw_on_errors", |response| {
                if response.failed() {
                    return Err(response.to_error());
                }
                Ok(None)
            });
        Ok(())
    }
}

/// JSON API defaults: attaches [`AcceptsJson`] and [`AlwaysThrowOnErrors`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonApi;

impl Capability for JsonApi {
    fn name(&self) -> &str {
        "json_api"
    }

    fn capabilities(&self) -> Vec<Arc<dyn Capability>> {
        vec![Arc::new(AcceptsJson), Arc::new(AlwaysThrowOnErrors)]
    }
}
