//! Authenticators.
//!
//! The resolved authenticator (request first, then connector) is applied by the
//! built-in `authenticate` stage of the request pipeline, before mock
//! resolution. It can be re-applied on a resolved request with
//! [`crate::ResolvedRequest::authenticate`].

use std::fmt;
use std::sync::Arc;

use base64::Engine;

use crate::{PendingRequest, Result};

/// Applies credentials to a request being built.
pub trait Authenticator: Send + Sync {
    /// Writes credentials (headers, query, ...) on the request.
    ///
    /// # Errors
    ///
    /// Errors abort resolution unchanged.
    fn set(&self, pending: &mut PendingRequest) -> Result<()>;
}

impl<F> Authenticator for F
where
    F: Fn(&mut PendingRequest) -> Result<()> + Send + Sync,
{
    fn set(&self, pending: &mut PendingRequest) -> Result<()> {
        self(pending)
    }
}

/// `Authorization: <prefix> <token>`.
#[derive(Clone)]
pub struct TokenAuthenticator {
    token: Arc<str>,
    prefix: Arc<str>,
}

impl fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("prefix", &self.prefix)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl TokenAuthenticator {
    /// Bearer token.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_prefix(token, "Bearer")
    }

    /// Token with a custom scheme, e.g. `Token` or `Bot`.
    pub fn with_prefix(token: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            token: Arc::from(token.into()),
            prefix: Arc::from(prefix.into()),
        }
    }
}

impl Authenticator for TokenAuthenticator {
    fn set(&self, pending: &mut PendingRequest) -> Result<()> {
        let value = if self.prefix.is_empty() {
            self.token.to_string()
        } else {
            format!("{} {}", self.prefix, self.token)
        };
        pending.headers_mut().add("Authorization", value);
        Ok(())
    }
}

/// `Authorization: Basic <base64(user:pass)>`.
#[derive(Clone)]
pub struct BasicAuthenticator {
    encoded_credentials: Arc<str>,
}

impl fmt::Debug for BasicAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthenticator")
            .field("credentials", &"[REDACTED]")
            .finish()
    }
}

impl BasicAuthenticator {
    /// Creates the authenticator from a username and password.
    pub fn new(username: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        let credentials = format!("{}:{}", username.as_ref(), password.as_ref());
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        Self {
            encoded_credentials: Arc::from(encoded),
        }
    }
}

impl Authenticator for BasicAuthenticator {
    fn set(&self, pending: &mut PendingRequest) -> Result<()> {
        pending
            .headers_mut()
            .add("Authorization", format!("Basic {}", self.encoded_credentials));
        Ok(())
    }
}

/// Credentials passed as a query parameter, e.g. `?api_key=...`.
#[derive(Debug, Clone)]
pub struct QueryAuthenticator {
    parameter: String,
    value: String,
}

impl QueryAuthenticator {
    /// Creates the authenticator.
    pub fn new(parameter: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            value: value.into(),
        }
    }
}

impl Authenticator for QueryAuthenticator {
    fn set(&self, pending: &mut PendingRequest) -> Result<()> {
        pending
            .query_mut()
            .add(self.parameter.clone(), self.value.clone());
        Ok(())
    }
}

/// Credentials passed in an arbitrary header, e.g. `X-Api-Key`.
#[derive(Debug, Clone)]
pub struct HeaderAuthenticator {
    header: String,
    value: String,
}

impl HeaderAuthenticator {
    /// Creates the authenticator.
    pub fn new(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            value: value.into(),
        }
    }
}

impl Authenticator for HeaderAuthenticator {
    fn set(&self, pending: &mut PendingRequest) -> Result<()> {
        pending
            .headers_mut()
            .add(self.header.clone(), self.value.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_credentials_are_encoded() {
        let auth = BasicAuthenticator::new("user", "pass");
        // "user:pass" in base64
        assert_eq!(&*auth.encoded_credentials, "dXNlcjpwYXNz");
    }

    #[test]
    fn debug_redacts_secrets() {
        let token = format!("{:?}", TokenAuthenticator::new("s3cret"));
        assert!(!token.contains("s3cret"));
        let basic = format!("{:?}", BasicAuthenticator::new("user", "pass"));
        assert!(!basic.contains("dXNlcjpwYXNz"));
    }
}
