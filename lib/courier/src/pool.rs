//! Pooled dispatch.
//!
//! A [`Pool`] resolves and sends requests from a source, keeping at most
//! `concurrency` sends in flight. Callbacks fire in completion order, each
//! exactly once per item, and a failing item never affects its siblings.
//!
//! # Example
//!
//! ```no_run
//! use courier::prelude::*;
//!
//! # struct Api;
//! # impl Connector for Api {
//! #     fn resolve_base_url(&self) -> String { "https://api.example.com".into() }
//! # }
//! struct GetUser(u32);
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
//! # async fn run() {
//! let summary = Api
//!     .pool((1..=100).map(GetUser))
//!     .concurrency(8)
//!     .on_response(|response, index| println!("#{index}: {}", response.status()))
//!     .on_error(|error, index| eprintln!("#{index}: {error}"))
//!     .send()
//!     .await;
//! assert_eq!(summary.total(), 100);
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;

use crate::dispatch::dispatch;
use crate::pending::ResolveOptions;
use crate::{Connector, Error, PendingRequest, Request, Response, Result};

/// How many sends a pool keeps in flight.
#[derive(Clone)]
pub enum Concurrency {
    /// A fixed limit.
    Fixed(usize),
    /// Computed before each refill from the number of sends currently in flight.
    Dynamic(Arc<dyn Fn(usize) -> usize + Send + Sync>),
}

impl Concurrency {
    /// Limit for the given number of in-flight sends, never below one.
    #[must_use]
    pub fn limit(&self, in_flight: usize) -> usize {
        match self {
            Self::Fixed(limit) => (*limit).max(1),
            Self::Dynamic(compute) => compute(in_flight).max(1),
        }
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Self::Fixed(5)
    }
}

impl From<usize> for Concurrency {
    fn from(limit: usize) -> Self {
        Self::Fixed(limit)
    }
}

impl fmt::Debug for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(limit) => f.debug_tuple("Fixed").field(limit).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Outcome counts of a pooled dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    /// Items that produced a response.
    pub succeeded: usize,
    /// Items that failed to resolve or send.
    pub failed: usize,
}

impl PoolSummary {
    /// Number of settled items.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

type ResponseCallback<'a> = Box<dyn FnMut(Response, usize) + Send + 'a>;
type ErrorCallback<'a> = Box<dyn FnMut(Error, usize) + Send + 'a>;

/// Bounded-concurrency batch dispatch, built by [`crate::ConnectorExt::pool`].
#[must_use = "a pool does nothing until `send` is awaited"]
pub struct Pool<'a, C: ?Sized, I> {
    connector: &'a C,
    requests: I,
    concurrency: Concurrency,
    on_response: Option<ResponseCallback<'a>>,
    on_error: Option<ErrorCallback<'a>>,
}

impl<C: ?Sized, I> fmt::Debug for Pool<'_, C, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("concurrency", &self.concurrency)
            .field("on_response", &self.on_response.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a, C, I> Pool<'a, C, I>
where
    C: Connector + ?Sized,
    I: IntoIterator,
    I::Item: Request,
{
    /// Creates a pool over `requests` with the default concurrency.
    pub fn new(connector: &'a C, requests: I) -> Self {
        Self {
            connector,
            requests,
            concurrency: Concurrency::default(),
            on_response: None,
            on_error: None,
        }
    }

    /// Sets the concurrency limit.
    pub fn concurrency(mut self, concurrency: impl Into<Concurrency>) -> Self {
        self.concurrency = concurrency.into();
        self
    }

    /// Computes the limit from the number of sends in flight.
    pub fn dynamic_concurrency<F>(mut self, compute: F) -> Self
    where
        F: Fn(usize) -> usize + Send + Sync + 'static,
    {
        self.concurrency = Concurrency::Dynamic(Arc::new(compute));
        self
    }

    /// Called with each response and the item's index in the source.
    pub fn on_response<F>(mut self, callback: F) -> Self
    where
        F: FnMut(Response, usize) + Send + 'a,
    {
        self.on_response = Some(Box::new(callback));
        self
    }

    /// Called with each failure and the item's index in the source.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: FnMut(Error, usize) + Send + 'a,
    {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Sends every item and settles once all callbacks have fired.
    ///
    /// Items are resolved lazily as slots free up; a resolution error settles
    /// that item right away through the error callback.
    pub async fn send(self) -> PoolSummary {
        let Self {
            connector,
            requests,
            concurrency,
            mut on_response,
            mut on_error,
        } = self;

        let mut summary = PoolSummary::default();
        let mut settle = |index: usize, result: Result<Response>| match result {
            Ok(response) => {
                summary.succeeded += 1;
                if let Some(callback) = on_response.as_mut() {
                    callback(response, index);
                }
            }
            Err(error) => {
                summary.failed += 1;
                tracing::debug!(index, error = %error, "pooled request failed");
                if let Some(callback) = on_error.as_mut() {
                    callback(error, index);
                }
            }
        };

        let mut source = requests.into_iter().enumerate();
        let mut in_flight = FuturesUnordered::new();
        let mut exhausted = false;

        loop {
            while !exhausted && in_flight.len() < concurrency.limit(in_flight.len()) {
                let Some((index, request)) = source.next() else {
                    exhausted = true;
                    break;
                };
                match PendingRequest::resolve(connector, &request, ResolveOptions::asynchronous())
                {
                    Ok(resolved) => {
                        tracing::trace!(index, "pooled request dispatched");
                        in_flight.push(async move { (index, dispatch(resolved).await) });
                    }
                    Err(error) => settle(index, Err(error)),
                }
            }

            match in_flight.next().await {
                Some((index, result)) => settle(index, result),
                None if exhausted => break,
                None => {}
            }
        }

        drop(settle);
        tracing::debug!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "pool settled"
        );
        summary
    }
}
