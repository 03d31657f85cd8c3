//! Transport abstraction.
//!
//! A [`Transport`] takes a fully built [`HttpRequest`] and eventually produces an
//! [`HttpResponse`]. It is the only place where a send suspends; everything else
//! in courier (resolution, middleware, mocking) is synchronous.
//!
//! The trait is object-safe so connectors can hand out an `Arc<dyn Transport>`.
//! Blocking callers drive the same future on a local runtime.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::{HttpRequest, HttpResponse, Result};

/// Boxed future returned by [`Transport::send`].
pub type TransportFuture = Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + 'static>>;

/// Sends standard HTTP messages.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use courier_core::{HttpRequest, HttpResponse, Transport, TransportFuture};
///
/// struct Teapot;
///
/// impl Transport for Teapot {
///     fn send(&self, _request: HttpRequest) -> TransportFuture {
///         Box::pin(async { Ok(HttpResponse::new(418, HashMap::new(), "short and stout")) })
///     }
/// }
/// ```
pub trait Transport: Send + Sync {
    /// Send a request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails for any reason:
    /// - Network errors
    /// - TLS errors
    /// - Timeouts
    fn send(&self, request: HttpRequest) -> TransportFuture;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: HttpRequest) -> TransportFuture {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: HttpRequest) -> TransportFuture {
        (**self).send(request)
    }
}
