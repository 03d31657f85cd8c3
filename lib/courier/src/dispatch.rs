//! Dispatcher: sends resolved requests.
//!
//! Resolution is synchronous and happens before any future is created:
//! [`ConnectorExt::send`] returns configuration and boot errors directly, even
//! for asynchronous sends. Only transport failures and response middleware
//! errors travel through the returned future.

use std::time::Instant;

use tracing::{Instrument, Level, info, span, warn};

use crate::mock::RecordedRequest;
use crate::pending::ResolveOptions;
use crate::{
    Connector, Error, MockClient, PendingRequest, Pool, Request, ResolvedRequest, Response,
    Result,
};

/// Sends a resolved request.
///
/// A simulated response is converted directly and the transport is never
/// called. Otherwise the delay is honored, the standard message is built and
/// handed to the transport. Either way the response-phase pipeline runs last.
///
/// # Errors
///
/// - [`Error::Transport`] wrapping the transport failure (or simulated failure),
/// - errors from message construction or response middleware.
pub async fn dispatch(request: ResolvedRequest) -> Result<Response> {
    let method = request.method();
    let url = request.uri()?.to_string();
    let span = span!(Level::INFO, "http_request", %method, %url);

    async move {
        let start = Instant::now();
        let message = request.create_http_request()?;
        let recorded_headers = message.headers().to_vec();
        let recorded_body = message.body().cloned();

        let simulated = request.simulated_response().cloned();
        let is_simulated = simulated.is_some();
        let result = match simulated {
            Some(mock) => mock.into_http_response(),
            None => {
                if let Some(delay) = request.delay().duration() {
                    tokio::time::sleep(delay).await;
                }
                request.transport().send(message).await
            }
        };

        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        if let Some(mock_client) = request.mock_client() {
            mock_client.record(RecordedRequest {
                name: request.request_name().to_string(),
                method,
                url: url.clone(),
                headers: recorded_headers,
                body: recorded_body,
                status: result.as_ref().ok().map(courier_core::HttpResponse::status),
            });
        }

        let raw = match result {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, elapsed_ms, simulated = is_simulated, "request failed");
                return Err(Error::transport(method, url, err));
            }
        };

        let status = raw.status();
        if raw.is_success() {
            info!(status, elapsed_ms, simulated = is_simulated, "request completed");
        } else {
            warn!(status, elapsed_ms, simulated = is_simulated, "request failed with HTTP error");
        }

        let pipeline = request.middleware().clone();
        pipeline.execute_response(Response::new(raw, request, is_simulated))
    }
    .instrument(span)
    .await
}

// ============================================================================
// Connector extension
// ============================================================================

/// Send operations available on every [`Connector`].
///
/// # Example
///
/// ```no_run
/// use courier::prelude::*;
///
/// struct Api;
///
/// impl Connector for Api {
///     fn resolve_base_url(&self) -> String {
///         "https://api.example.com".to_string()
///     }
/// }
///
/// struct Health;
///
/// impl Request for Health {
///     fn method(&self) -> Method {
///         Method::Get
///     }
///
///     fn resolve_endpoint(&self) -> String {
///         "/health".to_string()
///     }
/// }
///
/// # async fn run() -> courier::Result<()> {
/// let response = Api.send(&Health)?.await?;
/// assert!(response.is_success());
/// # Ok(())
/// # }
/// ```
pub trait ConnectorExt: Connector {
    /// Resolves `request` without sending it.
    ///
    /// # Errors
    ///
    /// Returns any resolution error.
    fn resolve<R>(
        &self,
        request: &R,
        mock_client: Option<MockClient>,
        asynchronous: bool,
    ) -> Result<ResolvedRequest>
    where
        R: Request + ?Sized,
    {
        PendingRequest::resolve(
            self,
            request,
            ResolveOptions {
                mock_client,
                asynchronous,
            },
        )
    }

    /// Resolves `request` now and returns a future sending it.
    ///
    /// # Errors
    ///
    /// Resolution errors are returned right away, before any future exists;
    /// the future only carries transport and response middleware errors.
    fn send<R>(
        &self,
        request: &R,
    ) -> Result<impl Future<Output = Result<Response>> + Send + 'static>
    where
        R: Request + ?Sized,
    {
        let resolved = self.resolve(request, None, true)?;
        Ok(dispatch(resolved))
    }

    /// Like [`ConnectorExt::send`] with an explicit mock client, taking
    /// precedence over the request's and the connector's.
    ///
    /// # Errors
    ///
    /// Returns resolution errors, including [`Error::NoMockResponse`].
    fn send_with_mock<R>(
        &self,
        request: &R,
        mock_client: MockClient,
    ) -> Result<impl Future<Output = Result<Response>> + Send + 'static>
    where
        R: Request + ?Sized,
    {
        let resolved = self.resolve(request, Some(mock_client), true)?;
        Ok(dispatch(resolved))
    }

    /// Resolves and sends `request`, blocking the calling thread.
    ///
    /// Drives the send on a private current-thread runtime; do not call from
    /// within an async context.
    ///
    /// # Errors
    ///
    /// Returns resolution, transport and response middleware errors.
    fn send_blocking<R>(&self, request: &R) -> Result<Response>
    where
        R: Request + ?Sized,
    {
        let resolved = self.resolve(request, None, false)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| Error::connection(format!("failed to start runtime: {err}")))?;
        runtime.block_on(dispatch(resolved))
    }

    /// Pooled dispatch of `requests`, see [`Pool`].
    fn pool<I>(&self, requests: I) -> Pool<'_, Self, I>
    where
        I: IntoIterator,
        I::Item: Request,
    {
        Pool::new(self, requests)
    }
}

impl<C: Connector + ?Sized> ConnectorExt for C {}
