//! Request resolution.
//!
//! [`PendingRequest::resolve`] turns a connector and a request into a
//! [`ResolvedRequest`] following a fixed protocol:
//!
//! 1. URL and method,
//! 2. response type and hydrator (request, then connector),
//! 3. mock client (explicit argument, then request, then connector),
//! 4. authenticator (request, then connector),
//! 5. capability boot hooks (connector's, then request's),
//! 6. headers (default user agent < connector < request), query, config and
//!    middleware (connector, request, global),
//! 7. body,
//! 8. delay,
//! 9. connector and request boot hooks,
//! 10. request phase executed, then the built-in middleware stages,
//! 11. freeze.
//!
//! Any error aborts resolution before anything is sent.
//!
//! A [`ResolvedRequest`] only hands out shared access to its
//! [`PendingRequest`]; mutating it after resolution does not compile:
//!
//! ```compile_fail
//! use courier::ResolvedRequest;
//!
//! fn add_late_header(resolved: &mut ResolvedRequest) {
//!     resolved.headers_mut().add("X-Late", "1");
//! }
//! ```
//!
//! Re-authentication is the one exception, and produces a new value:
//! [`ResolvedRequest::authenticate`].

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use courier_core::{HttpRequest, Method, Transport};
use url::Url;

use crate::body::BodyKind;
use crate::capability::CapabilityRegistry;
use crate::{
    Authenticator, Body, ConfigStore, Connector, Delay, Error, Headers, Hydrator,
    MiddlewarePipeline, MockClient, MockResponse, Query, Request, ResponseType, Result,
};

/// Per-call resolution options.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Mock client taking precedence over the request's and connector's.
    pub mock_client: Option<MockClient>,
    /// Whether the request will be sent asynchronously.
    pub asynchronous: bool,
}

impl ResolveOptions {
    /// Options for an asynchronous send.
    #[must_use]
    pub fn asynchronous() -> Self {
        Self {
            mock_client: None,
            asynchronous: true,
        }
    }

    /// Sets the explicit mock client.
    #[must_use]
    pub fn with_mock_client(mut self, mock_client: MockClient) -> Self {
        self.mock_client = Some(mock_client);
        self
    }
}

/// A request being resolved.
///
/// Capability boot hooks, connector/request boot hooks, authenticators and
/// request-phase middleware receive `&mut PendingRequest`.
#[derive(Clone)]
pub struct PendingRequest {
    method: Method,
    base_url: String,
    endpoint: String,
    request_name: String,
    headers: Headers,
    query: Query,
    config: ConfigStore,
    body: Option<Body>,
    delay: Delay,
    middleware: MiddlewarePipeline,
    authenticator: Option<Arc<dyn Authenticator>>,
    mock_client: Option<MockClient>,
    simulated_response: Option<MockResponse>,
    response_type: ResponseType,
    hydrator: Option<Hydrator>,
    transport: Arc<dyn Transport>,
    asynchronous: bool,
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("method", &self.method)
            .field("url", &self.url())
            .field("request_name", &self.request_name)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("config", &self.config)
            .field("body", &self.body)
            .field("delay", &self.delay)
            .field("middleware", &self.middleware)
            .field("authenticated", &self.authenticator.is_some())
            .field("mock_client", &self.mock_client)
            .field("simulated_response", &self.simulated_response)
            .field("response_type", &self.response_type)
            .field("asynchronous", &self.asynchronous)
            .finish_non_exhaustive()
    }
}

impl PendingRequest {
    /// Resolves `request` against `connector`.
    ///
    /// # Errors
    ///
    /// - [`Error::BodyTypeMismatch`] when both sides declare different body kinds,
    /// - [`Error::NoMockResponse`] when a mock client has nothing for the request,
    /// - any error raised by a capability, boot hook, authenticator or middleware.
    pub fn resolve<C, R>(connector: &C, request: &R, options: ResolveOptions) -> Result<ResolvedRequest>
    where
        C: Connector + ?Sized,
        R: Request + ?Sized,
    {
        let global = connector.global_config();

        let mut headers = Headers::new();
        if let Some(user_agent) = global.user_agent() {
            headers.add("User-Agent", user_agent);
        }

        let mut pending = Self {
            method: request.method(),
            base_url: connector.resolve_base_url(),
            endpoint: request.resolve_endpoint(),
            request_name: request.name().to_string(),
            headers,
            query: Query::new(),
            config: ConfigStore::new(),
            body: None,
            delay: Delay::none(),
            middleware: MiddlewarePipeline::new(),
            response_type: request
                .response_type()
                .or_else(|| connector.response_type())
                .unwrap_or_default(),
            hydrator: request.hydrator().or_else(|| connector.hydrator()),
            mock_client: options
                .mock_client
                .or_else(|| request.mock_client())
                .or_else(|| connector.mock_client()),
            authenticator: request.authenticator().or_else(|| connector.authenticator()),
            simulated_response: None,
            transport: connector.transport(),
            asynchronous: options.asynchronous,
        };

        CapabilityRegistry::new(&connector.capabilities(), &request.capabilities())
            .boot(&mut pending)?;

        pending.headers.merge(&connector.headers()).merge(&request.headers());
        pending.query.merge(&connector.query()).merge(&request.query());
        pending.config.merge(&connector.config()).merge(&request.config());
        pending
            .middleware
            .merge(&connector.middleware())
            .merge(&request.middleware())
            .merge(global.middleware());

        let body = Body::merge(
            connector.body().as_ref(),
            request.body().as_ref(),
            global.stream_factory(),
        )?;
        if body.is_some() {
            pending.body = body;
        }

        pending.delay = Delay::merge(connector.delay(), request.delay());

        connector.boot(&mut pending)?;
        request.boot(&mut pending)?;

        let authenticate = pending.authenticator.is_some();
        MiddlewarePipeline::execute_request(&mut pending, authenticate)?;

        tracing::debug!(
            request = %pending.request_name,
            method = %pending.method,
            url = %pending.url(),
            simulated = pending.has_simulated_response(),
            "request resolved"
        );
        Ok(ResolvedRequest { inner: pending })
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Changes the HTTP method.
    pub fn set_method(&mut self, method: Method) -> &mut Self {
        self.method = method;
        self
    }

    /// Connector base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Changes the endpoint.
    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) -> &mut Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Base URL joined with the endpoint, without the merged query.
    #[must_use]
    pub fn url(&self) -> String {
        join_url(&self.base_url, &self.endpoint)
    }

    /// Final URL: the query already in the URL, then the merged query on top.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the joined URL does not parse.
    pub fn uri(&self) -> Result<Url> {
        let mut url = Url::parse(&self.url())?;
        let mut query: Query = url.query_pairs().into_owned().collect();
        query.merge(&self.query);

        url.set_query(None);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter());
        }
        Ok(url)
    }

    /// Name of the request being resolved.
    #[must_use]
    pub fn request_name(&self) -> &str {
        &self.request_name
    }

    /// Headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Query parameters.
    #[must_use]
    pub const fn query(&self) -> &Query {
        &self.query
    }

    /// Mutable query parameters.
    pub fn query_mut(&mut self) -> &mut Query {
        &mut self.query
    }

    /// Per-call config.
    #[must_use]
    pub const fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// Mutable per-call config.
    pub fn config_mut(&mut self) -> &mut ConfigStore {
        &mut self.config
    }

    /// Body.
    #[must_use]
    pub const fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Mutable body.
    pub fn body_mut(&mut self) -> Option<&mut Body> {
        self.body.as_mut()
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: Body) -> &mut Self {
        self.body = Some(body);
        self
    }

    /// Removes the body.
    pub fn clear_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    /// Delay before the transport is called.
    #[must_use]
    pub const fn delay(&self) -> Delay {
        self.delay
    }

    /// Changes the delay.
    pub fn set_delay(&mut self, delay: impl Into<Delay>) -> &mut Self {
        self.delay = delay.into();
        self
    }

    /// Middleware.
    #[must_use]
    pub const fn middleware(&self) -> &MiddlewarePipeline {
        &self.middleware
    }

    /// Mutable middleware.
    pub fn middleware_mut(&mut self) -> &mut MiddlewarePipeline {
        &mut self.middleware
    }

    /// Resolved authenticator.
    #[must_use]
    pub const fn authenticator(&self) -> Option<&Arc<dyn Authenticator>> {
        self.authenticator.as_ref()
    }

    /// Stores `authenticator` and applies it right away.
    ///
    /// # Errors
    ///
    /// Returns the authenticator's error.
    pub fn authenticate(&mut self, authenticator: Arc<dyn Authenticator>) -> Result<()> {
        authenticator.set(self)?;
        self.authenticator = Some(authenticator);
        Ok(())
    }

    /// Resolved mock client.
    #[must_use]
    pub const fn mock_client(&self) -> Option<&MockClient> {
        self.mock_client.as_ref()
    }

    /// Attaches a mock client; only effective before the mock stage runs.
    pub fn set_mock_client(&mut self, mock_client: MockClient) -> &mut Self {
        self.mock_client = Some(mock_client);
        self
    }

    /// Simulated response, if dispatch is short-circuited.
    #[must_use]
    pub const fn simulated_response(&self) -> Option<&MockResponse> {
        self.simulated_response.as_ref()
    }

    /// Returns `true` if dispatch is short-circuited.
    #[must_use]
    pub const fn has_simulated_response(&self) -> bool {
        self.simulated_response.is_some()
    }

    /// Short-circuits dispatch with `response`.
    pub fn set_simulated_response(&mut self, response: MockResponse) -> &mut Self {
        self.simulated_response = Some(response);
        self
    }

    /// Resolved response type.
    #[must_use]
    pub const fn response_type(&self) -> ResponseType {
        self.response_type
    }

    /// Resolved hydrator.
    #[must_use]
    pub const fn hydrator(&self) -> Option<&Hydrator> {
        self.hydrator.as_ref()
    }

    /// Transport used for real sends.
    #[must_use]
    pub const fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Returns `true` if the request is sent asynchronously.
    #[must_use]
    pub const fn is_asynchronous(&self) -> bool {
        self.asynchronous
    }

    /// Per-message timeout, from the `timeout` config key (seconds).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the value is not a non-negative number.
    pub fn timeout(&self) -> Result<Option<Duration>> {
        let Some(value) = self.config.get("timeout") else {
            return Ok(None);
        };
        let seconds = value.as_f64().ok_or_else(|| {
            Error::invalid_request(format!(
                "config `timeout` must be a number of seconds, got `{value}`"
            ))
        })?;
        Duration::try_from_secs_f64(seconds)
            .map(Some)
            .map_err(|err| Error::invalid_request(format!("config `timeout`: {err}")))
    }

    /// Builds the outgoing message: headers in merge order, body materialized.
    ///
    /// The body kind's content type is used unless a `Content-Type` header was
    /// set; multipart bodies always set theirs, it carries the boundary.
    ///
    /// # Errors
    ///
    /// Fails on an invalid URL, body serialization error or invalid timeout.
    pub fn create_http_request(&self) -> Result<HttpRequest> {
        let mut builder = HttpRequest::builder(self.method, self.uri()?).headers(
            self.headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone())),
        );

        if let Some(body) = &self.body {
            let (content_type, payload) = body.materialize()?;
            if body.kind() == BodyKind::Multipart
                || self.headers.get_ignore_case("Content-Type").is_none()
            {
                builder = builder.header("Content-Type", content_type);
            }
            builder = builder.body(payload);
        }

        if let Some(timeout) = self.timeout()? {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build())
    }
}

/// A fully resolved, immutable request.
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    inner: PendingRequest,
}

impl ResolvedRequest {
    /// Re-applies authentication, returning a new resolved request.
    ///
    /// # Errors
    ///
    /// Returns the authenticator's error.
    pub fn authenticate(self, authenticator: Arc<dyn Authenticator>) -> Result<Self> {
        let mut inner = self.inner;
        inner.authenticate(authenticator)?;
        Ok(Self { inner })
    }

    /// Shared access to the resolved state.
    #[must_use]
    pub const fn as_pending(&self) -> &PendingRequest {
        &self.inner
    }
}

impl Deref for ResolvedRequest {
    type Target = PendingRequest;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

fn join_url(base: &str, endpoint: &str) -> String {
    if endpoint.is_empty() {
        return base.to_string();
    }
    if endpoint.contains("://") {
        return endpoint.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}
