//! Shared fixtures: a configurable connector and request, and a stub transport.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use courier::{
    Authenticator, Body, Capability, ConfigStore, Connector, Delay, Error, GlobalConfig, Headers,
    HttpRequest, HttpResponse, Method, MiddlewarePipeline, MockClient, PendingRequest, Query,
    Request, Result, Transport, TransportFuture,
};

// ============================================================================
// Stub transport
// ============================================================================

#[derive(Default)]
struct StubState {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    sent: Mutex<Vec<HttpRequest>>,
}

/// Transport answering every call with the same status and body.
///
/// Paths listed in `failing_paths` fail with a connection error.
#[derive(Clone)]
pub struct StubTransport {
    state: Arc<StubState>,
    status: u16,
    body: &'static str,
    latency: Duration,
    failing_paths: Vec<String>,
}

impl StubTransport {
    pub fn new(status: u16, body: &'static str) -> Self {
        Self {
            state: Arc::default(),
            status,
            body,
            latency: Duration::ZERO,
            failing_paths: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200, "{}")
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn failing_on(mut self, path: impl Into<String>) -> Self {
        self.failing_paths.push(path.into());
        self
    }

    pub fn shared(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<HttpRequest> {
        self.state
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Transport for StubTransport {
    fn send(&self, request: HttpRequest) -> TransportFuture {
        let state = Arc::clone(&self.state);
        let status = self.status;
        let body = self.body;
        let latency = self.latency;
        let fails = self
            .failing_paths
            .iter()
            .any(|path| request.url().path() == path);

        Box::pin(async move {
            state.calls.fetch_add(1, Ordering::SeqCst);
            let current = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            state.max_in_flight.fetch_max(current, Ordering::SeqCst);
            state
                .sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request);

            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            state.in_flight.fetch_sub(1, Ordering::SeqCst);

            if fails {
                return Err(Error::connection("connection reset by peer"));
            }
            Ok(HttpResponse::new(status, HashMap::new(), body))
        })
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Connector whose every default is a public field.
pub struct Api {
    pub base_url: String,
    pub headers: Headers,
    pub query: Query,
    pub config: ConfigStore,
    pub body: Option<Body>,
    pub delay: Delay,
    pub middleware: MiddlewarePipeline,
    pub capabilities: Vec<Arc<dyn Capability>>,
    pub authenticator: Option<Arc<dyn Authenticator>>,
    pub mock_client: Option<MockClient>,
    pub transport: Arc<dyn Transport>,
    pub global: Arc<GlobalConfig>,
}

impl Api {
    pub fn new(base_url: impl Into<String>, transport: &StubTransport) -> Self {
        Self::with_transport(base_url, transport.shared())
    }

    pub fn with_transport(base_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: Headers::new(),
            query: Query::new(),
            config: ConfigStore::new(),
            body: None,
            delay: Delay::none(),
            middleware: MiddlewarePipeline::new(),
            capabilities: Vec::new(),
            authenticator: None,
            mock_client: None,
            transport,
            global: GlobalConfig::shared(),
        }
    }
}

impl Connector for Api {
    fn resolve_base_url(&self) -> String {
        self.base_url.clone()
    }

    fn headers(&self) -> Headers {
        self.headers.clone()
    }

    fn query(&self) -> Query {
        self.query.clone()
    }

    fn config(&self) -> ConfigStore {
        self.config.clone()
    }

    fn middleware(&self) -> MiddlewarePipeline {
        self.middleware.clone()
    }

    fn body(&self) -> Option<Body> {
        self.body.clone()
    }

    fn delay(&self) -> Delay {
        self.delay
    }

    fn authenticator(&self) -> Option<Arc<dyn Authenticator>> {
        self.authenticator.clone()
    }

    fn mock_client(&self) -> Option<MockClient> {
        self.mock_client.clone()
    }

    fn capabilities(&self) -> Vec<Arc<dyn Capability>> {
        self.capabilities.clone()
    }

    fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    fn global_config(&self) -> Arc<GlobalConfig> {
        Arc::clone(&self.global)
    }
}

// ============================================================================
// Request
// ============================================================================

type BootHook = Arc<dyn Fn(&mut PendingRequest) -> Result<()> + Send + Sync>;

/// Request whose every override is a public field.
#[derive(Clone)]
pub struct Call {
    pub method: Method,
    pub endpoint: String,
    pub headers: Headers,
    pub query: Query,
    pub config: ConfigStore,
    pub body: Option<Body>,
    pub delay: Delay,
    pub middleware: MiddlewarePipeline,
    pub capabilities: Vec<Arc<dyn Capability>>,
    pub authenticator: Option<Arc<dyn Authenticator>>,
    pub mock_client: Option<MockClient>,
    pub boot: Option<BootHook>,
}

impl Call {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            headers: Headers::new(),
            query: Query::new(),
            config: ConfigStore::new(),
            body: None,
            delay: Delay::none(),
            middleware: MiddlewarePipeline::new(),
            capabilities: Vec::new(),
            authenticator: None,
            mock_client: None,
            boot: None,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Post, endpoint)
    }
}

impl Request for Call {
    fn method(&self) -> Method {
        self.method
    }

    fn resolve_endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn headers(&self) -> Headers {
        self.headers.clone()
    }

    fn query(&self) -> Query {
        self.query.clone()
    }

    fn config(&self) -> ConfigStore {
        self.config.clone()
    }

    fn middleware(&self) -> MiddlewarePipeline {
        self.middleware.clone()
    }

    fn body(&self) -> Option<Body> {
        self.body.clone()
    }

    fn delay(&self) -> Delay {
        self.delay
    }

    fn authenticator(&self) -> Option<Arc<dyn Authenticator>> {
        self.authenticator.clone()
    }

    fn mock_client(&self) -> Option<MockClient> {
        self.mock_client.clone()
    }

    fn capabilities(&self) -> Vec<Arc<dyn Capability>> {
        self.capabilities.clone()
    }

    fn boot(&self, pending: &mut PendingRequest) -> Result<()> {
        match &self.boot {
            Some(hook) => hook(pending),
            None => Ok(()),
        }
    }
}
