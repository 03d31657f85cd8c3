//! HTTP transport using hyper-util.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use courier_core::{HttpRequest, HttpResponse, Transport, TransportFuture};
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tower::{Layer, ServiceExt};
use tower::util::BoxCloneService;
use tower_service::Service;

use crate::config::{ClientConfig, ClientConfigBuilder};
use crate::{Error, Result};

// ============================================================================
// Layered service
// ============================================================================

/// A transport service with its tower layers applied.
pub type BoxedService = BoxCloneService<HttpRequest, HttpResponse, Error>;

/// Future returned by [`BoxedService`] calls.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + 'static>>;

/// `BoxCloneService` is not `Sync`; calls clone it out of the mutex.
#[derive(Clone)]
struct SharedService {
    inner: Arc<Mutex<BoxedService>>,
}

impl SharedService {
    fn new(service: BoxedService) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    fn call(&self, request: HttpRequest) -> ServiceFuture {
        let service = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        Box::pin(service.oneshot(request))
    }
}

/// Create an HTTPS connector with rustls and Mozilla root certificates.
#[must_use]
pub fn https_connector(connect_timeout: Duration) -> HttpsConnector<HttpConnector> {
    let root_store: rustls::RootCertStore =
        webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();

    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(connect_timeout));

    HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http)
}

// ============================================================================
// hyper service
// ============================================================================

#[derive(Clone)]
struct HyperService {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    config: ClientConfig,
}

impl HyperService {
    fn new(config: ClientConfig) -> Self {
        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .build(https_connector(config.connect_timeout));

        Self { inner, config }
    }

    fn to_hyper_request(request: HttpRequest) -> Result<http::Request<Full<Bytes>>> {
        let (method, url, headers, body) = request.into_parts();
        let builder = headers.iter().fold(
            http::Request::builder()
                .method(http::Method::from(method))
                .uri(url.as_str()),
            |builder, (name, value)| builder.header(name.as_str(), value.as_str()),
        );
        builder
            .body(body.map_or_else(Full::default, Full::new))
            .map_err(|err| Error::invalid_request(err.to_string()))
    }

    fn response_headers(headers: &http::HeaderMap) -> HashMap<String, String> {
        headers
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some((name.to_string(), value.to_string()))
            })
            .collect()
    }

    /// Sends one message; the timeout covers the whole exchange, body included.
    async fn send_message(&self, request: HttpRequest) -> Result<HttpResponse> {
        let timeout = request.timeout().unwrap_or(self.config.timeout);
        tracing::trace!(url = %request.url(), timeout_ms = timeout.as_millis(), "sending message");
        let hyper_request = Self::to_hyper_request(request)?;

        let exchange = async {
            let response = self
                .inner
                .request(hyper_request)
                .await
                .map_err(Self::classify_error)?;
            let status = response.status().as_u16();
            let headers = Self::response_headers(response.headers());
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|err| Error::connection(err.to_string()))?
                .to_bytes();
            Ok(HttpResponse::new(status, headers, body))
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| Error::Timeout)?
    }

    #[allow(clippy::needless_pass_by_value)]
    fn classify_error(err: hyper_util::client::legacy::Error) -> Error {
        let message = err.to_string();
        let lowered = message.to_ascii_lowercase();
        let is_tls = ["ssl", "tls", "certificate"]
            .iter()
            .any(|needle| lowered.contains(needle));
        if is_tls && !err.is_connect() {
            Error::tls(message)
        } else {
            Error::connection(message)
        }
    }
}

impl Service<HttpRequest> for HyperService {
    type Response = HttpResponse;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: HttpRequest) -> Self::Future {
        let client = self.clone();
        Box::pin(async move { client.send_message(request).await })
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Default [`Transport`]: pooled hyper-util client over rustls, wrapped in tower layers.
///
/// A per-message timeout (the `timeout` config key) overrides
/// [`ClientConfig::timeout`].
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use courier::HyperClient;
///
/// let client = HyperClient::builder()
///     .timeout(Duration::from_secs(10))
///     .pool_idle_per_host(8)
///     .build();
/// ```
#[derive(Clone)]
pub struct HyperClient {
    service: SharedService,
    config: ClientConfig,
}

impl std::fmt::Debug for HyperClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HyperClient {
    /// Client with the default [`ClientConfig`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Client without layers.
    #[must_use]
    pub fn with_config(config: ClientConfig) -> Self {
        let service = BoxCloneService::new(HyperService::new(config.clone()));
        Self::with_service(service, config)
    }

    fn with_service(service: BoxedService, config: ClientConfig) -> Self {
        Self {
            service: SharedService::new(service),
            config,
        }
    }

    /// Starts a builder.
    #[must_use]
    pub fn builder() -> HyperClientBuilder {
        HyperClientBuilder::default()
    }

    /// Transport configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Default for HyperClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HyperClient {
    fn send(&self, request: HttpRequest) -> TransportFuture {
        self.service.call(request)
    }
}

impl Service<HttpRequest> for HyperClient {
    type Response = HttpResponse;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: HttpRequest) -> Self::Future {
        self.service.call(request)
    }
}

/// Transport shared by connectors that do not provide their own.
///
/// Created lazily with the default [`ClientConfig`].
#[must_use]
pub fn default_transport() -> Arc<dyn Transport> {
    static DEFAULT: OnceLock<Arc<HyperClient>> = OnceLock::new();
    let client = DEFAULT.get_or_init(|| Arc::new(HyperClient::new()));
    Arc::clone(client) as Arc<dyn Transport>
}

/// Builder for [`HyperClient`].
///
/// # Example
///
/// ```no_run
/// use courier::HyperClient;
/// use tower::limit::ConcurrencyLimitLayer;
///
/// let client = HyperClient::builder()
///     .layer(ConcurrencyLimitLayer::new(16))
///     .build();
/// ```
#[derive(Default)]
pub struct HyperClientBuilder {
    config: ClientConfigBuilder,
    layers: Vec<Box<dyn FnOnce(BoxedService) -> BoxedService + Send + Sync>>,
}

impl std::fmt::Debug for HyperClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperClientBuilder")
            .field("config", &self.config)
            .field("layers", &self.layers.len())
            .finish()
    }
}

impl HyperClientBuilder {
    /// Set the default request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.timeout(timeout);
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.connect_timeout(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.config = self.config.pool_idle_per_host(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.pool_idle_timeout(timeout);
        self
    }

    /// Wraps the transport in a tower layer (retries, rate limits, ...).
    ///
    /// The first layer added is the innermost.
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service: Service<HttpRequest, Response = HttpResponse, Error = Error>
            + Clone
            + Send
            + 'static,
        <L::Service as Service<HttpRequest>>::Future: Send,
    {
        self.layers
            .push(Box::new(move |service| BoxCloneService::new(layer.layer(service))));
        self
    }

    /// Builds the client, applying layers innermost first.
    #[must_use]
    pub fn build(self) -> HyperClient {
        let config = self.config.build();
        let service: BoxedService = BoxCloneService::new(HyperService::new(config.clone()));
        let service = self.layers.into_iter().fold(service, |service, wrap| wrap(service));
        HyperClient::with_service(service, config)
    }
}
