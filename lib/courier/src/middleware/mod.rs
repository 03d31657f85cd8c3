//! Two-phase middleware pipeline.
//!
//! Request-phase handlers run against the [`PendingRequest`] before dispatch and
//! may mutate it or return a [`MockResponse`] to short-circuit the transport.
//! Response-phase handlers run against the [`Response`] and may mutate it or
//! return a replacement.
//!
//! Handlers run in registration order: capabilities, connector, request, then
//! global handlers. A request handler may register further handlers through
//! [`PendingRequest::middleware_mut`]; request pipes added that way run in the
//! same pass. Once user pipes are done, the resolution engine attaches its
//! built-in stages in a separate slot that always runs last, in a fixed order
//! user code cannot change:
//!
//! | phase    | built-in stages                                               |
//! |----------|---------------------------------------------------------------|
//! | request  | `authenticate` (if an authenticator is set), `determine_mock_response`, `debug_request` |
//! | response | `debug_response`                                              |
//!
//! # Example
//!
//! ```
//! use courier::MiddlewarePipeline;
//!
//! let mut pipeline = MiddlewarePipeline::new();
//! pipeline
//!     .on_request_named("trace_id", |pending| {
//!         pending.headers_mut().add("X-Trace-Id", "abc");
//!         Ok(None)
//!     })
//!     .on_response(|response| {
//!         response.headers_mut().remove("set-cookie");
//!         Ok(None)
//!     });
//!
//! // Registering a name twice is a no-op.
//! pipeline.on_request_named("trace_id", |_| Ok(None));
//! assert_eq!(pipeline.request_pipe_names(), ["trace_id"]);
//! ```

mod debug;

use std::fmt;
use std::sync::Arc;

use crate::{Error, MockResponse, PendingRequest, Response, Result};

/// Name of the built-in authentication stage.
pub const AUTHENTICATE: &str = "authenticate";
/// Name of the built-in mock resolution stage.
pub const DETERMINE_MOCK_RESPONSE: &str = "determine_mock_response";
/// Name of the built-in outgoing request debug stage.
pub const DEBUG_REQUEST: &str = "debug_request";
/// Name of the built-in incoming response debug stage.
pub const DEBUG_RESPONSE: &str = "debug_response";

const ANONYMOUS: &str = "<anonymous>";

/// Request-phase handler.
pub type RequestHandler =
    Arc<dyn Fn(&mut PendingRequest) -> Result<Option<MockResponse>> + Send + Sync>;

/// Response-phase handler.
pub type ResponseHandler = Arc<dyn Fn(&mut Response) -> Result<Option<Response>> + Send + Sync>;

/// Observer of the final outgoing request.
pub type RequestHook = Arc<dyn Fn(&PendingRequest) + Send + Sync>;

/// Observer of the final incoming response.
pub type ResponseHook = Arc<dyn Fn(&Response) + Send + Sync>;

/// A registered handler.
#[derive(Clone)]
pub struct Pipe<H> {
    name: Option<String>,
    handler: H,
    always: bool,
}

impl<H> Pipe<H> {
    /// Names the pipe; a named pipe is registered at most once.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Runs the pipe even if its name was disabled.
    #[must_use]
    pub const fn always(mut self) -> Self {
        self.always = true;
        self
    }

    /// Pipe name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns `true` if the pipe ignores [`MiddlewarePipeline::disable`].
    #[must_use]
    pub const fn is_always(&self) -> bool {
        self.always
    }
}

impl Pipe<RequestHandler> {
    /// Anonymous request-phase pipe.
    pub fn request<F>(handler: F) -> Self
    where
        F: Fn(&mut PendingRequest) -> Result<Option<MockResponse>> + Send + Sync + 'static,
    {
        Self {
            name: None,
            handler: Arc::new(handler),
            always: false,
        }
    }
}

impl Pipe<ResponseHandler> {
    /// Anonymous response-phase pipe.
    pub fn response<F>(handler: F) -> Self
    where
        F: Fn(&mut Response) -> Result<Option<Response>> + Send + Sync + 'static,
    {
        Self {
            name: None,
            handler: Arc::new(handler),
            always: false,
        }
    }
}

/// Ordered request-phase and response-phase handlers.
#[derive(Clone, Default)]
pub struct MiddlewarePipeline {
    request: Vec<Pipe<RequestHandler>>,
    response: Vec<Pipe<ResponseHandler>>,
    builtin_request: Vec<Pipe<RequestHandler>>,
    builtin_response: Vec<Pipe<ResponseHandler>>,
    disabled: Vec<String>,
    request_hooks: Vec<RequestHook>,
    response_hooks: Vec<ResponseHook>,
}

impl fmt::Debug for MiddlewarePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewarePipeline")
            .field("request", &self.request_pipe_names())
            .field("response", &self.response_pipe_names())
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

impl MiddlewarePipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an anonymous request-phase handler.
    pub fn on_request<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut PendingRequest) -> Result<Option<MockResponse>> + Send + Sync + 'static,
    {
        self.push_request(Pipe::request(handler))
    }

    /// Adds a named request-phase handler, unless one with that name exists.
    pub fn on_request_named<F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&mut PendingRequest) -> Result<Option<MockResponse>> + Send + Sync + 'static,
    {
        self.push_request(Pipe::request(handler).named(name))
    }

    /// Adds an anonymous response-phase handler.
    pub fn on_response<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut Response) -> Result<Option<Response>> + Send + Sync + 'static,
    {
        self.push_response(Pipe::response(handler))
    }

    /// Adds a named response-phase handler, unless one with that name exists.
    pub fn on_response_named<F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&mut Response) -> Result<Option<Response>> + Send + Sync + 'static,
    {
        self.push_response(Pipe::response(handler).named(name))
    }

    /// Adds a request-phase pipe.
    pub fn push_request(&mut self, pipe: Pipe<RequestHandler>) -> &mut Self {
        if !contains(&self.request, pipe.name()) {
            self.request.push(pipe);
        }
        self
    }

    /// Adds a response-phase pipe.
    pub fn push_response(&mut self, pipe: Pipe<ResponseHandler>) -> &mut Self {
        if !contains(&self.response, pipe.name()) {
            self.response.push(pipe);
        }
        self
    }

    /// Skips pipes with this name, except those flagged `always`.
    pub fn disable(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        if !self.disabled.contains(&name) {
            self.disabled.push(name);
        }
        self
    }

    /// Observes the final outgoing request, after every other request stage.
    pub fn debug_request<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&PendingRequest) + Send + Sync + 'static,
    {
        self.request_hooks.push(Arc::new(hook));
        self
    }

    /// Observes the incoming response, after every other response stage.
    pub fn debug_response<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&Response) + Send + Sync + 'static,
    {
        self.response_hooks.push(Arc::new(hook));
        self
    }

    /// Appends `other`'s pipes, disabled names and debug hooks.
    pub fn merge(&mut self, other: &Self) -> &mut Self {
        for pipe in &other.request {
            self.push_request(pipe.clone());
        }
        for pipe in &other.response {
            self.push_response(pipe.clone());
        }
        for name in &other.disabled {
            self.disable(name.clone());
        }
        self.request_hooks.extend(other.request_hooks.iter().cloned());
        self.response_hooks.extend(other.response_hooks.iter().cloned());
        self
    }

    /// Request-phase pipe names in execution order, built-in stages included.
    #[must_use]
    pub fn request_pipe_names(&self) -> Vec<&str> {
        names(self.request.iter().chain(&self.builtin_request))
    }

    /// Response-phase pipe names in execution order, built-in stages included.
    #[must_use]
    pub fn response_pipe_names(&self) -> Vec<&str> {
        names(self.response.iter().chain(&self.builtin_response))
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.request.is_empty()
            && self.response.is_empty()
            && self.builtin_request.is_empty()
            && self.builtin_response.is_empty()
            && self.request_hooks.is_empty()
            && self.response_hooks.is_empty()
    }

    /// Runs the request phase of `pending`'s own pipeline, then attaches and
    /// runs the built-in stages. A returned mock becomes the simulated response.
    ///
    /// Pipes are read back from `pending` after every handler, so a pipe
    /// registered by a running handler runs later in the same pass. Pipes
    /// registered by a built-in stage are too late to run.
    ///
    /// # Errors
    ///
    /// Stops at the first failing handler.
    pub(crate) fn execute_request(pending: &mut PendingRequest, authenticate: bool) -> Result<()> {
        let mut index = 0;
        while let Some(pipe) = pending.middleware().request.get(index).cloned() {
            index += 1;
            if pending.middleware().is_enabled(&pipe) {
                run_request_pipe(&pipe, pending)?;
            }
        }

        pending.middleware_mut().attach_builtins(authenticate);
        let builtins = pending.middleware().builtin_request.clone();
        for pipe in &builtins {
            run_request_pipe(pipe, pending)?;
        }
        Ok(())
    }

    /// Runs response-phase pipes, then the built-in response stages; a
    /// returned response replaces the current one.
    ///
    /// # Errors
    ///
    /// Stops at the first failing handler.
    pub fn execute_response(&self, mut response: Response) -> Result<Response> {
        let pipes = self.response.iter().chain(&self.builtin_response);
        for pipe in pipes.filter(|pipe| self.is_enabled(pipe)) {
            if let Some(replacement) = (pipe.handler)(&mut response)? {
                response = replacement;
            }
        }
        Ok(response)
    }

    /// Replaces the built-in slot with the fixed stages, capturing the debug
    /// hooks registered so far.
    pub(crate) fn attach_builtins(&mut self, authenticate: bool) -> &mut Self {
        self.builtin_request.clear();
        if authenticate {
            self.builtin_request
                .push(Pipe::request(authenticate_stage).named(AUTHENTICATE).always());
        }
        self.builtin_request.push(
            Pipe::request(determine_mock_response)
                .named(DETERMINE_MOCK_RESPONSE)
                .always(),
        );
        self.builtin_request.push(
            debug::request_stage(self.request_hooks.clone())
                .named(DEBUG_REQUEST)
                .always(),
        );
        self.builtin_response = vec![
            debug::response_stage(self.response_hooks.clone())
                .named(DEBUG_RESPONSE)
                .always(),
        ];
        self
    }

    fn is_enabled<H>(&self, pipe: &Pipe<H>) -> bool {
        pipe.always
            || pipe
                .name()
                .is_none_or(|name| !self.disabled.iter().any(|disabled| disabled == name))
    }
}

fn contains<H>(pipes: &[Pipe<H>], name: Option<&str>) -> bool {
    name.is_some_and(|name| pipes.iter().any(|pipe| pipe.name() == Some(name)))
}

fn names<'a, H: 'a>(pipes: impl Iterator<Item = &'a Pipe<H>>) -> Vec<&'a str> {
    pipes.map(|pipe| pipe.name().unwrap_or(ANONYMOUS)).collect()
}

fn run_request_pipe(pipe: &Pipe<RequestHandler>, pending: &mut PendingRequest) -> Result<()> {
    if let Some(simulated) = (pipe.handler)(pending)? {
        tracing::trace!(pipe = pipe.name().unwrap_or(ANONYMOUS), "simulated response attached");
        pending.set_simulated_response(simulated);
    }
    Ok(())
}

fn authenticate_stage(pending: &mut PendingRequest) -> Result<Option<MockResponse>> {
    if let Some(authenticator) = pending.authenticator().cloned() {
        authenticator.set(pending)?;
    }
    Ok(None)
}

fn determine_mock_response(pending: &mut PendingRequest) -> Result<Option<MockResponse>> {
    if pending.has_simulated_response() {
        return Ok(None);
    }
    let Some(mock_client) = pending.mock_client() else {
        return Ok(None);
    };
    match mock_client.find_response(pending) {
        Some(response) => Ok(Some(response)),
        None => Err(Error::NoMockResponse {
            method: pending.method(),
            url: pending.url(),
        }),
    }
}
