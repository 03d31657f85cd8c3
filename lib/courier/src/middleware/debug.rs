//! Built-in debug stages.
//!
//! Both stages log through `tracing` at debug level, then hand the final
//! request/response to the user hooks registered with
//! [`super::MiddlewarePipeline::debug_request`] and
//! [`super::MiddlewarePipeline::debug_response`].

use tracing::debug;

use super::{Pipe, RequestHandler, RequestHook, ResponseHandler, ResponseHook};

pub(super) fn request_stage(hooks: Vec<RequestHook>) -> Pipe<RequestHandler> {
    Pipe::request(move |pending| {
        debug!(
            method = %pending.method(),
            url = %pending.url(),
            headers = ?pending.headers().all(),
            body = pending.body().map(|body| body.kind().as_str()),
            simulated = pending.has_simulated_response(),
            "outgoing request"
        );
        for hook in &hooks {
            hook(pending);
        }
        Ok(None)
    })
}

pub(super) fn response_stage(hooks: Vec<ResponseHook>) -> Pipe<ResponseHandler> {
    Pipe::response(move |response| {
        debug!(
            status = response.status(),
            headers = ?response.headers(),
            simulated = response.is_simulated(),
            "incoming response"
        );
        for hook in &hooks {
            hook(response);
        }
        Ok(None)
    })
}
