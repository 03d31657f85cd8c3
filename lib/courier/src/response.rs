//! Response returned by a dispatch.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use courier_core::HttpResponse;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{Error, ResolvedRequest, Result};

/// Maps a response to the JSON a data object is deserialized from.
pub type Hydrator = Arc<dyn Fn(&Response) -> Result<Value> + Send + Sync>;

/// Types a [`Response`] can be converted into with [`Response::into_typed`].
pub trait FromResponse: Sized + 'static {
    /// Builds `Self` from a raw response.
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn from_response(response: Response) -> Result<Self>;
}

/// The response type a connector or request resolves to.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ResponseType {
    id: TypeId,
    name: &'static str,
}

impl ResponseType {
    /// Response type `R`.
    #[must_use]
    pub fn of<R: FromResponse>() -> Self {
        Self {
            id: TypeId::of::<R>(),
            name: std::any::type_name::<R>(),
        }
    }

    /// Type name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if this is `R`.
    #[must_use]
    pub fn is<R: 'static>(&self) -> bool {
        self.id == TypeId::of::<R>()
    }
}

impl Default for ResponseType {
    fn default() -> Self {
        Self::of::<Response>()
    }
}

impl fmt::Debug for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A response, with the resolved request that produced it.
#[derive(Debug, Clone)]
pub struct Response {
    raw: HttpResponse,
    request: ResolvedRequest,
    simulated: bool,
}

impl Response {
    /// Wraps a raw response.
    #[must_use]
    pub fn new(raw: HttpResponse, request: ResolvedRequest, simulated: bool) -> Self {
        Self {
            raw,
            request,
            simulated,
        }
    }

    /// Status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.raw.status()
    }

    /// Headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        self.raw.headers()
    }

    /// Mutable headers, for response-phase handlers.
    pub fn headers_mut(&mut self) -> &mut HashMap<String, String> {
        self.raw.headers_mut()
    }

    /// Header value (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.raw.header(name)
    }

    /// Body bytes.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        self.raw.body()
    }

    /// Body as (lossy) UTF-8 text.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.raw.body()).into_owned()
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonDeserialization`] with the failing path.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        courier_core::from_json(self.raw.body())
    }

    /// Raw transport response.
    #[must_use]
    pub const fn raw(&self) -> &HttpResponse {
        &self.raw
    }

    /// Consumes into the raw transport response.
    #[must_use]
    pub fn into_raw(self) -> HttpResponse {
        self.raw
    }

    /// The resolved request this response answers.
    #[must_use]
    pub const fn resolved_request(&self) -> &ResolvedRequest {
        &self.request
    }

    /// Returns `true` if the response came from a mock.
    #[must_use]
    pub const fn is_simulated(&self) -> bool {
        self.simulated
    }

    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.raw.is_success()
    }

    /// Returns `true` for 4xx and 5xx statuses.
    #[must_use]
    pub const fn failed(&self) -> bool {
        self.raw.is_client_error() || self.raw.is_server_error()
    }

    /// The [`Error::Request`] describing this response.
    #[must_use]
    pub fn to_error(&self) -> Error {
        Error::Request {
            method: self.request.method(),
            url: self.request.url(),
            status: self.status(),
            body: self.raw.body().clone(),
        }
    }

    /// Fails on 4xx/5xx statuses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Request`] when [`Response::failed`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.failed() {
            return Err(self.to_error());
        }
        Ok(self)
    }

    /// Hydrates a data object, using the request hydrator, then the connector
    /// hydrator, then the body JSON.
    ///
    /// # Errors
    ///
    /// Fails if the hydrator fails or the JSON does not match `T`.
    pub fn dto<T: DeserializeOwned>(&self) -> Result<T> {
        match self.request.hydrator() {
            Some(hydrator) => courier_core::from_json_value(hydrator(self)?),
            None => self.json(),
        }
    }

    /// Converts into the resolved response type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResponseType`] if `R` is not the resolved type.
    pub fn into_typed<R: FromResponse>(self) -> Result<R> {
        let resolved = self.request.response_type();
        if !resolved.is::<R>() {
            return Err(Error::InvalidResponseType {
                resolved: resolved.name(),
                requested: std::any::type_name::<R>(),
            });
        }
        R::from_response(self)
    }
}

impl FromResponse for Response {
    fn from_response(response: Response) -> Result<Self> {
        Ok(response)
    }
}
