//! Request body repository.
//!
//! A [`Body`] is declared by a connector and/or a request and merged during
//! resolution:
//!
//! | connector | request | result                                   |
//! |-----------|---------|------------------------------------------|
//! | none      | none    | no body                                  |
//! | `a`       | none    | `a`                                      |
//! | none      | `b`     | `b`                                      |
//! | `a`       | `b`     | kinds must match; mergeable kinds merge key-wise (request wins), opaque kinds take `b` whole |
//!
//! JSON objects, forms and multipart bodies are mergeable. Text and raw bodies
//! are opaque.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use courier_core::{ContentType, Part, encode_multipart, generate_boundary, multipart_content_type};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::store::ArrayStore;
use crate::{Error, Result};

/// Body kind, used for merge compatibility checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyKind {
    /// JSON object.
    Json,
    /// URL-encoded form.
    Form,
    /// `multipart/form-data`.
    Multipart,
    /// Plain text.
    Text,
    /// Raw bytes.
    Raw,
}

impl BodyKind {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Form => "form",
            Self::Multipart => "multipart",
            Self::Text => "text",
            Self::Raw => "raw",
        }
    }

    /// Returns `true` for key/value kinds.
    #[must_use]
    pub const fn is_mergeable(&self) -> bool {
        matches!(self, Self::Json | Self::Form | Self::Multipart)
    }
}

impl fmt::Display for BodyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encodes multipart parts into a wire payload.
pub trait StreamFactory: fmt::Debug + Send + Sync {
    /// A fresh boundary.
    fn boundary(&self) -> String;

    /// Content type and encoded payload for the given parts.
    fn create_stream(&self, parts: &[Part]) -> (String, Bytes) {
        let boundary = self.boundary();
        (
            multipart_content_type(&boundary),
            encode_multipart(&boundary, parts),
        )
    }
}

/// Default factory, generating a unique boundary per body.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryStreamFactory;

impl StreamFactory for BoundaryStreamFactory {
    fn boundary(&self) -> String {
        generate_boundary()
    }
}

/// Factory always using the same boundary, handy for snapshot tests.
#[derive(Debug, Clone)]
pub struct FixedBoundary(pub String);

impl StreamFactory for FixedBoundary {
    fn boundary(&self) -> String {
        self.0.clone()
    }
}

/// Multipart parts, keyed by part name.
#[derive(Debug, Clone, Default)]
pub struct MultipartBody {
    parts: Vec<Part>,
    factory: Option<Arc<dyn StreamFactory>>,
}

impl MultipartBody {
    /// Creates a multipart body.
    #[must_use]
    pub fn new(parts: impl IntoIterator<Item = Part>) -> Self {
        let mut body = Self::default();
        for part in parts {
            body.add(part);
        }
        body
    }

    /// Adds a part, replacing an existing one with the same name.
    pub fn add(&mut self, part: Part) -> &mut Self {
        match self.parts.iter_mut().find(|p| p.name() == part.name()) {
            Some(existing) => *existing = part,
            None => self.parts.push(part),
        }
        self
    }

    /// Part by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name() == name)
    }

    /// All parts.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Returns `true` once a stream factory has been attached.
    #[must_use]
    pub fn has_stream_factory(&self) -> bool {
        self.factory.is_some()
    }

    /// Attaches the factory used to materialize the body.
    pub fn set_stream_factory(&mut self, factory: Arc<dyn StreamFactory>) {
        self.factory = Some(factory);
    }

    fn encode(&self) -> (String, Bytes) {
        match &self.factory {
            Some(factory) => factory.create_stream(&self.parts),
            None => BoundaryStreamFactory.create_stream(&self.parts),
        }
    }
}

impl PartialEq for MultipartBody {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

/// A request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// JSON object, merged key-wise.
    Json(Map<String, Value>),
    /// URL-encoded form, merged key-wise.
    Form(ArrayStore<String>),
    /// Multipart form, merged by part name.
    Multipart(MultipartBody),
    /// Opaque text payload.
    Text(String),
    /// Opaque binary payload.
    Raw(Bytes),
}

impl Body {
    /// JSON body from any value serializing to an object.
    ///
    /// # Errors
    ///
    /// Fails if serialization fails or the value is not a JSON object.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(Self::Json(map)),
            other => Err(Error::invalid_request(format!(
                "JSON bodies must be objects, got `{other}`; use a raw body instead"
            ))),
        }
    }

    /// Form body from key/value pairs.
    #[must_use]
    pub fn form<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Form(pairs.into_iter().collect())
    }

    /// Multipart body from parts.
    #[must_use]
    pub fn multipart(parts: impl IntoIterator<Item = Part>) -> Self {
        Self::Multipart(MultipartBody::new(parts))
    }

    /// Plain text body.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Raw bytes body.
    #[must_use]
    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        Self::Raw(bytes.into())
    }

    /// Kind of this body.
    #[must_use]
    pub const fn kind(&self) -> BodyKind {
        match self {
            Self::Json(_) => BodyKind::Json,
            Self::Form(_) => BodyKind::Form,
            Self::Multipart(_) => BodyKind::Multipart,
            Self::Text(_) => BodyKind::Text,
            Self::Raw(_) => BodyKind::Raw,
        }
    }

    /// Returns `true` if this body merges key-wise.
    #[must_use]
    pub const fn is_mergeable(&self) -> bool {
        self.kind().is_mergeable()
    }

    /// JSON object content, if this is a JSON body.
    #[must_use]
    pub const fn as_json(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Json(map) => Some(map),
            _ => None,
        }
    }

    /// Form content, if this is a form body.
    #[must_use]
    pub const fn as_form(&self) -> Option<&ArrayStore<String>> {
        match self {
            Self::Form(form) => Some(form),
            _ => None,
        }
    }

    /// Multipart content, if this is a multipart body.
    #[must_use]
    pub const fn as_multipart(&self) -> Option<&MultipartBody> {
        match self {
            Self::Multipart(multipart) => Some(multipart),
            _ => None,
        }
    }

    /// Merges connector and request bodies.
    ///
    /// Multipart results receive `factory` so they can be materialized later.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BodyTypeMismatch`] when both sides declare bodies of
    /// different kinds.
    pub fn merge(
        connector: Option<&Self>,
        request: Option<&Self>,
        factory: &Arc<dyn StreamFactory>,
    ) -> Result<Option<Self>> {
        let mut merged = match (connector, request) {
            (None, None) => return Ok(None),
            (Some(body), None) | (None, Some(body)) => body.clone(),
            (Some(base), Some(top)) => {
                if base.kind() != top.kind() {
                    return Err(Error::BodyTypeMismatch {
                        connector: base.kind().as_str(),
                        request: top.kind().as_str(),
                    });
                }
                merge_same_kind(base, top)
            }
        };

        if let Self::Multipart(multipart) = &mut merged {
            multipart.set_stream_factory(Arc::clone(factory));
        }
        Ok(Some(merged))
    }

    /// Content type and wire payload.
    ///
    /// # Errors
    ///
    /// Fails if the JSON or form payload cannot be serialized.
    pub fn materialize(&self) -> Result<(String, Bytes)> {
        let materialized = match self {
            Self::Json(map) => (
                ContentType::Json.to_string(),
                courier_core::to_json(map)?,
            ),
            Self::Form(form) => (
                ContentType::FormUrlEncoded.to_string(),
                courier_core::to_form(&form.all())?,
            ),
            Self::Multipart(multipart) => multipart.encode(),
            Self::Text(text) => (
                format!("{}; charset=utf-8", ContentType::PlainText),
                Bytes::from(text.clone()),
            ),
            Self::Raw(bytes) => (ContentType::OctetStream.to_string(), bytes.clone()),
        };
        Ok(materialized)
    }
}

// Callers guarantee both bodies have the same kind.
fn merge_same_kind(base: &Body, top: &Body) -> Body {
    match (base, top) {
        (Body::Json(base), Body::Json(top)) => {
            let mut map = base.clone();
            for (key, value) in top {
                map.insert(key.clone(), value.clone());
            }
            Body::Json(map)
        }
        (Body::Form(base), Body::Form(top)) => {
            let mut form = base.clone();
            form.merge(top);
            Body::Form(form)
        }
        (Body::Multipart(base), Body::Multipart(top)) => {
            let mut multipart = base.clone();
            for part in top.parts() {
                multipart.add(part.clone());
            }
            Body::Multipart(multipart)
        }
        (_, top) => top.clone(),
    }
}
