//! Multipart form data encoding.
//!
//! [`Part`] is a single named field of a multipart body. Encoding a list of
//! parts needs a boundary, which is why multipart bodies are only materialized
//! once a stream factory is known (see the client crate).

use bytes::{BufMut, Bytes, BytesMut};

/// A single part in a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

impl Part {
    /// Create a new part with the given name and data.
    #[must_use]
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            content_type: None,
            data: data.into(),
        }
    }

    /// Create a text part (`text/plain; charset=utf-8`).
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, Bytes::from(value.into())).with_content_type("text/plain; charset=utf-8")
    }

    /// Create a file part, guessing the content type from the filename.
    #[must_use]
    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let filename = filename.into();
        let content_type = guess_content_type(&filename);
        Self::new(name, data)
            .with_filename(filename)
            .with_content_type(content_type)
    }

    /// Set the filename for this part.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Set the content type for this part.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Part name, also its merge key.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filename, if set.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Content type, if set.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Part data.
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

fn guess_content_type(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "xml" => "application/xml",
        "zip" => "application/zip",
        "gz" | "gzip" => "application/gzip",
        _ => "application/octet-stream",
    }
}

/// Content-Type header value for a multipart body with the given boundary.
#[must_use]
pub fn multipart_content_type(boundary: &str) -> String {
    format!("multipart/form-data; boundary={boundary}")
}

/// Encode parts into a `multipart/form-data` payload.
#[must_use]
pub fn encode_multipart(boundary: &str, parts: &[Part]) -> Bytes {
    let mut buf = BytesMut::new();

    for part in parts {
        buf.put_slice(b"--");
        buf.put_slice(boundary.as_bytes());
        buf.put_slice(b"\r\n");

        buf.put_slice(b"Content-Disposition: form-data; name=\"");
        buf.put_slice(part.name.as_bytes());
        buf.put_slice(b"\"");
        if let Some(filename) = &part.filename {
            buf.put_slice(b"; filename=\"");
            buf.put_slice(filename.as_bytes());
            buf.put_slice(b"\"");
        }
        buf.put_slice(b"\r\n");

        if let Some(content_type) = &part.content_type {
            buf.put_slice(b"Content-Type: ");
            buf.put_slice(content_type.as_bytes());
            buf.put_slice(b"\r\n");
        }

        buf.put_slice(b"\r\n");
        buf.put_slice(&part.data);
        buf.put_slice(b"\r\n");
    }

    buf.put_slice(b"--");
    buf.put_slice(boundary.as_bytes());
    buf.put_slice(b"--\r\n");

    buf.freeze()
}

/// Generate a boundary unlikely to collide with part data.
#[must_use]
pub fn generate_boundary() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let sequence = COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("----CourierBoundary{timestamp:x}{sequence:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_part() {
        let part = Part::text("field", "value");
        assert_eq!(part.name(), "field");
        assert_eq!(part.data().as_ref(), b"value");
        assert_eq!(part.content_type(), Some("text/plain; charset=utf-8"));
        assert!(part.filename().is_none());
    }

    #[test]
    fn file_part_guesses_content_type() {
        let part = Part::file("upload", "Photo.JPG", vec![0xFF, 0xD8]);
        assert_eq!(part.filename(), Some("Photo.JPG"));
        assert_eq!(part.content_type(), Some("image/jpeg"));
        assert_eq!(
            Part::file("blob", "data.unknown", Bytes::new()).content_type(),
            Some("application/octet-stream")
        );
    }

    #[test]
    fn encode_parts() {
        let parts = [
            Part::text("name", "courier"),
            Part::file("upload", "notes.txt", "file content"),
        ];
        let body = encode_multipart("b123", &parts);
        let body = String::from_utf8_lossy(&body);

        assert!(body.starts_with("--b123\r\n"));
        assert!(body.contains("Content-Disposition: form-data; name=\"name\"\r\n"));
        assert!(body.contains("name=\"upload\"; filename=\"notes.txt\""));
        assert!(body.contains("Content-Type: text/plain\r\n"));
        assert!(body.ends_with("--b123--\r\n"));
    }

    #[test]
    fn boundaries_are_unique() {
        assert_ne!(generate_boundary(), generate_boundary());
        assert_eq!(
            multipart_content_type("xyz"),
            "multipart/form-data; boundary=xyz"
        );
    }
}
