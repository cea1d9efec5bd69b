// src/adapters/multipart.rs

//! Streaming multipart/form-data encoder
//!
//! Parts are chained lazily: literal headers are small in-memory segments and
//! file contents are the origin's response stream, so an artifact is never
//! buffered whole between origin and destination.

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use rand::Rng;
use rand::distributions::Alphanumeric;

/// Fallible byte stream produced by an origin download
pub type ByteStream = BoxStream<'static, reqwest::Result<Bytes>>;

/// Length of generated boundaries
const BOUNDARY_LEN: usize = 32;

/// Random alphanumeric boundary
pub fn random_boundary() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOUNDARY_LEN)
        .map(char::from)
        .collect()
}

/// Wrap an in-memory value as a single-chunk stream
pub fn literal(data: impl Into<Bytes>) -> ByteStream {
    stream::iter([Ok(data.into())]).boxed()
}

/// Builder for a streaming multipart body
pub struct MultipartBody {
    boundary: String,
    segments: Vec<ByteStream>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::with_boundary(random_boundary())
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            segments: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's Content-Type header
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Append a plain form field
    pub fn add_field(&mut self, name: &str, value: &str) {
        self.segments.push(literal(format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            self.boundary, name, value
        )));
    }

    /// Append a file part whose content is streamed
    pub fn add_file(&mut self, name: &str, file_name: &str, content: ByteStream) {
        self.segments.push(literal(format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            self.boundary, name, file_name
        )));
        self.segments.push(content);
        self.segments.push(literal("\r\n"));
    }

    /// Close the body and return the whole stream
    pub fn finish(mut self) -> ByteStream {
        self.segments
            .push(literal(format!("--{}--\r\n", self.boundary)));
        stream::iter(self.segments).flatten().boxed()
    }
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) async fn collect(mut stream: ByteStream) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    out
}
