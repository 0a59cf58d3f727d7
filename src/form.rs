//! Parsed `multipart/form-data` request bodies.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use axum::http::HeaderMap;
use bytes::Bytes;
use tempfile::TempPath;

/// Maximum number of file-part bytes held in memory before spilling to disk.
pub const MULTIPART_MEMORY_LIMIT: u64 = 8 * 1024;

/// Extra allowance for non-file form values on top of [`MULTIPART_MEMORY_LIMIT`].
pub const MULTIPART_VALUE_ALLOWANCE: u64 = 10 << 20;

/// A parsed multipart form.
///
/// Plain fields are collected as strings under [`values`](Self::values);
/// parts carrying a filename are collected under [`files`](Self::files).
/// Repeated names keep every occurrence in arrival order.
#[derive(Debug, Default)]
pub struct MultipartForm {
    values: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<FilePart>>,
}

impl MultipartForm {
    /// Creates an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// All plain values, keyed by field name.
    pub fn values(&self) -> &HashMap<String, Vec<String>> {
        &self.values
    }

    /// All file parts, keyed by field name.
    pub fn files(&self) -> &HashMap<String, Vec<FilePart>> {
        &self.files
    }

    /// First value for `name`, if any.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name)?.first().map(String::as_str)
    }

    /// First file part for `name`, if any.
    pub fn file(&self, name: &str) -> Option<&FilePart> {
        self.files.get(name)?.first()
    }

    pub(crate) fn push_value(&mut self, name: String, value: String) {
        self.values.entry(name).or_default().push(value);
    }

    pub(crate) fn push_file(&mut self, name: String, file: FilePart) {
        self.files.entry(name).or_default().push(file);
    }
}

/// One uploaded file from a multipart form.
#[derive(Debug)]
pub struct FilePart {
    pub(crate) filename: String,
    pub(crate) headers: HeaderMap,
    pub(crate) size: u64,
    pub(crate) content: FileContent,
}

/// Where the bytes of a [`FilePart`] live.
#[derive(Debug)]
pub(crate) enum FileContent {
    /// Small parts are kept in memory.
    Memory(Bytes),
    /// Large parts are written to a temporary file, removed on drop.
    Disk(TempPath),
}

impl FilePart {
    /// The filename sent by the client.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The part's own headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The part's `Content-Type`, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Size of the content in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns `true` if the content is held in memory.
    pub fn is_in_memory(&self) -> bool {
        matches!(self.content, FileContent::Memory(_))
    }

    /// Path of the temporary file, for parts spilled to disk.
    pub fn path(&self) -> Option<&Path> {
        match &self.content {
            FileContent::Memory(_) => None,
            FileContent::Disk(path) => Some(&**path),
        }
    }

    /// Reads the whole content.
    pub async fn bytes(&self) -> io::Result<Bytes> {
        match &self.content {
            FileContent::Memory(bytes) => Ok(bytes.clone()),
            FileContent::Disk(path) => tokio::fs::read(path).await.map(Bytes::from),
        }
    }
}
