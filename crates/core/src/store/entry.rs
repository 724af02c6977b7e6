//! Retrieved documents and their store-relative paths.

use std::path::{Component, Path};

use bytes::Bytes;

use super::manifest::MANIFEST_FILE;
use crate::{Error, Result};

/// Directory holding version-control metadata of a mirrored repository.
pub const VCS_DIR: &str = ".git";

/// A single retrieved artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    /// `/`-separated path beneath the store root.
    pub path: String,
    /// File content.
    pub bytes: Bytes,
    /// URL or remote reference the content came from.
    pub source: String,
    /// HTTP `ETag` validator, when the transport supplied one.
    pub etag: Option<String>,
    /// HTTP `Last-Modified` validator, when the transport supplied one.
    pub last_modified: Option<String>,
}

impl DocumentEntry {
    pub fn new(path: impl Into<String>, bytes: impl Into<Bytes>, source: impl Into<String>) -> Self {
        Self { path: path.into(), bytes: bytes.into(), source: source.into(), etag: None, last_modified: None }
    }

    pub fn with_validators(mut self, etag: Option<String>, last_modified: Option<String>) -> Self {
        self.etag = etag;
        self.last_modified = last_modified;
        self
    }

    /// Whether this entry is a document, as opposed to repository metadata.
    pub fn is_document(&self) -> bool {
        is_document_path(&self.path)
    }
}

/// Whether a store-relative path names a document.
///
/// Anything inside a `.git` directory and the manifest itself are not documents.
pub fn is_document_path(path: &str) -> bool {
    path != MANIFEST_FILE && !path.split('/').any(|segment| segment == VCS_DIR)
}

/// Check that a retriever-supplied path stays beneath the store root.
pub fn validate_relative_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::invalid_entry(path, "empty path"));
    }
    let rooted = Path::new(path)
        .components()
        .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir));
    if rooted || path.contains('\\') || has_drive_prefix(path) {
        return Err(Error::invalid_entry(path, "must be a relative '/'-separated path"));
    }
    for segment in path.split('/') {
        match segment {
            "" => return Err(Error::invalid_entry(path, "empty path segment")),
            "." | ".." => return Err(Error::invalid_entry(path, "dot segments are not allowed")),
            _ => {}
        }
    }
    if path == MANIFEST_FILE {
        return Err(Error::invalid_entry(path, "reserved for the store manifest"));
    }
    Ok(())
}

/// `C:` style drive prefix, which would leave the store root on Windows.
fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
