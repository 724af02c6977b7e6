//! Store manifest: remote identity and per-document metadata.
//!
//! The manifest lives inside the store root so it is replaced together with
//! the documents it describes.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::DocumentEntry;
use super::hash::content_digest;
use crate::config::SourceKind;
use crate::{Error, Result};

/// File name of the manifest inside a store root.
pub const MANIFEST_FILE: &str = ".docsync-manifest.json";

/// Metadata recorded for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    pub sha256: String,
    pub len: u64,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

/// Description of a populated store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Identity of the remote the store mirrors.
    pub remote: String,
    pub kind: SourceKind,
    pub fetched_at: DateTime<Utc>,
    /// Documents keyed by store-relative path.
    #[serde(default)]
    pub entries: BTreeMap<String, EntryMeta>,
}

impl Manifest {
    /// Build a manifest describing the documents among `entries`.
    pub fn from_entries(remote: impl Into<String>, kind: SourceKind, entries: &[DocumentEntry]) -> Self {
        let entries = entries
            .iter()
            .filter(|entry| entry.is_document())
            .map(|entry| {
                let meta = EntryMeta {
                    sha256: content_digest(&entry.bytes),
                    len: entry.bytes.len() as u64,
                    source: entry.source.clone(),
                    etag: entry.etag.clone(),
                    last_modified: entry.last_modified.clone(),
                };
                (entry.path.clone(), meta)
            })
            .collect();

        Self { remote: remote.into(), kind, fetched_at: Utc::now(), entries }
    }

    /// Read the manifest of the store at `root`, if it has one.
    pub fn load(root: &Path) -> Result<Option<Self>> {
        let path = root.join(MANIFEST_FILE);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(&path, e)),
        };

        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|e| Error::Manifest { path, message: e.to_string() })
    }

    /// Write the manifest into the store at `root`.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = root.join(MANIFEST_FILE);
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::Manifest { path: path.clone(), message: e.to_string() })?;
        fs::write(&path, json).map_err(|e| Error::io(&path, e))
    }

    pub fn get(&self, path: &str) -> Option<&EntryMeta> {
        self.entries.get(path)
    }

    /// Number of documents added, modified or removed relative to `previous`.
    pub fn changed_since(&self, previous: &Manifest) -> usize {
        let modified = self
            .entries
            .iter()
            .filter(|(path, meta)| previous.entries.get(*path).is_none_or(|old| old.sha256 != meta.sha256))
            .count();
        let removed = previous
            .entries
            .keys()
            .filter(|path| !self.entries.contains_key(*path))
            .count();
        modified + removed
    }
}
