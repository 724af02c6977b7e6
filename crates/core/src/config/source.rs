//! Documentation source definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Transport used to mirror a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Crawl an HTML documentation site.
    Pages,
    /// Clone a git repository (e.g. a wiki).
    Git,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Pages => "pages",
            SourceKind::Git => "git",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One documentation source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,

    /// Site root URL (`pages`) or remote URL (`git`).
    pub url: String,

    /// Directory name under `cache_dir`; defaults to the source name.
    #[serde(default)]
    pub dir: Option<String>,

    /// Explicit store root, overriding `cache_dir` and `dir`.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// File extensions a crawl keeps (`pages` only).
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Extra pages to crawl besides the root (`pages` only).
    #[serde(default)]
    pub seeds: Vec<String>,

    /// Branch to mirror (`git` only); the remote's default branch when unset.
    #[serde(default)]
    pub branch: Option<String>,
}

pub(crate) fn default_extensions() -> Vec<String> {
    ["html", "css", "js", "svg", "png", "jpg", "jpeg", "webp"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl SourceConfig {
    pub fn pages(url: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Pages,
            url: url.into(),
            dir: None,
            path: None,
            extensions: default_extensions(),
            seeds: Vec::new(),
            branch: None,
        }
    }

    pub fn git(url: impl Into<String>) -> Self {
        Self { kind: SourceKind::Git, ..Self::pages(url) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serde_names() {
        assert_eq!(serde_json::to_string(&SourceKind::Pages).unwrap(), "\"pages\"");
        assert_eq!(serde_json::from_str::<SourceKind>("\"git\"").unwrap(), SourceKind::Git);
    }

    #[test]
    fn test_minimal_source_uses_defaults() {
        let source: SourceConfig = serde_json::from_str(r#"{"kind":"pages","url":"https://x.example/docs/"}"#).unwrap();
        assert_eq!(source.extensions, default_extensions());
        assert!(source.seeds.is_empty());
        assert!(source.path.is_none());
    }
}
