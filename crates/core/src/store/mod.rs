//! Directory-backed documentation cache.
//!
//! A store is a single directory mirroring one documentation source. It is
//! never patched in place: new content is staged in a sibling temporary
//! directory and swapped in with renames, so readers see either the previous
//! copy or the new one.
//!
//! - Documents are plain files whose paths mirror the source hierarchy
//! - `.docsync-manifest.json` records the remote identity and per-file digests
//! - `.git` directories of mirrored repositories are kept but never listed

pub mod entry;
pub mod hash;
pub mod lock;
pub mod manifest;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

pub use entry::{DocumentEntry, is_document_path, validate_relative_path};
pub use lock::StoreLock;
pub use manifest::{EntryMeta, MANIFEST_FILE, Manifest};

use crate::{Error, Result};

/// Observable state of a store directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreState {
    /// The directory does not exist.
    Absent,
    /// The directory exists but holds no documents.
    Empty,
    /// At least one document exists beneath the root.
    Populated,
}

/// A local mirror rooted at one directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The configured root, whether or not it exists yet.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Current state of the store.
    ///
    /// Unreadable directories count as absent so callers re-fetch rather than
    /// trust partial content.
    pub fn state(&self) -> StoreState {
        if !self.root.is_dir() {
            return StoreState::Absent;
        }
        match self.list_entries() {
            Ok(entries) if entries.is_empty() => StoreState::Empty,
            Ok(_) => StoreState::Populated,
            Err(e) => {
                tracing::warn!("treating unreadable store as absent: {}", e);
                StoreState::Absent
            }
        }
    }

    /// True iff the store directory exists and holds at least one document.
    pub fn exists(&self) -> bool {
        self.state() == StoreState::Populated
    }

    /// Relative paths of all documents, in lexicographic order.
    ///
    /// Empty when the store is absent or empty.
    pub fn list_entries(&self) -> Result<Vec<String>> {
        let mut entries = Vec::new();
        if self.root.is_dir() {
            collect_documents(&self.root, "", &mut entries)?;
        }
        entries.sort();
        Ok(entries)
    }

    /// Read one document by its relative path.
    pub fn read_entry(&self, relative: &str) -> Result<Vec<u8>> {
        let path = self.entry_path(relative)?;
        fs::read(&path).map_err(|e| Error::io(&path, e))
    }

    /// Manifest of the current copy, if the store has one.
    pub fn manifest(&self) -> Result<Option<Manifest>> {
        if !self.root.is_dir() {
            return Ok(None);
        }
        Manifest::load(&self.root)
    }

    /// Remove the store and everything in it.
    ///
    /// The root is first renamed aside, so the store reads as absent as soon as
    /// that rename succeeds even if deleting the old copy then fails.
    pub fn clear(&self) -> Result<()> {
        if fs::symlink_metadata(&self.root).is_err() {
            return Ok(());
        }

        self.sweep_stale();
        let retired = self.sibling("old");
        fs::rename(&self.root, &retired).map_err(|e| Error::io(&self.root, e))?;
        fs::remove_dir_all(&retired).map_err(|e| Error::io(&retired, e))?;

        tracing::debug!("cleared store {}", self.root.display());
        Ok(())
    }

    /// Write entries beneath the root, creating directories as needed.
    ///
    /// Returns the number of documents written. Used on staging directories;
    /// the live store is only ever changed through [`CacheStore::replace`].
    pub fn write(&self, entries: &[DocumentEntry]) -> Result<usize> {
        fs::create_dir_all(&self.root).map_err(|e| Error::io(&self.root, e))?;

        let mut documents = 0;
        for entry in entries {
            let target = self.entry_path(&entry.path)?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
            fs::write(&target, &entry.bytes).map_err(|e| Error::io(&target, e))?;
            if entry.is_document() {
                documents += 1;
            }
        }

        Ok(documents)
    }

    /// Replace the whole store with `entries` and `manifest`.
    ///
    /// Everything is staged in a sibling directory first. The swap renames the
    /// current root aside, renames the stage into place and then deletes the
    /// old copy. If the stage cannot be moved into place the old copy is put
    /// back.
    pub fn replace(&self, entries: &[DocumentEntry], manifest: &Manifest) -> Result<usize> {
        let parent = self.parent_dir();
        fs::create_dir_all(&parent).map_err(|e| Error::io(&parent, e))?;
        self.sweep_stale();

        let staging = tempfile::Builder::new()
            .prefix(&format!(".{}.staging-", self.name()))
            .tempdir_in(&parent)
            .map_err(|e| Error::io(&parent, e))?;

        let written = CacheStore::new(staging.path()).write(entries)?;
        manifest.save(staging.path())?;

        let retired = self.sibling("old");
        let had_previous = fs::symlink_metadata(&self.root).is_ok();
        if had_previous {
            fs::rename(&self.root, &retired).map_err(|e| Error::io(&self.root, e))?;
        }

        if let Err(e) = fs::rename(staging.path(), &self.root) {
            if had_previous && let Err(restore) = fs::rename(&retired, &self.root) {
                tracing::error!("failed to restore {} from {}: {}", self.root.display(), retired.display(), restore);
            }
            return Err(Error::io(&self.root, e));
        }

        if had_previous && let Err(e) = fs::remove_dir_all(&retired) {
            tracing::warn!("replaced {} but could not delete old copy {}: {}", self.root.display(), retired.display(), e);
        }

        tracing::debug!("replaced store {} ({} documents)", self.root.display(), written);
        Ok(written)
    }

    /// Absolute-or-relative filesystem path of a validated entry.
    fn entry_path(&self, relative: &str) -> Result<PathBuf> {
        validate_relative_path(relative)?;
        Ok(relative.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }

    fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store".to_string())
    }

    fn parent_dir(&self) -> PathBuf {
        match self.root.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        self.parent_dir()
            .join(format!(".{}.{}-{}", self.name(), suffix, std::process::id()))
    }

    /// Delete retired copies and staging directories left by earlier runs.
    ///
    /// Callers hold the exclusive store lock, so no sibling in use is touched.
    fn sweep_stale(&self) {
        let parent = self.parent_dir();
        let Ok(read_dir) = fs::read_dir(&parent) else { return };

        let prefixes = [format!(".{}.old-", self.name()), format!(".{}.staging-", self.name())];
        for item in read_dir.flatten() {
            let name = item.file_name().to_string_lossy().into_owned();
            if !prefixes.iter().any(|prefix| name.starts_with(prefix.as_str())) {
                continue;
            }
            match fs::remove_dir_all(item.path()) {
                Ok(()) => tracing::debug!("removed stale {}", item.path().display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("could not remove stale {}: {}", item.path().display(), e),
            }
        }
    }
}

fn collect_documents(dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<()> {
    let read_dir = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    for item in read_dir {
        let item = item.map_err(|e| Error::io(dir, e))?;
        let name = item.file_name().to_string_lossy().into_owned();
        let relative = if prefix.is_empty() { name } else { format!("{prefix}/{name}") };
        if !is_document_path(&relative) {
            continue;
        }

        let file_type = item.file_type().map_err(|e| Error::io(item.path(), e))?;
        if file_type.is_dir() {
            collect_documents(&item.path(), &relative, out)?;
        } else if file_type.is_file() {
            out.push(relative);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceKind;

    fn doc(path: &str, body: &str) -> DocumentEntry {
        DocumentEntry::new(path, body.to_string(), format!("https://example.com/docs/{path}"))
    }

    fn populated(root: &Path, entries: &[DocumentEntry]) -> CacheStore {
        let store = CacheStore::new(root);
        let manifest = Manifest::from_entries("https://example.com/docs/", SourceKind::Pages, entries);
        store.replace(entries, &manifest).unwrap();
        store
    }

    #[test]
    fn test_state_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("docs"));
        assert_eq!(store.state(), StoreState::Absent);
        assert!(!store.exists());

        fs::create_dir(store.path()).unwrap();
        assert_eq!(store.state(), StoreState::Empty);

        fs::write(store.path().join("index.html"), "x").unwrap();
        assert_eq!(store.state(), StoreState::Populated);
        assert!(store.exists());
    }

    #[test]
    fn test_metadata_only_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("wiki"));
        fs::create_dir_all(store.path().join(".git/refs")).unwrap();
        fs::write(store.path().join(".git/HEAD"), "ref: refs/heads/master\n").unwrap();
        fs::write(store.path().join(MANIFEST_FILE), "{}").unwrap();
        assert_eq!(store.state(), StoreState::Empty);
        assert!(store.list_entries().unwrap().is_empty());
    }

    #[test]
    fn test_path_independent_of_existence() {
        let store = CacheStore::new("/tmp/doccache");
        assert_eq!(store.path(), Path::new("/tmp/doccache"));
    }

    #[test]
    fn test_list_entries_lexicographic() {
        let dir = tempfile::tempdir().unwrap();
        let store = populated(
            &dir.path().join("docs"),
            &[doc("index.html", "root"), doc("config/index.html", "config"), doc("a-b/x.html", "x")],
        );
        assert_eq!(store.list_entries().unwrap(), vec!["a-b/x.html", "config/index.html", "index.html"]);
        assert_eq!(store.list_entries().unwrap(), store.list_entries().unwrap());
    }

    #[test]
    fn test_list_entries_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("missing"));
        assert!(store.list_entries().unwrap().is_empty());
    }

    #[test]
    fn test_write_counts_documents_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("wiki"));
        let written = store
            .write(&[doc("Home.md", "# Home"), doc(".git/HEAD", "ref: refs/heads/master\n")])
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(store.list_entries().unwrap(), vec!["Home.md"]);
        assert!(store.path().join(".git/HEAD").is_file());
    }

    #[test]
    fn test_write_rejects_escaping_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("docs"));
        let result = store.write(&[doc("../evil.html", "x")]);
        assert!(matches!(result, Err(Error::InvalidEntry { .. })));
        assert!(!dir.path().join("evil.html").exists());
    }

    #[test]
    fn test_replace_discards_previous_entries() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        populated(&root, &[doc("index.html", "old"), doc("config/index.html", "old"), doc("old.html", "old")]);

        let store = populated(&root, &[doc("index.html", "new")]);
        assert_eq!(store.list_entries().unwrap(), vec!["index.html"]);
        assert_eq!(store.read_entry("index.html").unwrap(), b"new");
        assert_eq!(store.manifest().unwrap().unwrap().entries.len(), 1);
    }

    #[test]
    fn test_replace_leaves_no_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        populated(&root, &[doc("index.html", "one")]);
        populated(&root, &[doc("index.html", "two")]);

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["docs"]);
    }

    #[test]
    fn test_replace_sweeps_leftovers_of_earlier_runs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        populated(&root, &[doc("index.html", "one")]);

        fs::create_dir_all(dir.path().join(".docs.old-4242/config")).unwrap();
        fs::write(dir.path().join(".docs.old-4242/config/index.html"), "stale").unwrap();
        fs::create_dir(dir.path().join(".docs.staging-AbC123")).unwrap();
        fs::create_dir(dir.path().join(".other.old-4242")).unwrap();

        populated(&root, &[doc("index.html", "two")]);

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![".other.old-4242", "docs"]);
    }

    #[test]
    fn test_clear_sweeps_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let store = populated(&dir.path().join("docs"), &[doc("index.html", "x")]);
        fs::create_dir(dir.path().join(".docs.old-1")).unwrap();

        store.clear().unwrap();
        assert!(!dir.path().join(".docs.old-1").exists());
    }

    #[test]
    fn test_replace_invalid_entry_keeps_store() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        let store = populated(&root, &[doc("index.html", "good")]);

        let bad = [doc("index.html", "bad"), doc("/abs.html", "bad")];
        let manifest = Manifest::from_entries("https://example.com/docs/", SourceKind::Pages, &bad);
        assert!(store.replace(&bad, &manifest).is_err());
        assert_eq!(store.read_entry("index.html").unwrap(), b"good");
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = populated(&dir.path().join("docs"), &[doc("index.html", "x")]);
        store.clear().unwrap();
        assert_eq!(store.state(), StoreState::Absent);
        store.clear().unwrap();
    }

    #[test]
    fn test_read_entry_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = populated(&dir.path().join("docs"), &[doc("index.html", "x")]);
        assert!(matches!(store.read_entry("../docs/index.html"), Err(Error::InvalidEntry { .. })));
    }
}
