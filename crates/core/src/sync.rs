//! Fetch / update / force / list / get-path orchestration.
//!
//! | Request  | Store state     | Action                             | Result          |
//! |----------|-----------------|------------------------------------|-----------------|
//! | ensure   | absent or empty | fetch_all, replace                 | created         |
//! | ensure   | populated       | none                               | already-present |
//! | update   | absent or empty | fetch_all, replace                 | created         |
//! | update   | populated       | identity check, refresh, replace   | updated         |
//! | force    | any             | fetch_all, replace                 | forced          |
//! | list     | any             | list_entries                       | listed          |
//! | get-path | any             | path                               | path            |
//!
//! Retrieval always completes before the store is touched, so a failed fetch
//! never damages an existing copy.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::retriever::Retriever;
use crate::store::{CacheStore, DocumentEntry, Manifest, StoreLock};
use crate::{Error, Result};

/// Requested operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncRequest {
    Ensure,
    Update,
    Force,
    List,
    GetPath,
}

impl SyncRequest {
    /// Resolve action flags, most specific first:
    /// force > update > list > get-path > ensure.
    pub fn from_flags(update: bool, force: bool, list: bool, get_path: bool) -> Self {
        if force {
            SyncRequest::Force
        } else if update {
            SyncRequest::Update
        } else if list {
            SyncRequest::List
        } else if get_path {
            SyncRequest::GetPath
        } else {
            SyncRequest::Ensure
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncRequest::Ensure => "ensure",
            SyncRequest::Update => "update",
            SyncRequest::Force => "force",
            SyncRequest::List => "list",
            SyncRequest::GetPath => "get-path",
        }
    }
}

/// What the synchronizer did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncAction {
    Created,
    AlreadyPresent,
    Updated,
    Forced,
    Listed,
    Path,
    Failed,
}

/// Outcome of one operation.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub operation: SyncRequest,
    pub path: PathBuf,
    pub action: SyncAction,
    /// Documents written to the store.
    pub written: usize,
    /// Documents added, modified or removed by an update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<usize>,
    /// Listing produced by a list request.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResult {
    fn new(operation: SyncRequest, path: &Path, action: SyncAction) -> Self {
        Self { operation, path: path.to_path_buf(), action, written: 0, changed: None, entries: Vec::new(), error: None }
    }

    /// Record of a failed operation, for reporting.
    pub fn failure(operation: SyncRequest, path: &Path, error: &Error) -> Self {
        Self { error: Some(error.to_string()), ..Self::new(operation, path, SyncAction::Failed) }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Orchestrates one store and the retriever that fills it.
pub struct Synchronizer {
    store: CacheStore,
    retriever: Box<dyn Retriever>,
}

impl Synchronizer {
    pub fn new(store: CacheStore, retriever: Box<dyn Retriever>) -> Self {
        Self { store, retriever }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn retriever(&self) -> &dyn Retriever {
        &*self.retriever
    }

    pub async fn execute(&self, request: SyncRequest) -> Result<SyncResult> {
        match request {
            SyncRequest::Ensure => self.ensure().await,
            SyncRequest::Update => self.update().await,
            SyncRequest::Force => self.force().await,
            SyncRequest::List => self.list().await,
            SyncRequest::GetPath => Ok(self.get_path()),
        }
    }

    /// Fetch only if the store holds no documents yet.
    pub async fn ensure(&self) -> Result<SyncResult> {
        let _lock = self.lock_exclusive().await?;

        if self.store.exists() {
            tracing::info!("documentation already present at {}", self.store.path().display());
            return Ok(SyncResult::new(SyncRequest::Ensure, self.store.path(), SyncAction::AlreadyPresent));
        }

        self.populate(SyncRequest::Ensure, SyncAction::Created).await
    }

    /// Refresh a populated store from its remote, or populate an empty one.
    pub async fn update(&self) -> Result<SyncResult> {
        let _lock = self.lock_exclusive().await?;

        if !self.store.exists() {
            tracing::info!("no documentation at {}, fetching", self.store.path().display());
            return self.populate(SyncRequest::Update, SyncAction::Created).await;
        }

        let previous = self.store.manifest()?;
        if let Some(manifest) = &previous
            && manifest.remote != self.retriever.remote()
        {
            return Err(Error::StoreMismatch {
                path: self.store.path().to_path_buf(),
                expected: self.retriever.remote().to_string(),
                found: manifest.remote.clone(),
            });
        }

        tracing::info!("updating {} from {}", self.store.path().display(), self.retriever.remote());
        let entries = self.retriever.refresh(&self.store, previous.as_ref()).await?;
        let manifest = self.manifest_for(&entries)?;
        let changed = previous.as_ref().map(|old| manifest.changed_since(old));

        let written = self.commit(entries, manifest).await?;
        tracing::info!("updated {}: {} documents, {:?} changed", self.store.path().display(), written, changed);

        Ok(SyncResult { written, changed, ..SyncResult::new(SyncRequest::Update, self.store.path(), SyncAction::Updated) })
    }

    /// Discard the current copy and fetch everything again.
    ///
    /// The old copy survives until the new one is fully retrieved and staged.
    pub async fn force(&self) -> Result<SyncResult> {
        let _lock = self.lock_exclusive().await?;
        tracing::info!("force-refetching {}", self.store.path().display());
        self.populate(SyncRequest::Force, SyncAction::Forced).await
    }

    /// List documents currently in the store.
    pub async fn list(&self) -> Result<SyncResult> {
        let store = self.store.clone();
        let entries = blocking(self.store.path(), move || {
            let _lock = StoreLock::shared(store.path())?;
            store.list_entries()
        })
        .await?;

        Ok(SyncResult { entries, ..SyncResult::new(SyncRequest::List, self.store.path(), SyncAction::Listed) })
    }

    /// Store location, whether or not it has been populated.
    pub fn get_path(&self) -> SyncResult {
        SyncResult::new(SyncRequest::GetPath, self.store.path(), SyncAction::Path)
    }

    async fn populate(&self, operation: SyncRequest, action: SyncAction) -> Result<SyncResult> {
        tracing::info!("fetching {} into {}", self.retriever.remote(), self.store.path().display());
        let entries = self.retriever.fetch_all().await?;
        let manifest = self.manifest_for(&entries)?;

        let written = self.commit(entries, manifest).await?;
        tracing::info!("wrote {} documents to {}", written, self.store.path().display());

        Ok(SyncResult { written, ..SyncResult::new(operation, self.store.path(), action) })
    }

    fn manifest_for(&self, entries: &[DocumentEntry]) -> Result<Manifest> {
        if !entries.iter().any(DocumentEntry::is_document) {
            return Err(Error::Retrieval(format!("{} returned no documents", self.retriever.remote())));
        }
        Ok(Manifest::from_entries(self.retriever.remote(), self.retriever.kind(), entries))
    }

    async fn commit(&self, entries: Vec<DocumentEntry>, manifest: Manifest) -> Result<usize> {
        let store = self.store.clone();
        blocking(self.store.path(), move || store.replace(&entries, &manifest)).await
    }

    async fn lock_exclusive(&self) -> Result<StoreLock> {
        let root = self.store.path().to_path_buf();
        blocking(self.store.path(), move || StoreLock::exclusive(&root)).await
    }
}

/// Run filesystem work off the async executor.
async fn blocking<T, F>(path: &Path, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::io(path, std::io::Error::other(e)))?
}
