//! Transport abstraction that populates a store.

use async_trait::async_trait;

use crate::config::SourceKind;
use crate::store::{CacheStore, DocumentEntry, Manifest};
use crate::Result;

/// Obtains documentation content from a remote source.
///
/// Implementations return the complete document set in memory; the
/// synchronizer writes it only after retrieval fully succeeded.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Transport this retriever uses.
    fn kind(&self) -> SourceKind;

    /// Stable identity of the remote, recorded in the store manifest.
    fn remote(&self) -> &str;

    /// Retrieve every document from the remote.
    async fn fetch_all(&self) -> Result<Vec<DocumentEntry>>;

    /// Bring a populated store up to date, returning the complete new set.
    ///
    /// `previous` is the store's manifest when it has one. The default
    /// re-fetches everything.
    async fn refresh(&self, store: &CacheStore, previous: Option<&Manifest>) -> Result<Vec<DocumentEntry>> {
        let _ = (store, previous);
        self.fetch_all().await
    }
}
