//! Transports for docsync.
//!
//! This crate provides the HTTP fetch pipeline, the page crawler and the git
//! mirror, each implementing [`docsync_core::Retriever`].

pub mod crawl;
pub mod fetch;
pub mod git;
pub mod retry;

#[cfg(test)]
mod test_server;

use docsync_core::{AppConfig, Retriever, SourceConfig, SourceKind};

pub use crawl::{CrawlOptions, PageCrawler};
pub use fetch::{FetchClient, FetchConfig, FetchError, FetchResponse, Fetched, Validators};
pub use git::{GitError, GitMirror};
pub use retry::RetryPolicy;

/// Build the retriever for a configured source.
pub fn retriever_for(config: &AppConfig, source: &SourceConfig) -> docsync_core::Result<Box<dyn Retriever>> {
    match source.kind {
        SourceKind::Pages => Ok(Box::new(PageCrawler::from_config(config, source)?)),
        SourceKind::Git => Ok(Box::new(GitMirror::from_config(config, source))),
    }
}
