//! Core types and shared functionality for docsync.
//!
//! This crate provides:
//! - Directory-backed cache store with staged, atomic replacement
//! - The `Retriever` transport abstraction and the `Synchronizer`
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod retriever;
pub mod store;
pub mod sync;

pub use config::{AppConfig, ConfigError, SourceConfig, SourceKind};
pub use error::{Error, Result};
pub use retriever::Retriever;
pub use store::{CacheStore, DocumentEntry, Manifest, StoreState};
pub use sync::{SyncAction, SyncRequest, SyncResult, Synchronizer};
