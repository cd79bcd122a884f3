//! Storage abstraction for notekeep.
//!
//! Four narrow traits cover everything the core pipeline touches: user
//! configuration, documents, persisted index blobs, and the
//! document-to-vector-id ledger. Implementations must be `Send + Sync`;
//! the app crate provides a SQLite backend, [`memory`] an in-memory one
//! for tests and embedded use.
//!
//! Trait methods return `anyhow::Result`; the maintenance coordinator
//! wraps failures as [`CoreError::Persistence`](crate::error::CoreError),
//! which is always fatal for the current operation.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Document, UserConfig};

/// Per-user configuration lookup.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserConfig>>;
}

/// Read access to stored documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, document_id: &str) -> Result<Option<Document>>;

    /// Every document belonging to a user, including deleted ones; the
    /// rebuild path filters those itself.
    async fn documents_for_user(&self, user_id: &str) -> Result<Vec<Document>>;
}

/// Persistence for opaque index blobs, keyed by user id.
///
/// `load` signals absence as `Ok(None)` rather than an error so callers
/// can branch on "build fresh" vs "index exists".
#[async_trait]
pub trait IndexStore: Send + Sync {
    async fn load(&self, user_id: &str) -> Result<Option<Vec<u8>>>;
    async fn save(&self, user_id: &str, blob: &[u8]) -> Result<()>;
}

/// The document-id → vector-ids ledger enabling targeted deletion.
///
/// Invariant (restored by the end of every maintenance operation): the
/// union of all ledger entries for a user equals the set of vector ids
/// in that user's index.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Overwrite the entry for a document.
    async fn record(&self, user_id: &str, document_id: &str, vector_ids: &[String])
        -> Result<()>;

    /// Vector ids recorded for a document; empty when absent.
    async fn lookup(&self, document_id: &str) -> Result<Vec<String>>;

    /// Delete the entry for a document. No-op when absent.
    async fn remove(&self, document_id: &str) -> Result<()>;

    /// Delete every entry belonging to a user. Used by the rebuild path
    /// so entries for documents that no longer index don't linger.
    async fn clear_user(&self, user_id: &str) -> Result<()>;
}
