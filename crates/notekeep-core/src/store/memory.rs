//! In-memory store implementations for tests and embedded use.
//!
//! All four store traits are backed by `HashMap`s behind
//! `std::sync::RwLock`. Futures resolve immediately.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Document, UserConfig};

use super::{DocumentStore, IndexStore, LedgerStore, UserStore};

#[derive(Default)]
pub struct InMemoryUsers {
    users: RwLock<HashMap<String, UserConfig>>,
}

impl InMemoryUsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: UserConfig) {
        self.users.write().unwrap().insert(user.id.clone(), user);
    }
}

#[async_trait]
impl UserStore for InMemoryUsers {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserConfig>> {
        Ok(self.users.read().unwrap().get(user_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryDocuments {
    docs: RwLock<HashMap<String, Document>>,
}

impl InMemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, doc: Document) {
        self.docs.write().unwrap().insert(doc.id.clone(), doc);
    }

    pub fn remove(&self, document_id: &str) {
        self.docs.write().unwrap().remove(document_id);
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocuments {
    async fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
        Ok(self.docs.read().unwrap().get(document_id).cloned())
    }

    async fn documents_for_user(&self, user_id: &str) -> Result<Vec<Document>> {
        let mut docs: Vec<Document> = self
            .docs
            .read()
            .unwrap()
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(docs)
    }
}

#[derive(Default)]
pub struct InMemoryIndexBlobs {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    saves: RwLock<u64>,
}

impl InMemoryIndexBlobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls observed, for sequencing assertions.
    pub fn save_count(&self) -> u64 {
        *self.saves.read().unwrap()
    }

    pub fn put_raw(&self, user_id: &str, blob: Vec<u8>) {
        self.blobs.write().unwrap().insert(user_id.to_string(), blob);
    }
}

#[async_trait]
impl IndexStore for InMemoryIndexBlobs {
    async fn load(&self, user_id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().unwrap().get(user_id).cloned())
    }

    async fn save(&self, user_id: &str, blob: &[u8]) -> Result<()> {
        self.blobs
            .write()
            .unwrap()
            .insert(user_id.to_string(), blob.to_vec());
        *self.saves.write().unwrap() += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryLedger {
    entries: RwLock<HashMap<String, (String, Vec<String>)>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The union of every entry's vector ids, for invariant checks.
    pub fn all_vector_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .read()
            .unwrap()
            .values()
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn record(
        &self,
        user_id: &str,
        document_id: &str,
        vector_ids: &[String],
    ) -> Result<()> {
        self.entries.write().unwrap().insert(
            document_id.to_string(),
            (user_id.to_string(), vector_ids.to_vec()),
        );
        Ok(())
    }

    async fn lookup(&self, document_id: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .read()
            .unwrap()
            .get(document_id)
            .map(|(_, ids)| ids.clone())
            .unwrap_or_default())
    }

    async fn remove(&self, document_id: &str) -> Result<()> {
        self.entries.write().unwrap().remove(document_id);
        Ok(())
    }

    async fn clear_user(&self, user_id: &str) -> Result<()> {
        self.entries
            .write()
            .unwrap()
            .retain(|_, (uid, _)| uid != user_id);
        Ok(())
    }
}
