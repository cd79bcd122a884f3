//! Per-user nearest-neighbor index over chunk embeddings.
//!
//! [`UserIndex`] is a flat list of (vector, metadata) entries searched by
//! brute-force cosine similarity. One index exists per user; it is
//! serialized wholesale into an opaque blob and persisted through the
//! [`IndexStore`](crate::store::IndexStore) collaborator.
//!
//! Vector ids are opaque UUIDs assigned on insert. Deletion is by id and
//! a no-op for ids already absent, which lets the maintenance coordinator
//! replay deletes without tracking prior outcomes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embedding::{cosine_similarity, Embedder};
use crate::models::Chunk;

/// Provenance metadata stored alongside each vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub document_id: String,
    pub title: String,
    /// The chunk's original (unprefixed) text.
    pub original_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorEntry {
    id: String,
    vector: Vec<f32>,
    meta: ChunkMeta,
}

/// One user's vector index. Insertion order is preserved and breaks
/// similarity-score ties in [`UserIndex::query`].
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UserIndex {
    entries: Vec<VectorEntry>,
}

impl UserIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embed each chunk's embeddable text and insert one entry per chunk.
    ///
    /// Returns the assigned vector ids in input order.
    pub async fn add_chunks(
        &mut self,
        embedder: &dyn Embedder,
        chunks: &[Chunk],
    ) -> Result<Vec<String>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.embed_text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        let mut ids = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let id = Uuid::new_v4().to_string();
            self.entries.push(VectorEntry {
                id: id.clone(),
                vector,
                meta: ChunkMeta {
                    document_id: chunk.document_id.clone(),
                    title: chunk.title.clone(),
                    original_text: chunk.original_text.clone(),
                },
            });
            ids.push(id);
        }
        Ok(ids)
    }

    /// Remove entries by vector id. Ids not present are ignored.
    pub fn delete(&mut self, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        self.entries.retain(|e| !ids.iter().any(|id| id == &e.id));
    }

    /// Embed `text` and return the `k` most similar entries.
    pub async fn query(
        &self,
        embedder: &dyn Embedder,
        text: &str,
        k: usize,
    ) -> Result<Vec<(ChunkMeta, f32)>> {
        let query_vec = embedder.embed(text).await?;
        Ok(self.query_by_vector(&query_vec, k))
    }

    /// Rank all entries against a pre-computed query vector,
    /// most-similar first. Ties keep insertion order (stable sort).
    pub fn query_by_vector(&self, query_vec: &[f32], k: usize) -> Vec<(ChunkMeta, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query_vec, &e.vector)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| (self.entries[i].meta.clone(), score))
            .collect()
    }

    /// All vector ids currently in the index, in insertion order.
    pub fn vector_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    /// Serialize the whole index into an opaque blob.
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("failed to serialize index blob")
    }

    /// Deserialize an index blob. Callers treat failure as absence, not
    /// as a fatal error (corrupt blobs trigger the rebuild path).
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        serde_json::from_slice(blob).context("failed to parse index blob")
    }
}
