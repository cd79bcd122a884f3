//! Core data models used throughout notekeep.
//!
//! These types represent the users, documents, chunks, and suggestions that
//! flow through the indexing, retrieval, and insert pipelines.

use serde::{Deserialize, Serialize};

/// Per-user configuration held by the user store.
///
/// Model selection is per user: both fields are optional, and operations
/// that need a capability report `ConfigInvalid` when the corresponding
/// model is unset.
#[derive(Debug, Clone)]
pub struct UserConfig {
    pub id: String,
    /// Embedding model identifier (e.g. `"text-embedding-3-small"`).
    pub embedding_model: Option<String>,
    /// Chat model identifier (e.g. `"gpt-4o-mini"`).
    pub chat_model: Option<String>,
}

/// A stored document, owned by the document store.
///
/// The core treats documents as read-only input; the apply step mutates
/// `content` through the store, never in place.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub deleted: bool,
    /// Last modification, Unix seconds.
    pub updated_at: i64,
}

/// A retrieval-sized passage derived from one document.
///
/// Ephemeral: produced by the chunker on every index build and consumed by
/// the embedding step. `embed_text` is prefixed with the document title for
/// embedding context; `original_text` is the unprefixed segment and must
/// stay byte-identical to the source substring so the insert resolver can
/// locate it later.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub document_id: String,
    pub title: String,
    pub embed_text: String,
    pub original_text: String,
}

/// A ranked passage returned from retrieval, with provenance.
#[derive(Debug, Clone, Serialize)]
pub struct Passage {
    #[serde(rename = "documentId")]
    pub document_id: String,
    pub title: String,
    /// The chunk's original (unprefixed) text.
    pub content: String,
    pub score: f32,
}

/// A freeform captured note snippet with its embedding.
///
/// Carries one source id when freshly captured; merged snippets carry the
/// ids of every member they absorbed.
#[derive(Debug, Clone)]
pub struct NoteSnippet {
    pub ids: Vec<String>,
    pub vector: Vec<f32>,
    pub text: String,
}

/// A group of semantically similar snippets produced by clustering.
#[derive(Debug, Clone)]
pub struct NoteCluster {
    pub members: Vec<NoteSnippet>,
}

/// Output of the insert-position resolver: where a snippet should go.
///
/// `similarity_search_result` is the matched existing fragment used later
/// to compute the splice offset. Field names on the wire keep the original
/// client-facing camelCase shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertSuggestion {
    #[serde(rename = "documentId")]
    pub document_id: String,
    #[serde(rename = "documentTitle")]
    pub document_title: String,
    pub content: String,
    #[serde(rename = "similaritySearchResult")]
    pub similarity_search_result: String,
    #[serde(rename = "zettelIds", default)]
    pub zettel_ids: Vec<String>,
}
