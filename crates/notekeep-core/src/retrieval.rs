//! Similarity retrieval over a user's index.
//!
//! [`search`] is the one entry point all consumers share: semantic search
//! and chat use `k = 3`, the insert resolver uses `k = 5`. It loads the
//! persisted index, lazily rebuilding it when absent, runs the
//! similarity query, and maps each hit's stored metadata back to a
//! [`Passage`] whose `content` is the chunk's original, unprefixed text.
//!
//! Read-only: apart from the lazy rebuild, no index state is mutated, and
//! results are deterministic for a fixed index and embedding model.

use crate::error::{CoreError, CoreResult};
use crate::maintenance::{self, Stores};
use crate::embedding::ProviderRegistry;
use crate::models::Passage;

/// Number of passages retrieved for semantic search and chat context.
pub const SEARCH_K: usize = 3;

/// Run a similarity query for one user and return ranked passages.
pub async fn search(
    stores: Stores<'_>,
    registry: &dyn ProviderRegistry,
    user_id: &str,
    query: &str,
    k: usize,
) -> CoreResult<Vec<Passage>> {
    if user_id.trim().is_empty() {
        return Err(CoreError::ConfigInvalid("userId is required".to_string()));
    }
    if query.trim().is_empty() {
        return Err(CoreError::ConfigInvalid(
            "searchString is required".to_string(),
        ));
    }

    let user = stores
        .users
        .get_user(user_id)
        .await
        .map_err(CoreError::Persistence)?
        .ok_or_else(|| CoreError::UserNotFound(user_id.to_string()))?;
    let model = user.embedding_model.ok_or_else(|| {
        CoreError::ConfigInvalid("no embedding model selected".to_string())
    })?;
    let embedder = registry.embedder(&model)?;

    let index = match maintenance::load_index(stores, user_id).await? {
        Some(index) => index,
        None => {
            let (index, documents, vectors) =
                maintenance::recreate_index(stores, embedder.as_ref(), user_id).await?;
            tracing::debug!(user_id, documents, vectors, "built missing index for search");
            index
        }
    };

    let hits = index
        .query(embedder.as_ref(), query, k)
        .await
        .map_err(CoreError::Upstream)?;

    Ok(hits
        .into_iter()
        .map(|(meta, score)| Passage {
            document_id: meta.document_id,
            title: meta.title,
            content: meta.original_text,
            score,
        })
        .collect())
}
