//! Index maintenance coordinator.
//!
//! One maintenance request comes in per invocation; the coordinator
//! decides which index operations to run, keeps the vector ledger in
//! step with the index, and owns load/save of the persisted blob.
//!
//! Request conditions are evaluated in precedence order, first match
//! wins:
//!
//! 1. delete vectors for one document
//! 2. update a single document (index exists, no recreate requested)
//! 3. update a batch of documents (partial-failure tolerant)
//! 4. recreate the index (explicit, or implicit when no index exists)
//! 5. nothing actionable: explicit no-op
//!
//! The delete-then-add sequencing inside an update is not transactional:
//! a crash mid-update can leave a document unindexed until the next
//! rebuild, which heals it. Two concurrent maintenance operations for
//! the same user are not supported; the caller must serialize them.

use crate::chunk::{split_document, MIN_CHUNK_CHARS};
use crate::embedding::{Embedder, ProviderRegistry};
use crate::error::{CoreError, CoreResult};
use crate::index::UserIndex;
use crate::store::{DocumentStore, IndexStore, LedgerStore, UserStore};

/// The collaborators every maintenance and retrieval call needs.
#[derive(Clone, Copy)]
pub struct Stores<'a> {
    pub users: &'a dyn UserStore,
    pub documents: &'a dyn DocumentStore,
    pub index_blobs: &'a dyn IndexStore,
    pub ledger: &'a dyn LedgerStore,
}

/// One incoming maintenance request.
#[derive(Debug, Clone, Default)]
pub struct IndexRequest {
    pub user_id: String,
    pub document_id: Option<String>,
    pub document_ids: Vec<String>,
    pub recreate_index: bool,
    pub delete_vectors: bool,
}

impl IndexRequest {
    pub fn update(user_id: &str, document_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            document_id: Some(document_id.to_string()),
            ..Self::default()
        }
    }

    pub fn update_batch(user_id: &str, document_ids: Vec<String>) -> Self {
        Self {
            user_id: user_id.to_string(),
            document_ids,
            ..Self::default()
        }
    }

    pub fn recreate(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            recreate_index: true,
            ..Self::default()
        }
    }

    pub fn delete(user_id: &str, document_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            document_id: Some(document_id.to_string()),
            delete_vectors: true,
            ..Self::default()
        }
    }
}

/// What a completed maintenance operation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// A document's vectors and ledger entry were removed.
    Deleted { document_id: String },
    /// Documents were re-chunked and re-embedded in place.
    Updated {
        documents: usize,
        vectors_added: usize,
    },
    /// The index was rebuilt from scratch.
    Recreated {
        documents: usize,
        vectors: usize,
    },
    /// No actionable condition in the request.
    NoOp,
}

/// Run one maintenance request to completion.
pub async fn apply(
    stores: Stores<'_>,
    registry: &dyn ProviderRegistry,
    req: &IndexRequest,
) -> CoreResult<IndexOutcome> {
    if req.user_id.trim().is_empty() {
        return Err(CoreError::ConfigInvalid("userId is required".to_string()));
    }

    let user = stores
        .users
        .get_user(&req.user_id)
        .await
        .map_err(CoreError::Persistence)?
        .ok_or_else(|| CoreError::UserNotFound(req.user_id.clone()))?;

    let model = user.embedding_model.ok_or_else(|| {
        CoreError::ConfigInvalid("no embedding model selected".to_string())
    })?;
    let embedder = registry.embedder(&model)?;

    let existing = load_index(stores, &req.user_id).await?;

    if req.delete_vectors {
        let document_id = req.document_id.as_ref().ok_or_else(|| {
            CoreError::ConfigInvalid("deleteVectors requires a documentId".to_string())
        })?;
        return delete_document(stores, existing, &req.user_id, document_id).await;
    }

    match existing {
        Some(mut index) if !req.recreate_index => {
            if let Some(document_id) = &req.document_id {
                let added = update_document(
                    stores,
                    embedder.as_ref(),
                    &mut index,
                    &req.user_id,
                    document_id,
                )
                .await?;
                save_index(stores, &req.user_id, &index).await?;
                Ok(IndexOutcome::Updated {
                    documents: 1,
                    vectors_added: added,
                })
            } else if !req.document_ids.is_empty() {
                let mut documents = 0;
                let mut vectors_added = 0;
                for document_id in &req.document_ids {
                    match update_document(
                        stores,
                        embedder.as_ref(),
                        &mut index,
                        &req.user_id,
                        document_id,
                    )
                    .await
                    {
                        Ok(added) => {
                            documents += 1;
                            vectors_added += added;
                        }
                        Err(e) => {
                            tracing::warn!(
                                document_id,
                                error = %e,
                                "skipping document in batch update"
                            );
                        }
                    }
                }
                save_index(stores, &req.user_id, &index).await?;
                Ok(IndexOutcome::Updated {
                    documents,
                    vectors_added,
                })
            } else {
                Ok(IndexOutcome::NoOp)
            }
        }
        _ => {
            // Recreate requested, or no usable index exists yet.
            let (_, documents, vectors) =
                recreate_index(stores, embedder.as_ref(), &req.user_id).await?;
            Ok(IndexOutcome::Recreated { documents, vectors })
        }
    }
}

/// Load and parse a user's persisted index. A missing or corrupt blob is
/// reported as absence so callers fall through to the rebuild path.
pub(crate) async fn load_index(
    stores: Stores<'_>,
    user_id: &str,
) -> CoreResult<Option<UserIndex>> {
    let blob = stores
        .index_blobs
        .load(user_id)
        .await
        .map_err(CoreError::Persistence)?;

    match blob {
        None => Ok(None),
        Some(blob) => match UserIndex::from_blob(&blob) {
            Ok(index) => Ok(Some(index)),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "index blob unreadable, treating as absent");
                Ok(None)
            }
        },
    }
}

async fn save_index(stores: Stores<'_>, user_id: &str, index: &UserIndex) -> CoreResult<()> {
    let blob = index.to_blob()?;
    stores
        .index_blobs
        .save(user_id, &blob)
        .await
        .map_err(CoreError::Persistence)
}

async fn delete_document(
    stores: Stores<'_>,
    existing: Option<UserIndex>,
    user_id: &str,
    document_id: &str,
) -> CoreResult<IndexOutcome> {
    let old_ids = stores
        .ledger
        .lookup(document_id)
        .await
        .map_err(CoreError::Persistence)?;

    match existing {
        Some(mut index) => {
            index.delete(&old_ids);
            stores
                .ledger
                .remove(document_id)
                .await
                .map_err(CoreError::Persistence)?;
            save_index(stores, user_id, &index).await?;
        }
        None => {
            // Nothing indexed; a stale ledger entry is still cleared.
            stores
                .ledger
                .remove(document_id)
                .await
                .map_err(CoreError::Persistence)?;
        }
    }

    Ok(IndexOutcome::Deleted {
        document_id: document_id.to_string(),
    })
}

/// Delete-then-add update for one document. Aborts on the first error;
/// the batch path catches and continues per document.
async fn update_document(
    stores: Stores<'_>,
    embedder: &dyn Embedder,
    index: &mut UserIndex,
    user_id: &str,
    document_id: &str,
) -> CoreResult<usize> {
    let doc = stores
        .documents
        .get_document(document_id)
        .await
        .map_err(CoreError::Persistence)?
        .ok_or_else(|| CoreError::DocumentNotFound(document_id.to_string()))?;

    let old_ids = stores
        .ledger
        .lookup(document_id)
        .await
        .map_err(CoreError::Persistence)?;
    index.delete(&old_ids);
    stores
        .ledger
        .remove(document_id)
        .await
        .map_err(CoreError::Persistence)?;

    let chunks = split_document(&doc.content, &doc.id, &doc.title);
    if chunks.is_empty() {
        return Ok(0);
    }

    let ids = index
        .add_chunks(embedder, &chunks)
        .await
        .map_err(CoreError::Upstream)?;
    stores
        .ledger
        .record(user_id, document_id, &ids)
        .await
        .map_err(CoreError::Persistence)?;

    Ok(ids.len())
}

/// Rebuild a user's index from every live document in the store,
/// replacing any existing index and ledger entries wholesale.
///
/// Returns the fresh index (already persisted) together with the number
/// of documents indexed and vectors added.
pub(crate) async fn recreate_index(
    stores: Stores<'_>,
    embedder: &dyn Embedder,
    user_id: &str,
) -> CoreResult<(UserIndex, usize, usize)> {
    let docs = stores
        .documents
        .documents_for_user(user_id)
        .await
        .map_err(CoreError::Persistence)?;

    let mut index = UserIndex::new();
    let mut entries: Vec<(String, Vec<String>)> = Vec::new();
    let mut documents = 0;

    for doc in &docs {
        if doc.deleted || doc.content.trim().chars().count() <= MIN_CHUNK_CHARS {
            continue;
        }
        let chunks = split_document(&doc.content, &doc.id, &doc.title);
        if chunks.is_empty() {
            continue;
        }
        match index.add_chunks(embedder, &chunks).await {
            Ok(ids) => {
                entries.push((doc.id.clone(), ids));
                documents += 1;
            }
            Err(e) => {
                tracing::warn!(document_id = %doc.id, error = %e, "skipping document in rebuild");
            }
        }
    }

    save_index(stores, user_id, &index).await?;

    stores
        .ledger
        .clear_user(user_id)
        .await
        .map_err(CoreError::Persistence)?;
    for (document_id, ids) in &entries {
        stores
            .ledger
            .record(user_id, document_id, ids)
            .await
            .map_err(CoreError::Persistence)?;
    }

    let vectors = index.len();
    Ok((index, documents, vectors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusClass;
    use crate::models::{Document, UserConfig};
    use crate::store::memory::{
        InMemoryDocuments, InMemoryIndexBlobs, InMemoryLedger, InMemoryUsers,
    };
    use crate::testutil::FakeRegistry;

    struct Fixture {
        users: InMemoryUsers,
        documents: InMemoryDocuments,
        index_blobs: InMemoryIndexBlobs,
        ledger: InMemoryLedger,
        registry: FakeRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let users = InMemoryUsers::new();
            users.insert(UserConfig {
                id: "u1".to_string(),
                embedding_model: Some("fake".to_string()),
                chat_model: None,
            });
            Self {
                users,
                documents: InMemoryDocuments::new(),
                index_blobs: InMemoryIndexBlobs::new(),
                ledger: InMemoryLedger::new(),
                registry: FakeRegistry::new(),
            }
        }

        fn stores(&self) -> Stores<'_> {
            Stores {
                users: &self.users,
                documents: &self.documents,
                index_blobs: &self.index_blobs,
                ledger: &self.ledger,
            }
        }

        fn add_document(&self, id: &str, content: &str) {
            self.documents.insert(Document {
                id: id.to_string(),
                user_id: "u1".to_string(),
                title: "T".to_string(),
                content: content.to_string(),
                deleted: false,
                updated_at: 0,
            });
        }

        async fn persisted_index(&self) -> UserIndex {
            let blob = self.index_blobs.load("u1").await.unwrap().unwrap();
            UserIndex::from_blob(&blob).unwrap()
        }

        async fn assert_ledger_matches_index(&self) {
            let mut index_ids = self.persisted_index().await.vector_ids();
            index_ids.sort();
            assert_eq!(
                self.ledger.all_vector_ids(),
                index_ids,
                "ledger vector ids must equal index contents"
            );
        }
    }

    #[tokio::test]
    async fn missing_index_triggers_recreate() {
        // One document, no index yet: the implicit rebuild path runs.
        let fx = Fixture::new();
        fx.add_document("d1", "# H\nSome content longer than twelve characters");

        let outcome = apply(fx.stores(), &fx.registry, &IndexRequest::update("u1", "d1"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            IndexOutcome::Recreated {
                documents: 1,
                vectors: 1
            }
        );
        let index = fx.persisted_index().await;
        assert_eq!(index.len(), 1);
        assert_eq!(fx.ledger.lookup("d1").await.unwrap(), index.vector_ids());
        fx.assert_ledger_matches_index().await;
    }

    #[tokio::test]
    async fn recreate_skips_deleted_and_short_documents() {
        let fx = Fixture::new();
        fx.add_document("d1", "# A\nlong enough content to index here");
        fx.add_document("d2", "short");
        fx.documents.insert(Document {
            id: "d3".to_string(),
            user_id: "u1".to_string(),
            title: "T".to_string(),
            content: "# B\nanother long enough body of content".to_string(),
            deleted: true,
            updated_at: 0,
        });

        let outcome = apply(fx.stores(), &fx.registry, &IndexRequest::recreate("u1"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            IndexOutcome::Recreated {
                documents: 1,
                vectors: 1
            }
        );
        assert!(fx.ledger.lookup("d2").await.unwrap().is_empty());
        assert!(fx.ledger.lookup("d3").await.unwrap().is_empty());
        fx.assert_ledger_matches_index().await;
    }

    #[tokio::test]
    async fn recreate_purges_stale_ledger_entries() {
        let fx = Fixture::new();
        fx.add_document("d1", "# A\nlong enough content to index here");
        fx.ledger
            .record("u1", "gone", &["v-old".to_string()])
            .await
            .unwrap();

        apply(fx.stores(), &fx.registry, &IndexRequest::recreate("u1"))
            .await
            .unwrap();

        assert!(fx.ledger.lookup("gone").await.unwrap().is_empty());
        fx.assert_ledger_matches_index().await;
    }

    #[tokio::test]
    async fn update_single_replaces_old_vectors() {
        let fx = Fixture::new();
        fx.add_document("d1", "# A\nfirst version of the document body");
        apply(fx.stores(), &fx.registry, &IndexRequest::recreate("u1"))
            .await
            .unwrap();
        let old_ids = fx.ledger.lookup("d1").await.unwrap();

        fx.add_document(
            "d1",
            "# A\nsecond version body\n# B\nnow with a second long section",
        );
        let outcome = apply(fx.stores(), &fx.registry, &IndexRequest::update("u1", "d1"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            IndexOutcome::Updated {
                documents: 1,
                vectors_added: 2
            }
        );
        let new_ids = fx.ledger.lookup("d1").await.unwrap();
        assert_eq!(new_ids.len(), 2);
        for id in &old_ids {
            assert!(!new_ids.contains(id), "old vector id survived update");
        }
        fx.assert_ledger_matches_index().await;
    }

    #[tokio::test]
    async fn update_missing_document_is_not_found() {
        let fx = Fixture::new();
        fx.add_document("d1", "# A\nlong enough content to index here");
        apply(fx.stores(), &fx.registry, &IndexRequest::recreate("u1"))
            .await
            .unwrap();

        let err = apply(fx.stores(), &fx.registry, &IndexRequest::update("u1", "nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::DocumentNotFound(_)));
        assert_eq!(err.status_class(), StatusClass::NotFound);
    }

    #[tokio::test]
    async fn batch_continues_past_failing_documents() {
        let fx = Fixture::new();
        fx.add_document("d1", "# A\nlong enough content to index here");
        fx.add_document("d2", "# B\nanother long enough body of content");
        apply(fx.stores(), &fx.registry, &IndexRequest::recreate("u1"))
            .await
            .unwrap();

        let req = IndexRequest::update_batch(
            "u1",
            vec!["d1".to_string(), "missing".to_string(), "d2".to_string()],
        );
        let outcome = apply(fx.stores(), &fx.registry, &req).await.unwrap();

        assert_eq!(
            outcome,
            IndexOutcome::Updated {
                documents: 2,
                vectors_added: 2
            }
        );
        fx.assert_ledger_matches_index().await;
    }

    #[tokio::test]
    async fn delete_removes_vectors_ledger_and_persists_once() {
        let fx = Fixture::new();
        fx.add_document("d1", "# A\nfirst long section body\n# B\nsecond long section body");
        apply(fx.stores(), &fx.registry, &IndexRequest::recreate("u1"))
            .await
            .unwrap();
        let ids = fx.ledger.lookup("d1").await.unwrap();
        assert_eq!(ids.len(), 2);
        let saves_before = fx.index_blobs.save_count();

        let outcome = apply(fx.stores(), &fx.registry, &IndexRequest::delete("u1", "d1"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            IndexOutcome::Deleted {
                document_id: "d1".to_string()
            }
        );
        assert!(fx.persisted_index().await.is_empty());
        assert!(fx.ledger.lookup("d1").await.unwrap().is_empty());
        assert_eq!(fx.index_blobs.save_count(), saves_before + 1);
        fx.assert_ledger_matches_index().await;
    }

    #[tokio::test]
    async fn delete_without_ledger_entry_silently_succeeds() {
        let fx = Fixture::new();
        fx.add_document("d1", "# A\nlong enough content to index here");
        apply(fx.stores(), &fx.registry, &IndexRequest::recreate("u1"))
            .await
            .unwrap();

        let outcome = apply(
            fx.stores(),
            &fx.registry,
            &IndexRequest::delete("u1", "never-indexed"),
        )
        .await
        .unwrap();
        assert!(matches!(outcome, IndexOutcome::Deleted { .. }));
        fx.assert_ledger_matches_index().await;
    }

    #[tokio::test]
    async fn delete_without_document_id_is_config_invalid() {
        // Malformed delete request must not fall through to a rebuild.
        let fx = Fixture::new();
        fx.add_document("d1", "# A\nlong enough content to index here");

        let req = IndexRequest {
            user_id: "u1".to_string(),
            delete_vectors: true,
            ..IndexRequest::default()
        };
        let err = apply(fx.stores(), &fx.registry, &req).await.unwrap_err();
        assert!(matches!(err, CoreError::ConfigInvalid(_)));
        assert!(fx.index_blobs.load("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_takes_precedence_over_recreate() {
        let fx = Fixture::new();
        fx.add_document("d1", "# A\nlong enough content to index here");
        apply(fx.stores(), &fx.registry, &IndexRequest::recreate("u1"))
            .await
            .unwrap();

        let mut req = IndexRequest::delete("u1", "d1");
        req.recreate_index = true;
        let outcome = apply(fx.stores(), &fx.registry, &req).await.unwrap();
        assert!(matches!(outcome, IndexOutcome::Deleted { .. }));
    }

    #[tokio::test]
    async fn empty_request_with_existing_index_is_noop() {
        let fx = Fixture::new();
        fx.add_document("d1", "# A\nlong enough content to index here");
        apply(fx.stores(), &fx.registry, &IndexRequest::recreate("u1"))
            .await
            .unwrap();
        let saves_before = fx.index_blobs.save_count();

        let req = IndexRequest {
            user_id: "u1".to_string(),
            ..IndexRequest::default()
        };
        let outcome = apply(fx.stores(), &fx.registry, &req).await.unwrap();
        assert_eq!(outcome, IndexOutcome::NoOp);
        assert_eq!(fx.index_blobs.save_count(), saves_before);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let fx = Fixture::new();
        let err = apply(
            fx.stores(),
            &fx.registry,
            &IndexRequest::recreate("stranger"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CoreError::UserNotFound(_)));
        assert_eq!(err.status_class(), StatusClass::NotFound);
    }

    #[tokio::test]
    async fn missing_embedding_model_is_config_invalid() {
        let fx = Fixture::new();
        fx.users.insert(UserConfig {
            id: "u2".to_string(),
            embedding_model: None,
            chat_model: None,
        });
        let err = apply(fx.stores(), &fx.registry, &IndexRequest::recreate("u2"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ConfigInvalid(_)));
        assert_eq!(err.status_class(), StatusClass::BadRequest);
    }

    #[tokio::test]
    async fn blank_user_id_is_config_invalid() {
        let fx = Fixture::new();
        let err = apply(fx.stores(), &fx.registry, &IndexRequest::recreate("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ConfigInvalid(_)));
    }

    #[tokio::test]
    async fn corrupt_blob_falls_back_to_recreate() {
        let fx = Fixture::new();
        fx.add_document("d1", "# A\nlong enough content to index here");
        fx.index_blobs.put_raw("u1", b"garbage".to_vec());

        let outcome = apply(fx.stores(), &fx.registry, &IndexRequest::update("u1", "d1"))
            .await
            .unwrap();
        assert!(matches!(outcome, IndexOutcome::Recreated { .. }));
        fx.assert_ledger_matches_index().await;
    }

    #[tokio::test]
    async fn update_to_short_content_drops_all_vectors() {
        let fx = Fixture::new();
        fx.add_document("d1", "# A\nlong enough content to index here");
        apply(fx.stores(), &fx.registry, &IndexRequest::recreate("u1"))
            .await
            .unwrap();

        fx.add_document("d1", "tiny");
        let outcome = apply(fx.stores(), &fx.registry, &IndexRequest::update("u1", "d1"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            IndexOutcome::Updated {
                documents: 1,
                vectors_added: 0
            }
        );
        assert!(fx.persisted_index().await.is_empty());
        assert!(fx.ledger.lookup("d1").await.unwrap().is_empty());
        fx.assert_ledger_matches_index().await;
    }
}
