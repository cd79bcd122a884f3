//! End-to-end pipeline tests over a real SQLite database.
//!
//! Drives the core pipeline through the SQLite adapter with a
//! deterministic embedder: document indexing and search, vector cleanup
//! on delete, and the zettel cluster-suggest-apply workflow.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use notekeep::config::{Config, DbConfig};
use notekeep::db;
use notekeep::sqlite_store::{SqliteStore, Zettel};
use notekeep_core::cluster::{self, CLUSTER_EPS};
use notekeep_core::embedding::{Embedder, ProviderRegistry, TextGenerator};
use notekeep_core::error::CoreError;
use notekeep_core::insert::{self, InsertStrategy};
use notekeep_core::maintenance::{self, IndexRequest, Stores};
use notekeep_core::models::{Document, NoteSnippet, UserConfig};
use notekeep_core::retrieval;

/// Embeds text as a letter-frequency vector, so identical texts match
/// exactly and word overlap raises similarity.
struct LetterFrequencyEmbedder;

fn letter_frequency(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; 26];
    for c in text.to_lowercase().chars() {
        if c.is_ascii_lowercase() {
            v[(c as u8 - b'a') as usize] += 1.0;
        }
    }
    v
}

#[async_trait]
impl Embedder for LetterFrequencyEmbedder {
    fn model_name(&self) -> &str {
        "letter-frequency"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(letter_frequency(text))
    }
}

struct EchoGenerator;

#[async_trait]
impl TextGenerator for EchoGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        Ok(prompt.to_string())
    }
}

struct TestRegistry;

impl ProviderRegistry for TestRegistry {
    fn embedder(&self, model: &str) -> Result<Arc<dyn Embedder>, CoreError> {
        match model {
            "letter-frequency" => Ok(Arc::new(LetterFrequencyEmbedder)),
            other => Err(CoreError::ConfigInvalid(format!(
                "unknown embedding model '{}'",
                other
            ))),
        }
    }

    fn generator(&self, model: &str) -> Result<Arc<dyn TextGenerator>, CoreError> {
        match model {
            "echo" => Ok(Arc::new(EchoGenerator)),
            other => Err(CoreError::ConfigInvalid(format!(
                "unknown chat model '{}'",
                other
            ))),
        }
    }
}

async fn setup() -> (tempfile::TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        db: DbConfig {
            path: dir.path().join("pipeline.db"),
        },
        http: Default::default(),
        openai: Default::default(),
        ollama: Default::default(),
    };
    let pool = db::connect(&config).await.unwrap();
    db::run_migrations(&pool).await.unwrap();

    let store = SqliteStore::new(pool);
    store
        .upsert_user(&UserConfig {
            id: "u1".to_string(),
            embedding_model: Some("letter-frequency".to_string()),
            chat_model: Some("echo".to_string()),
        })
        .await
        .unwrap();
    (dir, store)
}

fn stores(store: &SqliteStore) -> Stores<'_> {
    Stores {
        users: store,
        documents: store,
        index_blobs: store,
        ledger: store,
    }
}

async fn add_document(store: &SqliteStore, id: &str, title: &str, content: &str) {
    store
        .upsert_document(&Document {
            id: id.to_string(),
            user_id: "u1".to_string(),
            title: title.to_string(),
            content: content.to_string(),
            deleted: false,
            updated_at: 1,
        })
        .await
        .unwrap();
    let request = IndexRequest::update("u1", id);
    maintenance::apply(stores(store), &TestRegistry, &request)
        .await
        .unwrap();
}

#[tokio::test]
async fn indexed_documents_are_searchable() {
    let (_dir, store) = setup().await;
    add_document(
        &store,
        "cooking",
        "Cooking",
        "# Sauces\nsimmer the pasta sauce with garlic and basil",
    )
    .await;
    add_document(
        &store,
        "hiking",
        "Hiking",
        "# Packing\nboots and map for the mountain hiking weekend",
    )
    .await;

    let results = retrieval::search(stores(&store), &TestRegistry, "u1", "pasta sauce garlic", 3)
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].document_id, "cooking");
}

#[tokio::test]
async fn deleting_a_document_drops_its_passages() {
    let (_dir, store) = setup().await;
    add_document(
        &store,
        "cooking",
        "Cooking",
        "# Sauces\nsimmer the pasta sauce with garlic and basil",
    )
    .await;

    store.mark_deleted("cooking").await.unwrap();
    let request = IndexRequest::delete("u1", "cooking");
    maintenance::apply(stores(&store), &TestRegistry, &request)
        .await
        .unwrap();

    let results = retrieval::search(stores(&store), &TestRegistry, "u1", "pasta sauce garlic", 3)
        .await
        .unwrap();
    assert!(results.iter().all(|p| p.document_id != "cooking"));
}

#[tokio::test]
async fn recreate_survives_a_corrupt_blob() {
    let (_dir, store) = setup().await;
    add_document(
        &store,
        "cooking",
        "Cooking",
        "# Sauces\nsimmer the pasta sauce with garlic and basil",
    )
    .await;

    // Clobber the persisted blob; the next search must rebuild.
    use notekeep_core::store::IndexStore;
    store.save("u1", b"not json at all").await.unwrap();

    let results = retrieval::search(stores(&store), &TestRegistry, "u1", "pasta sauce garlic", 3)
        .await
        .unwrap();
    assert_eq!(results[0].document_id, "cooking");
}

#[tokio::test]
async fn zettel_inbox_flows_into_an_applied_suggestion() {
    let (_dir, store) = setup().await;
    let original = "# Sauces\nsimmer the pasta sauce with garlic and basil";
    add_document(&store, "cooking", "Cooking", original).await;
    add_document(
        &store,
        "hiking",
        "Hiking",
        "# Packing\nboots and map for the mountain hiking weekend",
    )
    .await;

    // Two near-identical captures and one unrelated one.
    for (id, content) in [
        ("z1", "try more garlic in the sauce"),
        ("z2", "try more garlic in the sauce!"),
        ("z3", "replace worn boot laces before the next hike"),
    ] {
        store
            .add_zettel(&Zettel {
                id: id.to_string(),
                user_id: "u1".to_string(),
                content: content.to_string(),
                created_at: 1,
            })
            .await
            .unwrap();
    }

    let embedder = LetterFrequencyEmbedder;
    let zettels = store.zettels_for_user("u1").await.unwrap();
    let mut snippets = Vec::new();
    for zettel in &zettels {
        snippets.push(NoteSnippet {
            ids: vec![zettel.id.clone()],
            vector: embedder.embed(&zettel.content).await.unwrap(),
            text: zettel.content.clone(),
        });
    }

    let clusters = cluster::cluster_snippets(&snippets, CLUSTER_EPS);
    let merged = cluster::merge_clusters(&embedder, clusters).await.unwrap();
    // z1 and z2 collapse, z3 stays separate.
    assert_eq!(merged.len(), 2);

    let suggestions = insert::suggest_insertions(
        stores(&store),
        &TestRegistry,
        "u1",
        &merged,
        InsertStrategy::TopRanked,
    )
    .await
    .unwrap();
    assert_eq!(suggestions.len(), 2);

    let sauce = suggestions
        .iter()
        .find(|s| s.content.contains("garlic"))
        .unwrap();
    assert_eq!(sauce.document_id, "cooking");
    assert_eq!(sauce.zettel_ids, vec!["z1".to_string(), "z2".to_string()]);

    use notekeep_core::store::DocumentStore;
    let document = store.get_document("cooking").await.unwrap().unwrap();
    let spliced = insert::splice(&document.content, sauce).unwrap();
    assert!(spliced.contains("try more garlic in the sauce"));
    assert!(spliced.contains("# Sauces"));
    store
        .update_document_content("cooking", &spliced)
        .await
        .unwrap();
    store.delete_zettels(&sauce.zettel_ids).await.unwrap();

    // Reindex the touched document; the new content must be retrievable.
    let request = IndexRequest::update_batch("u1", vec!["cooking".to_string()]);
    maintenance::apply(stores(&store), &TestRegistry, &request)
        .await
        .unwrap();

    let remaining = store.zettels_for_user("u1").await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "z3");
}
