use anyhow::Result;

use notekeep_core::cluster::{self, CLUSTER_EPS};
use notekeep_core::embedding::ProviderRegistry;
use notekeep_core::error::CoreError;
use notekeep_core::insert::{self, InsertStrategy};
use notekeep_core::models::NoteSnippet;
use notekeep_core::store::UserStore;

use crate::commands::App;
use crate::config::Config;

/// Turn a user's zettel inbox into insert suggestions: embed each
/// snippet, cluster near-duplicates, merge each cluster, and resolve a
/// target document per merged snippet. Prints the suggestions as JSON
/// for `nk apply`.
pub async fn run_suggest(config: &Config, user_id: &str, rerank: bool) -> Result<()> {
    let app = App::open(config).await?;

    let zettels = app.store.zettels_for_user(user_id).await?;
    if zettels.is_empty() {
        println!("[]");
        return Ok(());
    }

    let user = app
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| CoreError::UserNotFound(user_id.to_string()))?;
    let model = user
        .embedding_model
        .ok_or_else(|| CoreError::ConfigInvalid("no embedding model selected".to_string()))?;
    let embedder = app.providers.embedder(&model)?;

    let mut snippets = Vec::with_capacity(zettels.len());
    for zettel in &zettels {
        let vector = embedder
            .embed(&zettel.content)
            .await
            .map_err(CoreError::Upstream)?;
        snippets.push(NoteSnippet {
            ids: vec![zettel.id.clone()],
            vector,
            text: zettel.content.clone(),
        });
    }

    let clusters = cluster::cluster_snippets(&snippets, CLUSTER_EPS);
    tracing::debug!(
        user_id,
        snippets = snippets.len(),
        clusters = clusters.len(),
        "clustered zettel inbox"
    );
    let merged = cluster::merge_clusters(embedder.as_ref(), clusters).await?;

    let strategy = if rerank {
        InsertStrategy::GenerativeRerank
    } else {
        InsertStrategy::TopRanked
    };
    let suggestions =
        insert::suggest_insertions(app.stores(), &app.providers, user_id, &merged, strategy)
            .await?;

    println!("{}", serde_json::to_string_pretty(&suggestions)?);
    Ok(())
}
