use std::path::Path;

use anyhow::{Context, Result};

use notekeep_core::error::CoreError;
use notekeep_core::insert;
use notekeep_core::maintenance::{self, IndexRequest};
use notekeep_core::models::InsertSuggestion;
use notekeep_core::store::DocumentStore;

use crate::commands::App;
use crate::config::Config;

/// Apply a batch of insert suggestions (as printed by `nk suggest`):
/// splice each snippet into its target document, delete the consumed
/// zettels, and reindex the touched documents.
///
/// A suggestion whose anchor no longer matches its document is skipped
/// with a warning; the rest of the batch proceeds.
pub async fn run_apply(config: &Config, user_id: &str, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read suggestions file: {}", file.display()))?;
    let suggestions: Vec<InsertSuggestion> =
        serde_json::from_str(&content).with_context(|| "Failed to parse suggestions file")?;

    let app = App::open(config).await?;

    let mut consumed_zettels = Vec::new();
    let mut touched = Vec::new();
    let mut skipped = 0usize;

    for suggestion in &suggestions {
        let document = app
            .store
            .get_document(&suggestion.document_id)
            .await?
            .ok_or_else(|| CoreError::DocumentNotFound(suggestion.document_id.clone()))?;

        match insert::splice(&document.content, suggestion) {
            Ok(spliced) => {
                app.store
                    .update_document_content(&document.id, &spliced)
                    .await?;
                consumed_zettels.extend(suggestion.zettel_ids.iter().cloned());
                if !touched.contains(&document.id) {
                    touched.push(document.id);
                }
            }
            Err(CoreError::NoInsertPoint(document_id)) => {
                tracing::warn!(document_id, "anchor no longer matches, skipping suggestion");
                skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    if !consumed_zettels.is_empty() {
        app.store.delete_zettels(&consumed_zettels).await?;
    }

    if !touched.is_empty() {
        let request = IndexRequest::update_batch(user_id, touched.clone());
        maintenance::apply(app.stores(), &app.providers, &request).await?;
    }

    println!(
        "Applied {} suggestion(s) into {} document(s), {} skipped.",
        suggestions.len() - skipped,
        touched.len(),
        skipped
    );
    Ok(())
}
