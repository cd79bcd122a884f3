//! User, document, and zettel management commands.

use std::path::Path;

use anyhow::{bail, Context, Result};
use uuid::Uuid;

use notekeep_core::embedding::ProviderRegistry;
use notekeep_core::error::CoreError;
use notekeep_core::maintenance::{self, IndexRequest};
use notekeep_core::models::{Document, UserConfig};
use notekeep_core::store::{DocumentStore, UserStore};

use crate::commands::App;
use crate::config::Config;
use crate::sqlite_store::Zettel;

/// Create or update a user's model selection. Supplied model ids are
/// validated against the registry before anything is written.
pub async fn run_user_set(
    config: &Config,
    user_id: &str,
    embedding_model: Option<String>,
    chat_model: Option<String>,
) -> Result<()> {
    if user_id.trim().is_empty() {
        bail!("user id must not be empty");
    }
    let app = App::open(config).await?;

    if let Some(model) = &embedding_model {
        app.providers.embedder(model)?;
    }
    if let Some(model) = &chat_model {
        app.providers.generator(model)?;
    }

    let existing = app.store.get_user(user_id).await?;
    let user = UserConfig {
        id: user_id.to_string(),
        embedding_model: embedding_model.or(existing.as_ref().and_then(|u| u.embedding_model.clone())),
        chat_model: chat_model.or(existing.and_then(|u| u.chat_model)),
    };
    app.store.upsert_user(&user).await?;

    println!(
        "User {}: embedding_model={}, chat_model={}",
        user.id,
        user.embedding_model.as_deref().unwrap_or("(unset)"),
        user.chat_model.as_deref().unwrap_or("(unset)")
    );
    Ok(())
}

pub async fn run_user_show(config: &Config, user_id: &str) -> Result<()> {
    let app = App::open(config).await?;
    let user = app
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| CoreError::UserNotFound(user_id.to_string()))?;
    println!(
        "User {}: embedding_model={}, chat_model={}",
        user.id,
        user.embedding_model.as_deref().unwrap_or("(unset)"),
        user.chat_model.as_deref().unwrap_or("(unset)")
    );
    Ok(())
}

/// Store a new document and index it.
pub async fn run_doc_add(
    config: &Config,
    user_id: &str,
    title: &str,
    file: Option<&Path>,
) -> Result<()> {
    let content = read_input(file)?;
    let app = App::open(config).await?;

    let document = Document {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        title: title.to_string(),
        content,
        deleted: false,
        updated_at: chrono::Utc::now().timestamp(),
    };
    app.store.upsert_document(&document).await?;

    let request = IndexRequest::update(user_id, &document.id);
    maintenance::apply(app.stores(), &app.providers, &request).await?;

    println!("Added document {}.", document.id);
    Ok(())
}

/// Soft-delete a document and drop its vectors from the index.
pub async fn run_doc_rm(config: &Config, document_id: &str) -> Result<()> {
    let app = App::open(config).await?;
    let document = app
        .store
        .get_document(document_id)
        .await?
        .ok_or_else(|| CoreError::DocumentNotFound(document_id.to_string()))?;

    app.store.mark_deleted(document_id).await?;
    let request = IndexRequest::delete(&document.user_id, document_id);
    maintenance::apply(app.stores(), &app.providers, &request).await?;

    println!("Deleted document {}.", document_id);
    Ok(())
}

pub async fn run_doc_show(config: &Config, document_id: &str) -> Result<()> {
    let app = App::open(config).await?;
    let document = app
        .store
        .get_document(document_id)
        .await?
        .ok_or_else(|| CoreError::DocumentNotFound(document_id.to_string()))?;

    println!("# {} ({})", document.title, document.id);
    if document.deleted {
        println!("(deleted)");
    }
    println!("{}", document.content);
    Ok(())
}

/// Capture a freeform note into the zettel inbox.
pub async fn run_zettel_add(config: &Config, user_id: &str, text: Option<String>) -> Result<()> {
    let content = match text {
        Some(text) => text,
        None => read_input(None)?,
    };
    if content.trim().is_empty() {
        bail!("zettel content must not be empty");
    }

    let app = App::open(config).await?;
    let zettel = Zettel {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        content,
        created_at: chrono::Utc::now().timestamp(),
    };
    app.store.add_zettel(&zettel).await?;
    println!("Captured zettel {}.", zettel.id);
    Ok(())
}

pub async fn run_zettel_list(config: &Config, user_id: &str) -> Result<()> {
    let app = App::open(config).await?;
    let zettels = app.store.zettels_for_user(user_id).await?;
    if zettels.is_empty() {
        println!("Inbox is empty.");
        return Ok(());
    }
    for zettel in zettels {
        println!("{}  {}", zettel.id, zettel.content.lines().next().unwrap_or(""));
    }
    Ok(())
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display())),
        None => {
            std::io::read_to_string(std::io::stdin()).with_context(|| "Failed to read from stdin")
        }
    }
}
