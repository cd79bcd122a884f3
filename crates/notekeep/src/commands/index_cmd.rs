use anyhow::{bail, Result};

use notekeep_core::maintenance::{self, IndexOutcome, IndexRequest};

use crate::commands::App;
use crate::config::Config;

/// Run one index maintenance pass for a user.
pub async fn run_index(
    config: &Config,
    user_id: &str,
    documents: Vec<String>,
    recreate: bool,
    delete: bool,
) -> Result<()> {
    let app = App::open(config).await?;

    let request = if delete {
        let document_id = match documents.as_slice() {
            [one] => one,
            _ => bail!("--delete requires exactly one --document"),
        };
        IndexRequest::delete(user_id, document_id)
    } else if recreate {
        IndexRequest::recreate(user_id)
    } else {
        match documents.as_slice() {
            [one] => IndexRequest::update(user_id, one),
            _ => IndexRequest::update_batch(user_id, documents.clone()),
        }
    };

    let outcome = maintenance::apply(app.stores(), &app.providers, &request).await?;
    match outcome {
        IndexOutcome::Deleted { document_id } => {
            println!("Removed vectors for document {}.", document_id);
        }
        IndexOutcome::Updated {
            documents,
            vectors_added,
        } => {
            println!(
                "Updated {} document(s), {} vector(s) added.",
                documents, vectors_added
            );
        }
        IndexOutcome::Recreated { documents, vectors } => {
            println!(
                "Rebuilt index from {} document(s), {} vector(s).",
                documents, vectors
            );
        }
        IndexOutcome::NoOp => {
            println!("Nothing to do.");
        }
    }
    Ok(())
}
