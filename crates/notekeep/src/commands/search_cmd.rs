use anyhow::Result;

use notekeep_core::retrieval::{self, SEARCH_K};

use crate::commands::App;
use crate::config::Config;

/// Semantic search over a user's documents.
pub async fn run_search(config: &Config, user_id: &str, query: &str) -> Result<()> {
    let app = App::open(config).await?;

    let passages = retrieval::search(app.stores(), &app.providers, user_id, query, SEARCH_K).await?;
    if passages.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (rank, passage) in passages.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} ({})",
            rank + 1,
            passage.score,
            passage.title,
            passage.document_id
        );
        println!("   {}", snippet(&passage.content, 200));
    }
    Ok(())
}

/// First `max_chars` of a passage, on one line.
fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = flat.chars().take(max_chars).collect();
    if truncated.chars().count() < flat.chars().count() {
        format!("{}…", truncated)
    } else {
        truncated
    }
}
