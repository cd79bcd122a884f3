use anyhow::Result;

use notekeep_core::embedding::ProviderRegistry;
use notekeep_core::error::CoreError;
use notekeep_core::retrieval::{self, SEARCH_K};
use notekeep_core::store::UserStore;

use crate::commands::App;
use crate::config::Config;

/// Answer a question using the user's own notes as context.
pub async fn run_ask(config: &Config, user_id: &str, question: &str) -> Result<()> {
    let app = App::open(config).await?;

    let passages =
        retrieval::search(app.stores(), &app.providers, user_id, question, SEARCH_K).await?;

    let user = app
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| CoreError::UserNotFound(user_id.to_string()))?;
    let chat_model = user
        .chat_model
        .ok_or_else(|| CoreError::ConfigInvalid("no chat model selected".to_string()))?;
    let generator = app.providers.generator(&chat_model)?;

    let reply = generator.generate(&build_prompt(question, passages.iter().map(|p| p.content.as_str())))
        .await
        .map_err(CoreError::Upstream)?;
    println!("{}", reply);
    Ok(())
}

fn build_prompt<'a>(question: &str, context: impl Iterator<Item = &'a str>) -> String {
    let mut prompt = String::from(
        "Based on the context provided, answer the following question in valid markdown syntax: ",
    );
    prompt.push_str(question);
    prompt.push_str("\n\nContext:\n");
    for (i, passage) in context.enumerate() {
        if i > 0 {
            prompt.push_str("\n\n");
        }
        prompt.push_str(passage);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_question_and_passages() {
        let prompt = build_prompt("what is x?", ["first passage", "second passage"].into_iter());
        assert!(prompt.starts_with("Based on the context provided"));
        assert!(prompt.contains("what is x?"));
        assert!(prompt.contains("first passage\n\nsecond passage"));
    }

    #[test]
    fn prompt_with_no_context_still_asks() {
        let prompt = build_prompt("what is x?", std::iter::empty());
        assert!(prompt.contains("what is x?"));
        assert!(prompt.ends_with("Context:\n"));
    }
}
