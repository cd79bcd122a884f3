//! Text generation providers for chat answers and insert reranking.
//!
//! Same retry policy as the embedding providers; see
//! [`crate::embedding`].

use anyhow::Result;
use async_trait::async_trait;

use notekeep_core::embedding::TextGenerator;

use crate::embedding::{post_json_with_retry, OpenAiChatModel};

/// Generator calling the OpenAI `POST /v1/chat/completions` endpoint.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: OpenAiChatModel,
    max_retries: u32,
}

impl OpenAiGenerator {
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        api_key: String,
        model: OpenAiChatModel,
        max_retries: u32,
    ) -> Self {
        Self {
            client,
            base_url,
            api_key,
            model,
            max_retries,
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model.as_str(),
            "messages": [{"role": "user", "content": prompt}],
        });
        let json = post_json_with_retry(
            &self.client,
            &format!("{}/v1/chat/completions", self.base_url),
            Some(&self.api_key),
            &body,
            self.max_retries,
        )
        .await?;
        parse_openai_reply(&json)
    }
}

fn parse_openai_reply(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))
}

/// Generator calling a local Ollama instance's `POST /api/generate`
/// endpoint (non-streaming).
pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    max_retries: u32,
}

impl OllamaGenerator {
    pub fn new(client: reqwest::Client, url: String, model: String, max_retries: u32) -> Self {
        Self {
            client,
            url,
            model,
            max_retries,
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        let json = post_json_with_retry(
            &self.client,
            &format!("{}/api/generate", self.url),
            None,
            &body,
            self.max_retries,
        )
        .await?;
        parse_ollama_reply(&json)
    }
}

fn parse_ollama_reply(json: &serde_json::Value) -> Result<String> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_reply_parses() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "the answer"}}]
        });
        assert_eq!(parse_openai_reply(&json).unwrap(), "the answer");
    }

    #[test]
    fn openai_reply_without_choices_is_error() {
        assert!(parse_openai_reply(&serde_json::json!({"choices": []})).is_err());
    }

    #[test]
    fn ollama_reply_parses() {
        let json = serde_json::json!({"response": "the answer", "done": true});
        assert_eq!(parse_ollama_reply(&json).unwrap(), "the answer");
    }

    #[test]
    fn ollama_reply_missing_field_is_error() {
        assert!(parse_ollama_reply(&serde_json::json!({"done": true})).is_err());
    }
}
