//! Concrete embedding providers and the model registry.
//!
//! [`Providers`] implements the core `ProviderRegistry`: a user's model
//! id is parsed at lookup into a known OpenAI model or a config-declared
//! Ollama model, and anything else is rejected with a typed error. No
//! model id falls through to a provider unvalidated.
//!
//! # Retry Strategy
//!
//! Both HTTP providers share one policy for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use notekeep_core::embedding::{Embedder, ProviderRegistry, TextGenerator};
use notekeep_core::error::CoreError;

use crate::config::Config;
use crate::generation::{OllamaGenerator, OpenAiGenerator};

/// The OpenAI embedding models notekeep accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiEmbeddingModel {
    TextEmbedding3Small,
    TextEmbedding3Large,
    TextEmbeddingAda002,
}

impl OpenAiEmbeddingModel {
    pub fn parse(id: &str) -> Option<Self> {
        match id {
            "text-embedding-3-small" => Some(Self::TextEmbedding3Small),
            "text-embedding-3-large" => Some(Self::TextEmbedding3Large),
            "text-embedding-ada-002" => Some(Self::TextEmbeddingAda002),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextEmbedding3Small => "text-embedding-3-small",
            Self::TextEmbedding3Large => "text-embedding-3-large",
            Self::TextEmbeddingAda002 => "text-embedding-ada-002",
        }
    }
}

/// The OpenAI chat models notekeep accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiChatModel {
    Gpt4o,
    Gpt4oMini,
    Gpt41,
    Gpt41Mini,
}

impl OpenAiChatModel {
    pub fn parse(id: &str) -> Option<Self> {
        match id {
            "gpt-4o" => Some(Self::Gpt4o),
            "gpt-4o-mini" => Some(Self::Gpt4oMini),
            "gpt-4.1" => Some(Self::Gpt41),
            "gpt-4.1-mini" => Some(Self::Gpt41Mini),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt4o => "gpt-4o",
            Self::Gpt4oMini => "gpt-4o-mini",
            Self::Gpt41 => "gpt-4.1",
            Self::Gpt41Mini => "gpt-4.1-mini",
        }
    }
}

/// POST a JSON body with the shared retry policy, returning the parsed
/// response body.
pub(crate) async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut req = client.post(url).json(body);
        if let Some(token) = bearer {
            req = req.header("Authorization", format!("Bearer {}", token));
        }

        match req.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                // Rate limited or server error — retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!("API error {}: {}", status, body_text));
                    continue;
                }

                // Client error (not 429) — don't retry
                let body_text = response.text().await.unwrap_or_default();
                bail!("API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
}

/// Embedder calling the OpenAI `POST /v1/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: OpenAiEmbeddingModel,
    max_retries: u32,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        self.model.as_str()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model.as_str(),
            "input": texts,
        });
        let json = post_json_with_retry(
            &self.client,
            &format!("{}/v1/embeddings", self.base_url),
            Some(&self.api_key),
            &body,
            self.max_retries,
        )
        .await?;
        parse_openai_embeddings(&json)
    }
}

fn parse_openai_embeddings(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;
        embeddings.push(
            embedding
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        );
    }
    Ok(embeddings)
}

/// Embedder calling a local Ollama instance's `POST /api/embed` endpoint.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    max_retries: u32,
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = post_json_with_retry(
            &self.client,
            &format!("{}/api/embed", self.url),
            None,
            &body,
            self.max_retries,
        )
        .await?;
        parse_ollama_embeddings(&json)
    }
}

fn parse_ollama_embeddings(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;

    let mut result = Vec::with_capacity(embeddings.len());
    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: embedding is not an array"))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }
    Ok(result)
}

/// The registry handed to the core pipeline.
pub struct Providers {
    client: reqwest::Client,
    openai_base_url: String,
    openai_api_key: Option<String>,
    ollama_url: String,
    ollama_embedding_models: Vec<String>,
    ollama_chat_models: Vec<String>,
    max_retries: u32,
}

impl Providers {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            openai_base_url: config.openai.base_url.clone(),
            openai_api_key: std::env::var(&config.openai.api_key_env).ok(),
            ollama_url: config.ollama.url.clone(),
            ollama_embedding_models: config.ollama.embedding_models.clone(),
            ollama_chat_models: config.ollama.chat_models.clone(),
            max_retries: config.http.max_retries,
        })
    }

    fn openai_key(&self) -> Result<String, CoreError> {
        self.openai_api_key.clone().ok_or_else(|| {
            CoreError::ConfigInvalid("OpenAI API key not set in the environment".to_string())
        })
    }
}

impl ProviderRegistry for Providers {
    fn embedder(&self, model: &str) -> Result<Arc<dyn Embedder>, CoreError> {
        if let Some(known) = OpenAiEmbeddingModel::parse(model) {
            return Ok(Arc::new(OpenAiEmbedder {
                client: self.client.clone(),
                base_url: self.openai_base_url.clone(),
                api_key: self.openai_key()?,
                model: known,
                max_retries: self.max_retries,
            }));
        }
        if self.ollama_embedding_models.iter().any(|m| m == model) {
            return Ok(Arc::new(OllamaEmbedder {
                client: self.client.clone(),
                url: self.ollama_url.clone(),
                model: model.to_string(),
                max_retries: self.max_retries,
            }));
        }
        Err(CoreError::ConfigInvalid(format!(
            "unknown embedding model '{}'",
            model
        )))
    }

    fn generator(&self, model: &str) -> Result<Arc<dyn TextGenerator>, CoreError> {
        if let Some(known) = OpenAiChatModel::parse(model) {
            return Ok(Arc::new(OpenAiGenerator::new(
                self.client.clone(),
                self.openai_base_url.clone(),
                self.openai_key()?,
                known,
                self.max_retries,
            )));
        }
        if self.ollama_chat_models.iter().any(|m| m == model) {
            return Ok(Arc::new(OllamaGenerator::new(
                self.client.clone(),
                self.ollama_url.clone(),
                model.to_string(),
                self.max_retries,
            )));
        }
        Err(CoreError::ConfigInvalid(format!(
            "unknown chat model '{}'",
            model
        )))
    }
}
