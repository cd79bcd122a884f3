//! Capability traits for embedding and text generation, plus vector math.
//!
//! Concrete providers (OpenAI, Ollama) live in the `notekeep` app crate;
//! the core only talks to these traits. The [`ProviderRegistry`] maps a
//! user's configured model identifier to a provider instance, yielding a
//! typed `ConfigInvalid` error for unknown identifiers instead of falling
//! through untyped string branches.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::CoreError;

/// An embedding capability: text in, fixed-length float vector out.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch, one vector per input in the same order. Providers
    /// with a batch endpoint override this; the default loops.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// A text-generation capability, used by chat Q&A and the generative
/// rerank strategy of the insert resolver.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Maps configured model identifiers to capability providers.
///
/// Implementations validate the identifier against a closed set at call
/// time and return [`CoreError::ConfigInvalid`] for anything unknown.
pub trait ProviderRegistry: Send + Sync {
    fn embedder(&self, model: &str) -> Result<Arc<dyn Embedder>, CoreError>;
    fn generator(&self, model: &str) -> Result<Arc<dyn TextGenerator>, CoreError>;
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Scale a vector to unit length. Zero vectors are returned unchanged.
pub fn normalize_unit(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm < f32::EPSILON {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

/// Euclidean distance between two vectors of equal length.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}
