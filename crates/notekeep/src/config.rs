use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Shared settings for the outbound HTTP clients.
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key. The key itself never
    /// lives in the config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    /// Model ids routed to Ollama for embeddings. A model id not listed
    /// here and not a known OpenAI embedding model is rejected.
    #[serde(default)]
    pub embedding_models: Vec<String>,
    /// Model ids routed to Ollama for generation.
    #[serde(default)]
    pub chat_models: Vec<String>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            embedding_models: Vec::new(),
            chat_models: Vec::new(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.http.timeout_secs == 0 {
        anyhow::bail!("http.timeout_secs must be > 0");
    }

    if config.openai.base_url.trim().is_empty() {
        anyhow::bail!("openai.base_url must not be empty");
    }
    if config.ollama.url.trim().is_empty() {
        anyhow::bail!("ollama.url must not be empty");
    }

    for model in config
        .ollama
        .embedding_models
        .iter()
        .chain(config.ollama.chat_models.iter())
    {
        if model.trim().is_empty() {
            anyhow::bail!("ollama model ids must not be empty");
        }
    }

    Ok(config)
}
