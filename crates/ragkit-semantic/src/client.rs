//! HTTP client for hosted or local embedding APIs.
//!
//! Voyage and OpenAI share the `/embeddings` request shape (Voyage adds an
//! `input_type` of `document` or `query`); Ollama uses `/api/embed`.

use std::fmt;
use std::str::FromStr;

use ragkit_core::{EmbeddingSettings, RagError};
use serde::{Deserialize, Serialize};

use crate::provider::Embedder;

const BATCH_DELAY_MS: u64 = 200;
const API_KEY_ENV: &str = "RAGKIT_EMBEDDING_API_KEY";

/// Supported embedding backends.
///
/// # Examples
///
/// ```
/// use ragkit_semantic::client::ProviderKind;
///
/// let kind: ProviderKind = "Ollama".parse().unwrap();
/// assert_eq!(kind, ProviderKind::Ollama);
/// assert!(!kind.requires_api_key());
/// assert!("bert-server".parse::<ProviderKind>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Voyage,
    OpenAi,
    Ollama,
}

impl ProviderKind {
    fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::Voyage => "https://api.voyageai.com/v1",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Ollama => "http://localhost:11434",
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            ProviderKind::Voyage => "voyage-3-lite",
            ProviderKind::OpenAi => "text-embedding-3-small",
            ProviderKind::Ollama => "nomic-embed-text",
        }
    }

    fn key_env(self) -> Option<&'static str> {
        match self {
            ProviderKind::Voyage => Some("VOYAGE_API_KEY"),
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Ollama => None,
        }
    }

    pub fn requires_api_key(self) -> bool {
        self.key_env().is_some()
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Voyage => write!(f, "voyage"),
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Ollama => write!(f, "ollama"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "voyage" => Ok(ProviderKind::Voyage),
            "openai" => Ok(ProviderKind::OpenAi),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(RagError::Config(format!(
                "unknown embedding provider: {other} (expected voyage, openai or ollama)"
            ))),
        }
    }
}

/// Client for an embedding API.
///
/// # Examples
///
/// ```
/// use ragkit_semantic::client::{EmbeddingClient, ProviderKind};
///
/// let client = EmbeddingClient::new(ProviderKind::Voyage, "test-key");
/// assert_eq!(client.model(), "voyage-3-lite");
/// ```
pub struct EmbeddingClient {
    client: reqwest::Client,
    kind: ProviderKind,
    api_key: Option<String>,
    base_url: String,
    model: String,
    batch_size: usize,
}

impl fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_type: Option<&'static str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Deserialize)]
struct EmbedDataItem {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    embeddings: Vec<Vec<f32>>,
}

impl EmbeddingClient {
    /// Create a client with the provider's default endpoint and model.
    pub fn new(kind: ProviderKind, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            kind,
            api_key: Some(api_key.to_string()),
            base_url: kind.default_base_url().to_string(),
            model: kind.default_model().to_string(),
            batch_size: 64,
        }
    }

    /// Create a client from [`EmbeddingSettings`].
    ///
    /// The API key comes from the settings, then `RAGKIT_EMBEDDING_API_KEY`,
    /// then the provider's own variable (`VOYAGE_API_KEY`, `OPENAI_API_KEY`).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the provider is unknown or a required
    /// API key is not available.
    pub fn with_settings(settings: &EmbeddingSettings) -> Result<Self, RagError> {
        Self::with_settings_and_env(settings, |var| std::env::var(var).ok())
    }

    /// Like [`EmbeddingClient::with_settings`], reading variables through `env`
    /// instead of the process environment.
    pub fn with_settings_and_env(
        settings: &EmbeddingSettings,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, RagError> {
        let kind: ProviderKind = settings.provider.parse()?;
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| env(API_KEY_ENV).filter(|key| !key.trim().is_empty()))
            .or_else(|| kind.key_env().and_then(&env))
            .filter(|key| !key.trim().is_empty());

        if api_key.is_none() && kind.requires_api_key() {
            return Err(RagError::Config(format!(
                "embedding API key not found: set embedding.api_key in .ragkit.toml or {API_KEY_ENV}"
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            kind,
            api_key,
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| kind.default_base_url().to_string())
                .trim_end_matches('/')
                .to_string(),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| kind.default_model().to_string()),
            batch_size: settings.batch_size.max(1),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, texts: &[String], input_type: &'static str) -> EmbedRequest {
        EmbedRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
            input_type: (self.kind == ProviderKind::Voyage).then_some(input_type),
        }
    }

    async fn post(&self, texts: &[String], input_type: &'static str) -> Result<Vec<Vec<f32>>, RagError> {
        let url = match self.kind {
            ProviderKind::Ollama => format!("{}/api/embed", self.base_url),
            ProviderKind::Voyage | ProviderKind::OpenAi => format!("{}/embeddings", self.base_url),
        };
        let mut request = self.client.post(url).json(&self.build_request(texts, input_type));
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            return Err(RagError::Embedding(format!(
                "{} API returned {status}: {body}",
                self.kind
            )));
        }

        let vectors = match self.kind {
            ProviderKind::Ollama => {
                let parsed: OllamaResponse = response
                    .json()
                    .await
                    .map_err(|e| RagError::Embedding(format!("failed to parse response: {e}")))?;
                parsed.embeddings
            }
            ProviderKind::Voyage | ProviderKind::OpenAi => {
                let parsed: EmbedResponse = response
                    .json()
                    .await
                    .map_err(|e| RagError::Embedding(format!("failed to parse response: {e}")))?;
                parsed.data.into_iter().map(|item| item.embedding).collect()
            }
        };

        if vectors.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

impl Embedder for EmbeddingClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    /// Splits into sub-batches with a short delay between calls for rate limiting.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut all = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            if i > 0 {
                tokio::time::sleep(tokio::time::Duration::from_millis(BATCH_DELAY_MS)).await;
            }
            all.extend(self.post(batch, "document").await?);
        }
        Ok(all)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.post(&[text.to_string()], "query")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("empty response from embedding API".into()))
    }
}
