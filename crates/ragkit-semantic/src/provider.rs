//! The optional embedding capability consumed by the indexer and search engine.
//!
//! [`EmbeddingProvider`] wraps an [`Embedder`] backend together with the
//! persistent [`EmbeddingCache`]. A provider without a backend reports itself
//! unavailable and every operation becomes a no-op, so callers never need to
//! special-case a missing API key.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use ragkit_core::{EmbeddingSettings, RagError};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::cache::{EmbeddingCache, EntryMeta};
use crate::client::EmbeddingClient;

/// A backend that turns text into vectors.
pub trait Embedder: Send + Sync {
    /// Identifier recorded with cached vectors; a change invalidates them.
    fn model_id(&self) -> &str;

    /// Embed a batch of documents, returning one vector per input, in order.
    fn embed_documents(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, RagError>> + Send;

    fn embed_query(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, RagError>> + Send;
}

/// Result of embedding a set of documents.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Vectors for every document that has one, cached or fresh.
    pub vectors: BTreeMap<String, Vec<f32>>,
    /// Documents embedded by this call (cache misses).
    pub computed: usize,
    /// Documents whose embedding request failed.
    pub failed: usize,
}

/// Summary shown by `ragkit stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStats {
    pub available: bool,
    pub model_id: Option<String>,
    pub cached_documents: usize,
}

/// Embedding capability with a content-addressed cache.
///
/// # Examples
///
/// ```
/// use ragkit_semantic::{EmbeddingClient, EmbeddingProvider};
///
/// let provider = EmbeddingProvider::<EmbeddingClient>::disabled();
/// assert!(!provider.is_available());
/// ```
pub struct EmbeddingProvider<E> {
    embedder: Option<E>,
    cache: Mutex<EmbeddingCache>,
    max_chars: usize,
}

impl<E> std::fmt::Debug for EmbeddingProvider<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingProvider")
            .field("available", &self.embedder.is_some())
            .field("max_chars", &self.max_chars)
            .finish_non_exhaustive()
    }
}

impl EmbeddingProvider<EmbeddingClient> {
    /// Build a provider from `.ragkit.toml` settings, loading the cache under `cache_dir`.
    ///
    /// A provider that cannot be configured (no API key, unknown backend) is
    /// returned disabled, with the reason logged.
    pub fn from_settings(settings: &EmbeddingSettings, cache_dir: &Path) -> Self {
        match EmbeddingClient::with_settings(settings) {
            Ok(client) => Self::new(client, EmbeddingCache::load(cache_dir), settings.max_chars),
            Err(e) => {
                tracing::info!(error = %e, "semantic ranking unavailable");
                Self::disabled()
            }
        }
    }
}

impl<E: Embedder> EmbeddingProvider<E> {
    pub fn new(embedder: E, cache: EmbeddingCache, max_chars: usize) -> Self {
        Self {
            embedder: Some(embedder),
            cache: Mutex::new(cache),
            max_chars: max_chars.max(1),
        }
    }

    /// A provider with no backend.
    pub fn disabled() -> Self {
        Self {
            embedder: None,
            cache: Mutex::new(EmbeddingCache::default()),
            max_chars: 1,
        }
    }

    pub fn is_available(&self) -> bool {
        self.embedder.is_some()
    }

    pub fn model_id(&self) -> Option<&str> {
        self.embedder.as_ref().map(Embedder::model_id)
    }

    fn cache(&self) -> MutexGuard<'_, EmbeddingCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Truncate to the character budget and digest what will be embedded.
    fn prepare(&self, text: &str) -> (String, String) {
        let prepared = match text.char_indices().nth(self.max_chars) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text.to_string(),
        };
        let hash = format!("{:x}", Sha256::digest(prepared.as_bytes()));
        (prepared, hash)
    }

    /// Embed one document, reusing the cached vector when its text is unchanged.
    ///
    /// Returns `Ok(None)` when the provider is unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if the backend call fails.
    pub async fn embed_document(&self, id: &str, text: &str) -> Result<Option<Vec<f32>>, RagError> {
        let Some(embedder) = &self.embedder else {
            return Ok(None);
        };
        let (prepared, hash) = self.prepare(text);
        let cached = self
            .cache()
            .get(id, &hash, embedder.model_id())
            .map(<[f32]>::to_vec);
        if cached.is_some() {
            return Ok(cached);
        }

        let vector = embedder
            .embed_documents(std::slice::from_ref(&prepared))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("backend returned no vector".into()))?;
        self.cache()
            .insert(id.to_string(), self.meta(hash, embedder), vector.clone());
        Ok(Some(vector))
    }

    /// Embed every `id -> text` pair, sending only cache misses to the backend.
    ///
    /// A failing backend call is logged and counted in
    /// [`BatchOutcome::failed`]; it is not an error.
    pub async fn embed_documents(&self, texts: &BTreeMap<String, String>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let Some(embedder) = &self.embedder else {
            return outcome;
        };

        let mut pending = Vec::new();
        {
            let cache = self.cache();
            for (id, text) in texts {
                let (prepared, hash) = self.prepare(text);
                match cache.get(id, &hash, embedder.model_id()) {
                    Some(vector) => {
                        outcome.vectors.insert(id.clone(), vector.to_vec());
                    }
                    None => pending.push((id.clone(), prepared, hash)),
                }
            }
        }
        if pending.is_empty() {
            return outcome;
        }

        let inputs: Vec<String> = pending.iter().map(|(_, text, _)| text.clone()).collect();
        match embedder.embed_documents(&inputs).await {
            Ok(vectors) if vectors.len() == pending.len() => {
                let mut cache = self.cache();
                for ((id, _, hash), vector) in pending.into_iter().zip(vectors) {
                    cache.insert(id.clone(), self.meta(hash, embedder), vector.clone());
                    outcome.vectors.insert(id, vector);
                    outcome.computed += 1;
                }
            }
            Ok(vectors) => {
                tracing::warn!(
                    expected = pending.len(),
                    got = vectors.len(),
                    "embedding backend returned the wrong number of vectors"
                );
                outcome.failed = pending.len();
            }
            Err(e) => {
                tracing::warn!(error = %e, documents = pending.len(), "document embedding failed");
                outcome.failed = pending.len();
            }
        }
        outcome
    }

    /// Embed a search query. Queries are never cached.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if the backend call fails.
    pub async fn embed_query(&self, text: &str) -> Result<Option<Vec<f32>>, RagError> {
        let Some(embedder) = &self.embedder else {
            return Ok(None);
        };
        let (prepared, _) = self.prepare(text);
        Ok(Some(embedder.embed_query(&prepared).await?))
    }

    /// Rank `texts` by cosine similarity to `query`.
    ///
    /// Keeps scores at or above `threshold`, sorted descending with the id as
    /// tie-break, at most `top_k` of them. Empty when unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if the query cannot be embedded.
    pub async fn find_similar(
        &self,
        query: &str,
        texts: &BTreeMap<String, String>,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<(String, f32)>, RagError> {
        if top_k == 0 || texts.is_empty() {
            return Ok(Vec::new());
        }
        let Some(query_vector) = self.embed_query(query).await? else {
            return Ok(Vec::new());
        };
        let outcome = self.embed_documents(texts).await;

        let mut scored: Vec<(String, f32)> = outcome
            .vectors
            .into_iter()
            .map(|(id, vector)| {
                let score = cosine_similarity(&query_vector, &vector);
                (id, score)
            })
            .filter(|(_, score)| *score >= threshold)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Drop cached vectors for documents not in `ids`; returns how many were dropped.
    pub fn retain(&self, ids: &BTreeSet<String>) -> usize {
        self.cache().retain_ids(ids)
    }

    /// Persist the cache under `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Persist`] if the cache files cannot be written.
    pub fn save(&self, dir: &Path) -> Result<(), RagError> {
        self.cache().save(dir)
    }

    pub fn stats(&self) -> ProviderStats {
        ProviderStats {
            available: self.is_available(),
            model_id: self.model_id().map(str::to_string),
            cached_documents: self.cache().len(),
        }
    }

    fn meta(&self, content_hash: String, embedder: &E) -> EntryMeta {
        EntryMeta {
            content_hash,
            model_id: embedder.model_id().to_string(),
            computed_at: Utc::now(),
        }
    }
}

/// Cosine similarity of two vectors; 0 for mismatched lengths or zero vectors.
///
/// # Examples
///
/// ```
/// use ragkit_semantic::cosine_similarity;
///
/// assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
/// assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    (dot / denom) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl Embedder for Fixed {
        fn model_id(&self) -> &str {
            "fixed"
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, RagError> {
            Ok(vec![1.0, 0.0])
        }
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn overlong_text_is_truncated_on_a_char_boundary() {
        let provider = EmbeddingProvider::new(Fixed, EmbeddingCache::default(), 3);
        let (prepared, _) = provider.prepare("héllo");
        assert_eq!(prepared, "hél...");
        let (short, _) = provider.prepare("hé");
        assert_eq!(short, "hé");
    }

    #[tokio::test]
    async fn disabled_provider_is_a_no_op() {
        let provider = EmbeddingProvider::<Fixed>::disabled();
        assert_eq!(provider.embed_document("a", "text").await.unwrap(), None);
        assert_eq!(provider.embed_query("q").await.unwrap(), None);
        let texts = BTreeMap::from([("a".to_string(), "text".to_string())]);
        assert!(provider.find_similar("q", &texts, 5, 0.0).await.unwrap().is_empty());
        assert_eq!(provider.embed_documents(&texts).await.computed, 0);
        assert!(!provider.stats().available);
    }

    #[tokio::test]
    async fn second_embedding_is_served_from_cache() {
        let provider = EmbeddingProvider::new(Fixed, EmbeddingCache::default(), 100);
        let texts = BTreeMap::from([("a".to_string(), "abc".to_string())]);
        assert_eq!(provider.embed_documents(&texts).await.computed, 1);
        let again = provider.embed_documents(&texts).await;
        assert_eq!(again.computed, 0);
        assert_eq!(again.vectors["a"], vec![3.0, 1.0]);
        assert_eq!(provider.stats().cached_documents, 1);
    }
}
