//! Optional semantic ranking for ragkit.
//!
//! - [`client`]: HTTP client for Voyage, OpenAI-compatible and Ollama embedding APIs
//! - [`cache`]: the two-file embedding cache under `.ragkit/embeddings/`
//! - [`provider`]: the [`Embedder`] seam and the cached [`EmbeddingProvider`]

pub mod cache;
pub mod client;
pub mod provider;

pub use cache::EmbeddingCache;
pub use client::{EmbeddingClient, ProviderKind};
pub use provider::{cosine_similarity, BatchOutcome, Embedder, EmbeddingProvider, ProviderStats};
