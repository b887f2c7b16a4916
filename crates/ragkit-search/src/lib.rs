//! Hybrid keyword and semantic search over a ragkit index.
//!
//! Queries are expanded through a fixed synonym table, matched by substring
//! against every knowledge item, and ranked per category. When an embedding
//! provider is available, document similarity adds a score boost and fills
//! the `semantic` category.

mod engine;
mod synonyms;

pub use engine::{Category, Match, SearchEngine, SearchOptions, SearchResults, SemanticMatch};
pub use synonyms::expand_query;
