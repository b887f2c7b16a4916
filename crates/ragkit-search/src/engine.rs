//! Hybrid ranking over a built index.
//!
//! Every knowledge item whose text contains the raw query or one of its
//! synonym expansions is a match. Its score is the per-kind weight, plus a
//! bonus when the raw query itself matched, plus a boost derived from the
//! document's embedding similarity to the query when semantic ranking ran.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use ragkit_core::{Index, RagError, SearchWeights};
use ragkit_semantic::{Embedder, EmbeddingProvider};
use serde::Serialize;

use crate::synonyms::expand_query;

/// Result category.
///
/// # Examples
///
/// ```
/// use ragkit_search::Category;
///
/// let c: Category = "commands".parse().unwrap();
/// assert_eq!(c, Category::Command);
/// assert_eq!(c.to_string(), "command");
/// assert!("bogus".parse::<Category>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Concept,
    Command,
    Configuration,
    Troubleshooting,
    Semantic,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Concept => write!(f, "concept"),
            Category::Command => write!(f, "command"),
            Category::Configuration => write!(f, "configuration"),
            Category::Troubleshooting => write!(f, "troubleshooting"),
            Category::Semantic => write!(f, "semantic"),
        }
    }
}

impl FromStr for Category {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim_end_matches('s') {
            "concept" => Ok(Category::Concept),
            "command" => Ok(Category::Command),
            "configuration" | "config" => Ok(Category::Configuration),
            "troubleshooting" => Ok(Category::Troubleshooting),
            "semantic" => Ok(Category::Semantic),
            other => Err(RagError::Config(format!(
                "unknown category: {other} (expected concept, command, configuration, troubleshooting or semantic)"
            ))),
        }
    }
}

/// One ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub file: String,
    pub line: usize,
    pub text: String,
    /// Command technology, configuration class or troubleshooting kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    pub score: u32,
}

/// Document-level embedding similarity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticMatch {
    pub file: String,
    pub similarity: f32,
    pub score: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub query: String,
    pub concept: Vec<Match>,
    pub command: Vec<Match>,
    pub configuration: Vec<Match>,
    pub troubleshooting: Vec<Match>,
    pub semantic: Vec<SemanticMatch>,
    /// Whether embedding similarity contributed to the scores.
    pub semantic_used: bool,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.concept.is_empty()
            && self.command.is_empty()
            && self.configuration.is_empty()
            && self.troubleshooting.is_empty()
            && self.semantic.is_empty()
    }

    pub fn total(&self) -> usize {
        self.concept.len()
            + self.command.len()
            + self.configuration.len()
            + self.troubleshooting.len()
            + self.semantic.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Request semantic ranking; ignored when no provider is available.
    pub use_semantic: bool,
    /// Fill only this category.
    pub category: Option<Category>,
}

/// Read-only search over one index snapshot.
///
/// # Examples
///
/// ```
/// use ragkit_core::{Index, SearchWeights};
/// use ragkit_search::{SearchEngine, SearchOptions};
/// use ragkit_semantic::{EmbeddingClient, EmbeddingProvider};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let index = Index::default();
/// let engine = SearchEngine::new(&index, SearchWeights::default(), 0.3);
/// let provider = EmbeddingProvider::<EmbeddingClient>::disabled();
/// let results = engine.search("harbor", 10, &SearchOptions::default(), &provider).await;
/// assert!(results.is_empty());
/// # });
/// ```
pub struct SearchEngine<'a> {
    index: &'a Index,
    weights: SearchWeights,
    similarity_threshold: f32,
}

struct Matcher {
    raw: String,
    terms: BTreeSet<String>,
}

impl Matcher {
    /// `Some(true)` for a raw-query hit, `Some(false)` for a synonym-only hit.
    fn check(&self, text: &str) -> Option<bool> {
        let lower = text.to_lowercase();
        if lower.contains(&self.raw) {
            Some(true)
        } else if self.terms.iter().any(|t| lower.contains(t.as_str())) {
            Some(false)
        } else {
            None
        }
    }
}

fn rank<T>(mut items: Vec<T>, limit: usize, score: impl Fn(&T) -> u32) -> Vec<T> {
    // stable: equal scores keep discovery order
    items.sort_by(|a, b| score(b).cmp(&score(a)));
    items.truncate(limit);
    items
}

fn scaled(similarity: f32, scale: f32) -> u32 {
    (similarity * scale).floor().max(0.0) as u32
}

impl<'a> SearchEngine<'a> {
    pub fn new(index: &'a Index, weights: SearchWeights, similarity_threshold: f32) -> Self {
        Self {
            index,
            weights,
            similarity_threshold,
        }
    }

    /// Run `query` and return at most `limit` matches per category.
    ///
    /// An empty index, blank query, or `limit` of 0 yields empty results. A
    /// failing embedding call is logged and the query is ranked lexically.
    pub async fn search<E: Embedder>(
        &self,
        query: &str,
        limit: usize,
        options: &SearchOptions,
        provider: &EmbeddingProvider<E>,
    ) -> SearchResults {
        let mut results = SearchResults {
            query: query.to_string(),
            ..SearchResults::default()
        };
        let raw = query.trim().to_lowercase();
        if raw.is_empty() || limit == 0 || self.index.is_empty() {
            return results;
        }

        let similarities = if options.use_semantic && provider.is_available() {
            self.semantic_scores(query, limit, provider).await
        } else {
            None
        };
        let wants = |c: Category| options.category.map_or(true, |only| only == c);

        if let Some(scores) = &similarities {
            results.semantic_used = true;
            if wants(Category::Semantic) {
                results.semantic = scores
                    .iter()
                    .map(|(file, similarity)| SemanticMatch {
                        file: file.clone(),
                        similarity: *similarity,
                        score: scaled(*similarity, self.weights.semantic_score_scale),
                    })
                    .collect();
                results.semantic.truncate(limit);
            }
        }
        let boosts: BTreeMap<&str, u32> = similarities
            .iter()
            .flatten()
            .map(|(file, sim)| (file.as_str(), scaled(*sim, self.weights.semantic_boost_scale)))
            .collect();

        let matcher = Matcher {
            raw,
            terms: expand_query(query),
        };
        let w = &self.weights;
        let score = |weight: u32, exact: bool, boost: u32| {
            weight + if exact { w.exact_bonus } else { 0 } + boost
        };

        for (path, doc) in &self.index.documents {
            let boost = boosts.get(path.as_str()).copied().unwrap_or(0);
            let k = &doc.knowledge;

            if wants(Category::Concept) {
                for c in &k.concepts {
                    if let Some(exact) = matcher.check(&c.name) {
                        results.concept.push(Match {
                            file: path.clone(),
                            line: c.line,
                            text: c.name.clone(),
                            classification: None,
                            score: score(w.concept_weight, exact, boost),
                        });
                    }
                }
            }
            if wants(Category::Command) {
                for c in &k.commands {
                    if let Some(exact) = matcher.check(&c.text) {
                        results.command.push(Match {
                            file: path.clone(),
                            line: c.line,
                            text: c.text.clone(),
                            classification: Some(c.classification.to_string()),
                            score: score(w.command_weight, exact, boost),
                        });
                    }
                }
            }
            if wants(Category::Configuration) {
                for c in &k.configurations {
                    if let Some(exact) = matcher.check(&c.content) {
                        results.configuration.push(Match {
                            file: path.clone(),
                            line: c.line,
                            text: c.content.clone(),
                            classification: Some(c.classification.to_string()),
                            score: score(w.configuration_weight, exact, boost),
                        });
                    }
                }
            }
            if wants(Category::Troubleshooting) {
                for t in &k.troubleshooting {
                    if let Some(exact) = matcher.check(&t.content) {
                        results.troubleshooting.push(Match {
                            file: path.clone(),
                            line: t.line,
                            text: t.content.clone(),
                            classification: Some(t.classification.to_string()),
                            score: score(w.troubleshooting_weight, exact, boost),
                        });
                    }
                }
            }
        }

        results.concept = rank(results.concept, limit, |m| m.score);
        results.command = rank(results.command, limit, |m| m.score);
        results.configuration = rank(results.configuration, limit, |m| m.score);
        results.troubleshooting = rank(results.troubleshooting, limit, |m| m.score);
        results
    }

    /// Similarity per document, at or above the threshold, capped at twice `limit`.
    async fn semantic_scores<E: Embedder>(
        &self,
        query: &str,
        limit: usize,
        provider: &EmbeddingProvider<E>,
    ) -> Option<Vec<(String, f32)>> {
        let texts: BTreeMap<String, String> = self
            .index
            .documents
            .iter()
            .map(|(path, doc)| (path.clone(), doc.knowledge.searchable_text()))
            .filter(|(_, text)| !text.is_empty())
            .collect();
        if texts.is_empty() {
            return None;
        }
        match provider
            .find_similar(query, &texts, limit.saturating_mul(2), self.similarity_threshold)
            .await
        {
            Ok(scores) => Some(scores),
            Err(e) => {
                tracing::warn!(error = %e, "semantic ranking failed, using keyword ranking only");
                None
            }
        }
    }
}
