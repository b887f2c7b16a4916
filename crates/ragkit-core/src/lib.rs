//! Core types, configuration, and error handling for ragkit.
//!
//! This crate provides the shared foundation used by the other ragkit crates:
//! - [`RagError`]: unified error type using `thiserror` and `miette`
//! - [`ProjectConfig`]: per-project extraction configuration (`.ragkit/config.json`)
//! - [`Settings`]: tool settings loaded from `.ragkit.toml`
//! - The knowledge model: [`KnowledgeItem`], [`KnowledgeBundle`], [`Document`], [`Index`]

mod config;
mod error;
mod paths;
mod types;

pub use config::{
    EmbeddingSettings, IndexingSettings, ProjectConfig, RepoType, SearchWeights,
    SemanticSearchConfig, Settings,
};
pub use error::RagError;
pub use paths::{write_atomic, ProjectPaths, SETTINGS_FILE, STATE_DIR};
pub use types::{
    ArtifactKind, CodeBlock, Command, CommandClass, CommandRef, CommandSource, Concept,
    ConceptKind, ConfigClass, Configuration, CrossReference, Dependency, Document, FunctionDecl,
    GraphEdge, Index, IndexStats, KnowledgeBundle, KnowledgeItem, OutputFormat, TroubleKind,
    TroubleshootingEntry, Variable, VariableKind, INDEX_VERSION,
};

/// A convenience `Result` type for ragkit operations.
pub type Result<T> = std::result::Result<T, RagError>;
