use std::path::PathBuf;

/// Errors that can occur across the ragkit crates.
///
/// Library crates return this type directly; the binary renders it through
/// `miette` at the boundary.
///
/// # Examples
///
/// ```
/// use ragkit_core::RagError;
///
/// let err = RagError::NotIndexed("docs/setup.md".into());
/// assert!(err.to_string().contains("docs/setup.md"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum RagError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration or settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// The project configuration file does not exist yet.
    #[error("project not initialized: {} is missing", .0.display())]
    #[diagnostic(help("run `ragkit init` to create a project configuration"))]
    NotInitialized(PathBuf),

    /// A file context was requested for a path absent from the index.
    #[error("file not indexed: {0}")]
    #[diagnostic(help("run `ragkit index` or check the path is relative to the project root"))]
    NotIndexed(String),

    /// Text extraction failed for a single file.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Embedding API or cache failure.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// A state file could not be committed to disk.
    #[error("persist failed: {0}")]
    Persist(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
