use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RagError;

/// Project classification that selects the extraction enhancement passes.
///
/// Parsing is lenient: unrecognized names are preserved as [`RepoType::Other`]
/// and get only the generic extraction rules.
///
/// # Examples
///
/// ```
/// use ragkit_core::RepoType;
///
/// let rt: RepoType = "mlops-platform".parse().unwrap();
/// assert_eq!(rt, RepoType::MlopsPlatform);
/// assert_eq!(rt.to_string(), "mlops-platform");
///
/// let other: RepoType = "rust-crate".parse().unwrap();
/// assert_eq!(other, RepoType::Other("rust-crate".into()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RepoType {
    MlopsPlatform,
    MlModel,
    WebApp,
    Kubernetes,
    Ansible,
    Python,
    Documentation,
    #[default]
    Generic,
    Other(String),
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepoType::MlopsPlatform => "mlops-platform",
            RepoType::MlModel => "ml-model",
            RepoType::WebApp => "web-app",
            RepoType::Kubernetes => "kubernetes",
            RepoType::Ansible => "ansible",
            RepoType::Python => "python",
            RepoType::Documentation => "documentation",
            RepoType::Generic => "generic",
            RepoType::Other(name) => name,
        };
        f.write_str(name)
    }
}

impl FromStr for RepoType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().replace('_', "-").as_str() {
            "mlops-platform" | "mlops" => RepoType::MlopsPlatform,
            "ml-model" => RepoType::MlModel,
            "web-app" => RepoType::WebApp,
            "kubernetes" | "k8s" => RepoType::Kubernetes,
            "ansible" => RepoType::Ansible,
            "python" => RepoType::Python,
            "documentation" | "docs" => RepoType::Documentation,
            "generic" | "" => RepoType::Generic,
            _ => RepoType::Other(s.trim().to_string()),
        })
    }
}

impl From<String> for RepoType {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(rt) => rt,
            Err(never) => match never {},
        }
    }
}

impl From<RepoType> for String {
    fn from(rt: RepoType) -> Self {
        rt.to_string()
    }
}

/// Project configuration stored at `.ragkit/config.json`.
///
/// Produced by the project classifier (or `ragkit init`) and read-only for the
/// rest of a run. Keys are camelCase; the classifier's snake_case spellings are
/// accepted too.
///
/// # Examples
///
/// ```
/// use ragkit_core::ProjectConfig;
///
/// let json = r#"{
///     "repo_type": "kubernetes",
///     "keywords": ["Helm", "kubectl"],
///     "file_patterns": ["*.md", "manifests/**/*.yaml"],
///     "exclude_paths": [".git"]
/// }"#;
/// let config = ProjectConfig::from_json(json).unwrap();
/// assert!(config.keywords.contains("helm"));
/// assert!(config.semantic_search.enabled);
/// assert_eq!(config.semantic_search.similarity_threshold, 0.3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(default, alias = "repo_type")]
    pub repo_type: RepoType,
    /// Project vocabulary, stored lower-cased.
    #[serde(default, deserialize_with = "lowercase_set")]
    pub keywords: BTreeSet<String>,
    #[serde(default = "default_file_patterns", alias = "file_patterns")]
    pub file_patterns: Vec<String>,
    #[serde(default = "default_exclude_paths", alias = "exclude_paths")]
    pub exclude_paths: Vec<String>,
    #[serde(default, alias = "extraction_focus")]
    pub extraction_focus: Vec<String>,
    #[serde(default, alias = "semantic_search")]
    pub semantic_search: SemanticSearchConfig,
}

fn lowercase_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|k| k.to_lowercase()).collect())
}

fn default_file_patterns() -> Vec<String> {
    ["*.md", "*.rst", "*.txt", "*.yml", "*.yaml", "*.sh", "*.py"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_exclude_paths() -> Vec<String> {
    [".git", "node_modules", "__pycache__", ".venv", "target/"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            repo_type: RepoType::Generic,
            keywords: BTreeSet::new(),
            file_patterns: default_file_patterns(),
            exclude_paths: default_exclude_paths(),
            extraction_focus: Vec::new(),
            semantic_search: SemanticSearchConfig::default(),
        }
    }
}

impl ProjectConfig {
    /// Load the project configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotInitialized`] if the file does not exist and
    /// [`RagError::Config`] if it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, RagError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RagError::NotInitialized(path.to_path_buf()));
            }
            Err(e) => return Err(RagError::Io(e)),
        };
        Self::from_json(&content)
            .map_err(|e| RagError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse a project configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Serialization`] if the JSON is malformed.
    pub fn from_json(content: &str) -> Result<Self, RagError> {
        Ok(serde_json::from_str(content)?)
    }
}

/// Semantic ranking switch and similarity cut-off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticSearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_similarity_threshold", alias = "similarity_threshold")]
    pub similarity_threshold: f32,
}

fn default_true() -> bool {
    true
}

fn default_similarity_threshold() -> f32 {
    0.3
}

impl Default for SemanticSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

/// Tool settings loaded from `.ragkit.toml`.
///
/// Every section is optional; an absent file yields the defaults.
///
/// # Examples
///
/// ```
/// use ragkit_core::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.embedding.provider, "voyage");
/// assert_eq!(settings.search.concept_weight, 8);
/// assert_eq!(settings.indexing.max_file_size, 1024 * 1024);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub search: SearchWeights,
    #[serde(default)]
    pub indexing: IndexingSettings,
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] if the file exists but cannot be read, or
    /// [`RagError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```
    /// use ragkit_core::Settings;
    /// use std::path::Path;
    ///
    /// let settings = Settings::load(Path::new("/nonexistent/.ragkit.toml")).unwrap();
    /// assert_eq!(settings.embedding.max_chars, 5000);
    /// ```
    pub fn load(path: &Path) -> Result<Self, RagError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(RagError::Io(e)),
        }
    }

    /// Parse settings from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Toml`] if parsing fails.
    pub fn from_toml(content: &str) -> Result<Self, RagError> {
        let settings: Self = toml::from_str(content)?;
        Ok(settings)
    }
}

/// Embedding provider settings for semantic ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// `"voyage"`, `"openai"` or `"ollama"` (default: `"voyage"`).
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// API key; falls back to `RAGKIT_EMBEDDING_API_KEY`, then the provider's own variable.
    pub api_key: Option<String>,
    /// Model name (default depends on the provider).
    pub model: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
    /// Texts longer than this many characters are truncated before embedding.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_embedding_provider() -> String {
    "voyage".into()
}

fn default_max_chars() -> usize {
    5000
}

fn default_batch_size() -> usize {
    64
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            model: None,
            base_url: None,
            max_chars: default_max_chars(),
            batch_size: default_batch_size(),
        }
    }
}

/// Per-kind scoring weights used by the search engine.
///
/// With the defaults an exact concept hit scores 10 and a synonym-only
/// concept hit 8; exact command hits score 5, exact configuration and
/// troubleshooting hits 3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchWeights {
    #[serde(default = "default_concept_weight")]
    pub concept_weight: u32,
    #[serde(default = "default_command_weight")]
    pub command_weight: u32,
    #[serde(default = "default_minor_weight")]
    pub configuration_weight: u32,
    #[serde(default = "default_minor_weight")]
    pub troubleshooting_weight: u32,
    /// Added when the raw query itself (not only a synonym) matched.
    #[serde(default = "default_exact_bonus")]
    pub exact_bonus: u32,
    /// Multiplier applied to document similarity before truncating to an integer boost.
    #[serde(default = "default_semantic_boost_scale")]
    pub semantic_boost_scale: f32,
    /// Multiplier for the score of `semantic` category entries.
    #[serde(default = "default_semantic_score_scale")]
    pub semantic_score_scale: f32,
}

fn default_concept_weight() -> u32 {
    8
}

fn default_command_weight() -> u32 {
    3
}

fn default_minor_weight() -> u32 {
    1
}

fn default_exact_bonus() -> u32 {
    2
}

fn default_semantic_boost_scale() -> f32 {
    5.0
}

fn default_semantic_score_scale() -> f32 {
    10.0
}

impl Default for SearchWeights {
    fn default() -> Self {
        Self {
            concept_weight: default_concept_weight(),
            command_weight: default_command_weight(),
            configuration_weight: default_minor_weight(),
            troubleshooting_weight: default_minor_weight(),
            exact_bonus: default_exact_bonus(),
            semantic_boost_scale: default_semantic_boost_scale(),
            semantic_score_scale: default_semantic_score_scale(),
        }
    }
}

/// Indexing behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingSettings {
    /// Extraction worker threads; 0 means one per CPU.
    #[serde(default)]
    pub workers: usize,
    /// Files larger than this are reported as failed (default: 1 MiB).
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// External helper used to pull text out of PDF files.
    #[serde(default = "default_pdf_command")]
    pub pdf_command: String,
}

fn default_max_file_size() -> u64 {
    1024 * 1024
}

fn default_pdf_command() -> String {
    "pdftotext".into()
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self {
            workers: 0,
            max_file_size: default_max_file_size(),
            pdf_command: default_pdf_command(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_have_expected_values() {
        let settings = Settings::default();
        assert_eq!(settings.embedding.provider, "voyage");
        assert_eq!(settings.embedding.max_chars, 5000);
        assert_eq!(settings.embedding.batch_size, 64);
        assert!(settings.embedding.model.is_none());
        assert_eq!(settings.search.concept_weight, 8);
        assert_eq!(settings.search.command_weight, 3);
        assert_eq!(settings.search.exact_bonus, 2);
        assert_eq!(settings.indexing.workers, 0);
        assert_eq!(settings.indexing.pdf_command, "pdftotext");
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.search, SearchWeights::default());
    }

    #[test]
    fn parse_partial_toml() {
        let toml = r#"
[embedding]
provider = "ollama"
model = "nomic-embed-text"

[search]
concept_weight = 20
"#;
        let settings = Settings::from_toml(toml).unwrap();
        assert_eq!(settings.embedding.provider, "ollama");
        assert_eq!(settings.embedding.model.as_deref(), Some("nomic-embed-text"));
        assert_eq!(settings.search.concept_weight, 20);
        assert_eq!(settings.search.command_weight, 3);
    }

    #[test]
    fn invalid_toml_returns_error() {
        assert!(Settings::from_toml("{{invalid}}").is_err());
    }

    #[test]
    fn project_config_accepts_camel_case() {
        let json = r#"{
            "repoType": "web-app",
            "filePatterns": ["src/*.js"],
            "excludePaths": [],
            "semanticSearch": {"enabled": false, "similarityThreshold": 0.5}
        }"#;
        let config = ProjectConfig::from_json(json).unwrap();
        assert_eq!(config.repo_type, RepoType::WebApp);
        assert_eq!(config.file_patterns, vec!["src/*.js"]);
        assert!(config.exclude_paths.is_empty());
        assert!(!config.semantic_search.enabled);
        assert_eq!(config.semantic_search.similarity_threshold, 0.5);
    }

    #[test]
    fn project_config_missing_fields_default() {
        let config = ProjectConfig::from_json("{}").unwrap();
        assert_eq!(config.repo_type, RepoType::Generic);
        assert!(config.file_patterns.contains(&"*.md".to_string()));
        assert!(config.semantic_search.enabled);
    }

    #[test]
    fn project_config_roundtrips_unknown_repo_type() {
        let config = ProjectConfig::from_json(r#"{"repoType": "nodejs"}"#).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"repoType\":\"nodejs\""));
    }

    #[test]
    fn load_missing_config_is_not_initialized() {
        let dir = std::env::temp_dir().join("ragkit-core-missing-config");
        let err = ProjectConfig::load(&dir.join("config.json")).unwrap_err();
        assert!(matches!(err, RagError::NotInitialized(_)));
    }

    #[test]
    fn repo_type_parse_is_lenient() {
        assert_eq!("ML_MODEL".parse::<RepoType>().unwrap(), RepoType::MlModel);
        assert_eq!("".parse::<RepoType>().unwrap(), RepoType::Generic);
        assert_eq!(RepoType::Kubernetes.to_string(), "kubernetes");
    }
}
