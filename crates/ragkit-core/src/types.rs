use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RepoType;

/// Version tag written into every persisted index.
pub const INDEX_VERSION: &str = "1";

/// What produced a [`Concept`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptKind {
    #[default]
    Heading,
    Class,
    Document,
    AnsibleTask,
    MlPattern,
    Endpoint,
    Component,
}

/// A named topic: a heading, a class, or an enhancement-pass pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    pub name: String,
    /// Heading depth; 0 for concepts that are not headings.
    pub heading_level: usize,
    pub line: usize,
    /// Nearest preceding heading in markup formats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default)]
    pub kind: ConceptKind,
    pub file: String,
}

/// Technology a shell command belongs to, by keyword match.
///
/// # Examples
///
/// ```
/// use ragkit_core::CommandClass;
///
/// assert_eq!(CommandClass::classify("kubectl get pods"), CommandClass::Kubernetes);
/// assert_eq!(CommandClass::classify("pip install -r req.txt"), CommandClass::Python);
/// assert_eq!(CommandClass::classify("ls -la"), CommandClass::Shell);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandClass {
    Kubernetes,
    Docker,
    Ansible,
    Helm,
    Git,
    Python,
    #[default]
    Shell,
}

impl CommandClass {
    /// First matching tool token wins; order matters (`kubectl` before `git`).
    pub fn classify(command: &str) -> Self {
        const RULES: &[(&[&str], CommandClass)] = &[
            (&["kubectl"], CommandClass::Kubernetes),
            (&["docker"], CommandClass::Docker),
            (&["ansible"], CommandClass::Ansible),
            (&["helm"], CommandClass::Helm),
            (&["git"], CommandClass::Git),
            (&["pip", "python", "jupyter"], CommandClass::Python),
        ];
        let lower = command.to_lowercase();
        RULES
            .iter()
            .find(|(tokens, _)| tokens.iter().any(|t| lower.contains(t)))
            .map_or(CommandClass::Shell, |(_, class)| *class)
    }
}

impl fmt::Display for CommandClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandClass::Kubernetes => "kubernetes",
            CommandClass::Docker => "docker",
            CommandClass::Ansible => "ansible",
            CommandClass::Helm => "helm",
            CommandClass::Git => "git",
            CommandClass::Python => "python",
            CommandClass::Shell => "shell",
        };
        f.write_str(name)
    }
}

/// Where a command was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandSource {
    CodeBlock,
    Script,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub text: String,
    pub classification: CommandClass,
    pub line: usize,
    pub source: CommandSource,
    pub file: String,
}

/// Category assigned to a [`Configuration`] by keyword tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigClass {
    Namespace,
    ContainerImage,
    Network,
    General,
    /// Key named by the project's own keyword list.
    Project,
    KubernetesNamespace,
    NetworkPort,
    FeatureToggle,
    YamlConfig,
    KubernetesResource,
    MlopsService,
    Storage,
    Registry,
    ServiceEndpoint,
    ModelConfig,
}

impl fmt::Display for ConfigClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigClass::Namespace => "namespace",
            ConfigClass::ContainerImage => "container_image",
            ConfigClass::Network => "network",
            ConfigClass::General => "general",
            ConfigClass::Project => "project",
            ConfigClass::KubernetesNamespace => "kubernetes_namespace",
            ConfigClass::NetworkPort => "network_port",
            ConfigClass::FeatureToggle => "feature_toggle",
            ConfigClass::YamlConfig => "yaml_config",
            ConfigClass::KubernetesResource => "kubernetes_resource",
            ConfigClass::MlopsService => "mlops_service",
            ConfigClass::Storage => "storage",
            ConfigClass::Registry => "registry",
            ConfigClass::ServiceEndpoint => "service_endpoint",
            ConfigClass::ModelConfig => "model_config",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// The trimmed source line.
    pub content: String,
    pub classification: ConfigClass,
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TroubleKind {
    Error,
    Solution,
    Issue,
}

impl fmt::Display for TroubleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TroubleKind::Error => write!(f, "error"),
            TroubleKind::Solution => write!(f, "solution"),
            TroubleKind::Issue => write!(f, "issue"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TroubleshootingEntry {
    pub content: String,
    pub classification: TroubleKind,
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub content: String,
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub file: String,
}

/// A file-path-shaped substring that may name another document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossReference {
    pub target_path: String,
    pub source_path: String,
    pub context: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBlock {
    pub language: String,
    pub content: String,
    /// First content line after the opening fence.
    pub start_line: usize,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDecl {
    pub name: String,
    pub params: String,
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclosing_class: Option<String>,
    pub file: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    #[default]
    Assignment,
    Setting,
    Template,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub value: String,
    pub line: usize,
    /// Enclosing class/function, or the dotted parent path for structured data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default)]
    pub kind: VariableKind,
    pub file: String,
}

/// One typed fact extracted from a line or block of a document.
///
/// Serialized with a `type` tag; `kind` belongs to the inner items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum KnowledgeItem {
    Concept(Concept),
    Command(Command),
    Configuration(Configuration),
    Troubleshooting(TroubleshootingEntry),
    Dependency(Dependency),
    CrossReference(CrossReference),
    CodeBlock(CodeBlock),
    Function(FunctionDecl),
    Variable(Variable),
}

impl KnowledgeItem {
    /// 0-based line the item was found on.
    pub fn line(&self) -> usize {
        match self {
            KnowledgeItem::Concept(c) => c.line,
            KnowledgeItem::Command(c) => c.line,
            KnowledgeItem::Configuration(c) => c.line,
            KnowledgeItem::Troubleshooting(t) => t.line,
            KnowledgeItem::Dependency(d) => d.line,
            KnowledgeItem::CrossReference(r) => r.line,
            KnowledgeItem::CodeBlock(b) => b.start_line,
            KnowledgeItem::Function(f) => f.line,
            KnowledgeItem::Variable(v) => v.line,
        }
    }

    /// File the item came from (notebook cells carry a `:cell_N` suffix).
    pub fn file(&self) -> &str {
        match self {
            KnowledgeItem::Concept(c) => &c.file,
            KnowledgeItem::Command(c) => &c.file,
            KnowledgeItem::Configuration(c) => &c.file,
            KnowledgeItem::Troubleshooting(t) => &t.file,
            KnowledgeItem::Dependency(d) => &d.file,
            KnowledgeItem::CrossReference(r) => &r.source_path,
            KnowledgeItem::CodeBlock(b) => &b.file,
            KnowledgeItem::Function(f) => &f.file,
            KnowledgeItem::Variable(v) => &v.file,
        }
    }
}

/// Knowledge extracted from one document, grouped by item kind.
///
/// # Examples
///
/// ```
/// use ragkit_core::{Concept, ConceptKind, KnowledgeBundle, KnowledgeItem};
///
/// let mut bundle = KnowledgeBundle::default();
/// bundle.push(KnowledgeItem::Concept(Concept {
///     name: "Install".into(),
///     heading_level: 1,
///     line: 0,
///     section: None,
///     kind: ConceptKind::Heading,
///     file: "README.md".into(),
/// }));
/// assert_eq!(bundle.len(), 1);
/// assert_eq!(bundle.searchable_text(), "Install");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KnowledgeBundle {
    pub concepts: Vec<Concept>,
    pub commands: Vec<Command>,
    pub configurations: Vec<Configuration>,
    pub troubleshooting: Vec<TroubleshootingEntry>,
    pub dependencies: Vec<Dependency>,
    pub cross_references: Vec<CrossReference>,
    pub code_blocks: Vec<CodeBlock>,
    pub functions: Vec<FunctionDecl>,
    pub variables: Vec<Variable>,
}

impl KnowledgeBundle {
    pub fn push(&mut self, item: KnowledgeItem) {
        match item {
            KnowledgeItem::Concept(c) => self.concepts.push(c),
            KnowledgeItem::Command(c) => self.commands.push(c),
            KnowledgeItem::Configuration(c) => self.configurations.push(c),
            KnowledgeItem::Troubleshooting(t) => self.troubleshooting.push(t),
            KnowledgeItem::Dependency(d) => self.dependencies.push(d),
            KnowledgeItem::CrossReference(r) => self.cross_references.push(r),
            KnowledgeItem::CodeBlock(b) => self.code_blocks.push(b),
            KnowledgeItem::Function(f) => self.functions.push(f),
            KnowledgeItem::Variable(v) => self.variables.push(v),
        }
    }

    /// Append every item of `other`, keeping per-kind order.
    pub fn append(&mut self, mut other: KnowledgeBundle) {
        self.concepts.append(&mut other.concepts);
        self.commands.append(&mut other.commands);
        self.configurations.append(&mut other.configurations);
        self.troubleshooting.append(&mut other.troubleshooting);
        self.dependencies.append(&mut other.dependencies);
        self.cross_references.append(&mut other.cross_references);
        self.code_blocks.append(&mut other.code_blocks);
        self.functions.append(&mut other.functions);
        self.variables.append(&mut other.variables);
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
            + self.commands.len()
            + self.configurations.len()
            + self.troubleshooting.len()
            + self.dependencies.len()
            + self.cross_references.len()
            + self.code_blocks.len()
            + self.functions.len()
            + self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text projection used as embedding input: concept names, command text,
    /// configuration content and troubleshooting content, space separated.
    pub fn searchable_text(&self) -> String {
        let parts = self
            .concepts
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.commands.iter().map(|c| c.text.as_str()))
            .chain(self.configurations.iter().map(|c| c.content.as_str()))
            .chain(self.troubleshooting.iter().map(|t| t.content.as_str()))
            .filter(|part| !part.trim().is_empty());
        parts.collect::<Vec<_>>().join(" ")
    }
}

/// Per-file knowledge plus the metadata used for incremental re-indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Project-relative path with `/` separators.
    pub path: String,
    pub content_hash: String,
    pub size_bytes: u64,
    pub line_count: usize,
    pub last_indexed_at: DateTime<Utc>,
    /// Present for paged formats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    #[serde(default)]
    pub knowledge: KnowledgeBundle,
}

/// Artifact side of a knowledge-graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Command,
    Configuration,
}

/// Concept → artifact co-occurrence edge within one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub artifact: ArtifactKind,
    pub file: String,
    pub line: usize,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRef {
    pub command: String,
    pub file: String,
    pub line: usize,
}

/// Aggregate counts recomputed after every indexing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexStats {
    pub total_documents: usize,
    pub total_concepts: usize,
    pub total_commands: usize,
    pub total_configurations: usize,
    pub total_troubleshooting: usize,
    pub graph_nodes: usize,
    pub graph_edges: usize,
    pub repo_type: RepoType,
    pub last_updated: Option<DateTime<Utc>>,
}

/// The persisted knowledge base.
///
/// Unknown keys are ignored and missing keys default to empty, so an index
/// written by another version still loads.
///
/// # Examples
///
/// ```
/// use ragkit_core::Index;
///
/// let index: Index = serde_json::from_str(r#"{"documents": {}, "future": 1}"#).unwrap();
/// assert!(index.documents.is_empty());
/// assert!(index.knowledge_graph.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Index {
    pub version: String,
    pub repo_type: RepoType,
    pub created_at: Option<DateTime<Utc>>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub documents: BTreeMap<String, Document>,
    pub knowledge_graph: BTreeMap<String, Vec<GraphEdge>>,
    pub command_index: BTreeMap<String, Vec<CommandRef>>,
    pub stats: IndexStats,
}

impl Default for Index {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION.to_string(),
            repo_type: RepoType::Generic,
            created_at: None,
            last_updated_at: None,
            documents: BTreeMap::new(),
            knowledge_graph: BTreeMap::new(),
            command_index: BTreeMap::new(),
            stats: IndexStats::default(),
        }
    }
}

impl Index {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Output format for CLI results.
///
/// # Examples
///
/// ```
/// use ragkit_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable listings.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concept(name: &str) -> Concept {
        Concept {
            name: name.into(),
            heading_level: 1,
            line: 0,
            section: None,
            kind: ConceptKind::Heading,
            file: "a.md".into(),
        }
    }

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "md".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn command_classification_order() {
        assert_eq!(CommandClass::classify("docker push harbor.local/x"), CommandClass::Docker);
        assert_eq!(CommandClass::classify("helm install x"), CommandClass::Helm);
        assert_eq!(CommandClass::classify("git clone repo"), CommandClass::Git);
        // kubectl is checked first even when other tokens appear
        assert_eq!(
            CommandClass::classify("kubectl apply -f docker.yaml"),
            CommandClass::Kubernetes
        );
        assert_eq!(CommandClass::classify("jupyter lab"), CommandClass::Python);
    }

    #[test]
    fn searchable_text_skips_blank_parts() {
        let mut bundle = KnowledgeBundle::default();
        bundle.push(KnowledgeItem::Concept(concept("Setup")));
        bundle.push(KnowledgeItem::Concept(concept("   ")));
        bundle.push(KnowledgeItem::Command(Command {
            text: "make install".into(),
            classification: CommandClass::Shell,
            line: 3,
            source: CommandSource::CodeBlock,
            file: "a.md".into(),
        }));
        assert_eq!(bundle.searchable_text(), "Setup make install");
    }

    #[test]
    fn knowledge_item_serializes_with_type_tag() {
        let item = KnowledgeItem::Concept(concept("Intro"));
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "concept");
        assert_eq!(json["kind"], "heading");
        assert_eq!(json["headingLevel"], 1);
        assert_eq!(item.file(), "a.md");
    }

    #[test]
    fn items_with_inner_kind_roundtrip() {
        let items = [
            KnowledgeItem::Concept(concept("Intro")),
            KnowledgeItem::Variable(Variable {
                name: "replicas".into(),
                value: "3".into(),
                line: 4,
                scope: Some("spec".into()),
                kind: VariableKind::Setting,
                file: "deploy.yaml".into(),
            }),
        ];
        for item in items {
            let text = serde_json::to_string(&item).unwrap();
            assert_eq!(text.matches("\"kind\"").count(), 1, "{text}");
            let back: KnowledgeItem = serde_json::from_str(&text).unwrap();
            assert_eq!(back, item);
        }
    }

    #[test]
    fn index_roundtrips_through_json() {
        let mut index = Index::default();
        let mut knowledge = KnowledgeBundle::default();
        knowledge.push(KnowledgeItem::Concept(concept("Intro")));
        index.documents.insert(
            "a.md".into(),
            Document {
                path: "a.md".into(),
                content_hash: "abc".into(),
                size_bytes: 7,
                line_count: 1,
                last_indexed_at: Utc::now(),
                page_count: None,
                knowledge,
            },
        );
        let json = serde_json::to_string(&index).unwrap();
        let back: Index = serde_json::from_str(&json).unwrap();
        assert_eq!(back, index);
    }

    #[test]
    fn bundle_append_preserves_order() {
        let mut a = KnowledgeBundle::default();
        a.push(KnowledgeItem::Concept(concept("One")));
        let mut b = KnowledgeBundle::default();
        b.push(KnowledgeItem::Concept(concept("Two")));
        a.append(b);
        let names: Vec<_> = a.concepts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["One", "Two"]);
    }
}
