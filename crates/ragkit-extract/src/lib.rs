//! Per-format knowledge extraction.
//!
//! Every extractor is a pure function from text to a [`KnowledgeBundle`]:
//! no I/O, no shared state, and no failure mode. Input that does not parse
//! is treated as prose. After the format pass, repository-type rules append
//! extra items (Kubernetes resource headers, Ansible tasks, ML patterns, ...).

use std::collections::BTreeSet;
use std::path::Path;

use ragkit_core::{Concept, ConceptKind, KnowledgeBundle, KnowledgeItem, ProjectConfig, RepoType};

mod classify;
mod enhance;
pub mod format;
mod javascript;
mod markdown;
mod notebook;
mod python;
mod references;
mod shell;
mod yaml;

pub use format::Format;

/// Read-only inputs shared by the per-format extractors.
pub struct ExtractContext<'a> {
    /// Lower-cased project vocabulary.
    pub keywords: &'a BTreeSet<String>,
}

/// Extractor configured for one project.
///
/// # Examples
///
/// ```
/// use ragkit_core::ProjectConfig;
/// use ragkit_extract::{Format, KnowledgeExtractor};
///
/// let extractor = KnowledgeExtractor::new(&ProjectConfig::default());
/// let bundle = extractor.extract(
///     "# Harbor Registry Setup\n```bash\nkubectl get pods\n```\n",
///     "docs/harbor.md",
///     Format::Markdown,
/// );
/// assert_eq!(bundle.concepts[0].name, "Harbor Registry Setup");
/// assert_eq!(bundle.commands[0].text, "kubectl get pods");
/// ```
#[derive(Debug, Clone)]
pub struct KnowledgeExtractor {
    repo_type: RepoType,
    keywords: BTreeSet<String>,
}

impl KnowledgeExtractor {
    pub fn new(config: &ProjectConfig) -> Self {
        Self {
            repo_type: config.repo_type.clone(),
            keywords: config.keywords.clone(),
        }
    }

    /// Extract typed knowledge from `content`, attributing items to `path`.
    ///
    /// For [`Format::Pdf`] `content` is the already-extracted text (possibly
    /// empty); a `PDF Document: <stem>` concept is always appended.
    pub fn extract(&self, content: &str, path: &str, format: Format) -> KnowledgeBundle {
        let ctx = ExtractContext {
            keywords: &self.keywords,
        };
        let mut bundle = KnowledgeBundle::default();
        (format.extractor())(&ctx, content, path, &mut bundle);

        if format == Format::Pdf {
            let stem = Path::new(path)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(path);
            bundle.push(KnowledgeItem::Concept(Concept {
                name: format!("PDF Document: {stem}"),
                heading_level: 0,
                line: 0,
                section: None,
                kind: ConceptKind::Document,
                file: path.to_string(),
            }));
        }

        enhance::enhance(&self.repo_type, content, path, &mut bundle);
        bundle
    }

    /// Detect the format from `path` and extract.
    pub fn extract_path(&self, content: &str, path: &str) -> KnowledgeBundle {
        self.extract(content, path, Format::from_path(Path::new(path)))
    }
}
