//! Per-file lookups over a built index (`ragkit context <file>`).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use chrono::{DateTime, Utc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use ragkit_core::{Document, Index, KnowledgeBundle, RagError};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub size: u64,
    pub lines: usize,
    pub file_type: &'static str,
    pub last_indexed: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
}

/// Everything the index knows about one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContext {
    pub path: String,
    pub file_info: FileInfo,
    pub knowledge: KnowledgeBundle,
    /// Files this one references plus files referencing it, sorted.
    pub related_files: Vec<String>,
}

/// Coarse file type by extension, as shown in file context.
///
/// # Examples
///
/// ```
/// use ragkit_index::context::file_type;
///
/// assert_eq!(file_type("docs/setup.md"), "markdown");
/// assert_eq!(file_type("analysis.IPYNB"), "jupyter_notebook");
/// assert_eq!(file_type("Makefile"), "unknown");
/// ```
pub fn file_type(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("md" | "markdown" | "rst") => "markdown",
        Some("py") => "python",
        Some("yml" | "yaml") => "yaml",
        Some("sh" | "bash") => "shell",
        Some("js" | "mjs" | "cjs" | "jsx") => "javascript",
        Some("json") => "json",
        Some("txt") => "text",
        Some("ipynb") => "jupyter_notebook",
        Some("pdf") => "pdf",
        _ => "unknown",
    }
}

/// Normalize a user- or document-supplied path to the index key shape.
fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Resolve a cross-reference target written in `source` to an index key when
/// possible: as written, then relative to the source file's directory.
fn resolve_target(target: &str, source: &str, documents: &BTreeMap<String, Document>) -> String {
    let direct = normalize(target);
    if documents.contains_key(&direct) {
        return direct;
    }
    if let Some((dir, _)) = source.rsplit_once('/') {
        let joined = normalize(&format!("{dir}/{target}"));
        if documents.contains_key(&joined) {
            return joined;
        }
    }
    direct
}

/// Directed file graph: an edge `a -> b` when `a` cross-references `b`.
#[derive(Debug, Default)]
pub struct ReferenceGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl ReferenceGraph {
    pub fn build(documents: &BTreeMap<String, Document>) -> Self {
        let mut refs = Self::default();
        for (source, doc) in documents {
            for reference in &doc.knowledge.cross_references {
                let target = resolve_target(&reference.target_path, source, documents);
                if target.is_empty() || target == *source {
                    continue;
                }
                let from = refs.node(source);
                let to = refs.node(&target);
                refs.graph.update_edge(from, to, ());
            }
        }
        refs
    }

    fn node(&mut self, path: &str) -> NodeIndex {
        if let Some(idx) = self.nodes.get(path) {
            return *idx;
        }
        let idx = self.graph.add_node(path.to_string());
        self.nodes.insert(path.to_string(), idx);
        idx
    }

    /// Outgoing and incoming neighbours of `path`, excluding itself, sorted.
    pub fn related(&self, path: &str) -> Vec<String> {
        let Some(&idx) = self.nodes.get(path) else {
            return Vec::new();
        };
        let neighbours: BTreeSet<&str> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .chain(self.graph.neighbors_directed(idx, Direction::Incoming))
            .map(|n| self.graph[n].as_str())
            .filter(|n| *n != path)
            .collect();
        neighbours.into_iter().map(str::to_string).collect()
    }
}

/// Look up `path` in `index`.
///
/// # Errors
///
/// Returns [`RagError::NotIndexed`] if the path has no document.
///
/// # Examples
///
/// ```
/// use ragkit_core::{Index, RagError};
/// use ragkit_index::file_context;
///
/// let err = file_context(&Index::default(), "never/indexed.md").unwrap_err();
/// assert!(matches!(err, RagError::NotIndexed(_)));
/// ```
pub fn file_context(index: &Index, path: &str) -> Result<FileContext, RagError> {
    let key = normalize(path);
    let doc = index
        .documents
        .get(&key)
        .ok_or_else(|| RagError::NotIndexed(path.to_string()))?;

    let related_files = ReferenceGraph::build(&index.documents).related(&key);
    Ok(FileContext {
        file_info: FileInfo {
            size: doc.size_bytes,
            lines: doc.line_count,
            file_type: file_type(&key),
            last_indexed: doc.last_indexed_at,
            pages: doc.page_count,
        },
        knowledge: doc.knowledge.clone(),
        related_files,
        path: key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragkit_core::{CrossReference, KnowledgeItem};

    fn doc(path: &str, refs: &[&str]) -> Document {
        let mut knowledge = KnowledgeBundle::default();
        for target in refs {
            knowledge.push(KnowledgeItem::CrossReference(CrossReference {
                target_path: target.to_string(),
                source_path: path.into(),
                context: format!("see {target}"),
                line: 0,
            }));
        }
        Document {
            path: path.into(),
            content_hash: "h".into(),
            size_bytes: 10,
            line_count: 2,
            last_indexed_at: Utc::now(),
            page_count: None,
            knowledge,
        }
    }

    fn index(docs: Vec<Document>) -> Index {
        Index {
            documents: docs.into_iter().map(|d| (d.path.clone(), d)).collect(),
            ..Index::default()
        }
    }

    #[test]
    fn related_files_cover_both_directions() {
        let index = index(vec![
            doc("docs/setup.md", &["tls.md", "./docs/setup.md", "scripts/install.sh"]),
            doc("docs/tls.md", &[]),
            doc("README.md", &["docs/setup.md"]),
            doc("scripts/install.sh", &[]),
        ]);
        let ctx = file_context(&index, "./docs/setup.md").unwrap();
        assert_eq!(ctx.path, "docs/setup.md");
        assert_eq!(
            ctx.related_files,
            vec!["README.md", "docs/tls.md", "scripts/install.sh"]
        );
        assert_eq!(ctx.file_info.file_type, "markdown");
        assert_eq!(ctx.file_info.lines, 2);
    }

    #[test]
    fn unindexed_targets_are_still_listed() {
        let index = index(vec![doc("a.md", &["missing/b.yaml"])]);
        let ctx = file_context(&index, "a.md").unwrap();
        assert_eq!(ctx.related_files, vec!["missing/b.yaml"]);
    }

    #[test]
    fn unknown_path_is_not_indexed() {
        let index = index(vec![doc("a.md", &[])]);
        assert!(matches!(file_context(&index, "b.md"), Err(RagError::NotIndexed(p)) if p == "b.md"));
    }

    #[test]
    fn normalize_handles_dots() {
        assert_eq!(normalize("./docs/../README.md"), "README.md");
        assert_eq!(normalize("docs\\setup.md"), "docs/setup.md");
    }
}
