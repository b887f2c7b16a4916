//! Structures derived from the document map: the concept graph, the command
//! index, and aggregate statistics. All three are rebuilt from scratch after
//! every indexing run.

use std::collections::{BTreeMap, BTreeSet};

use ragkit_core::{ArtifactKind, CommandRef, Document, GraphEdge, Index, IndexStats};

/// Link each concept to the commands and configurations of its own document.
///
/// A command is linked when any word of the lower-cased concept name occurs
/// in the command text; a configuration when the whole name occurs in its
/// content. Edges are not deduplicated across documents.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use ragkit_core::ProjectConfig;
/// use ragkit_extract::KnowledgeExtractor;
/// use ragkit_index::graph::build_knowledge_graph;
/// # use ragkit_core::Document;
///
/// let extractor = KnowledgeExtractor::new(&ProjectConfig::default());
/// let knowledge = extractor.extract_path("# Pods\n```bash\nkubectl get pods\n```\n", "a.md");
/// # let doc = Document { path: "a.md".into(), content_hash: String::new(), size_bytes: 0,
/// #     line_count: 0, last_indexed_at: chrono::Utc::now(), page_count: None, knowledge };
/// let documents = BTreeMap::from([("a.md".to_string(), doc)]);
/// let graph = build_knowledge_graph(&documents);
/// assert_eq!(graph["pods"][0].content, "kubectl get pods");
/// ```
pub fn build_knowledge_graph(documents: &BTreeMap<String, Document>) -> BTreeMap<String, Vec<GraphEdge>> {
    let mut graph: BTreeMap<String, Vec<GraphEdge>> = BTreeMap::new();

    for (path, doc) in documents {
        let knowledge = &doc.knowledge;
        for concept in &knowledge.concepts {
            let key = concept.name.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            let words: Vec<&str> = key.split_whitespace().collect();

            for command in &knowledge.commands {
                let text = command.text.to_lowercase();
                if words.iter().any(|w| text.contains(w)) {
                    graph.entry(key.clone()).or_default().push(GraphEdge {
                        artifact: ArtifactKind::Command,
                        file: path.clone(),
                        line: command.line,
                        content: command.text.clone(),
                    });
                }
            }

            for config in &knowledge.configurations {
                if config.content.to_lowercase().contains(&key) {
                    graph.entry(key.clone()).or_default().push(GraphEdge {
                        artifact: ArtifactKind::Configuration,
                        file: path.clone(),
                        line: config.line,
                        content: config.content.clone(),
                    });
                }
            }
        }
    }

    graph
}

/// Group every command by its classification.
pub fn build_command_index(documents: &BTreeMap<String, Document>) -> BTreeMap<String, Vec<CommandRef>> {
    let mut index: BTreeMap<String, Vec<CommandRef>> = BTreeMap::new();
    for (path, doc) in documents {
        for command in &doc.knowledge.commands {
            index
                .entry(command.classification.to_string())
                .or_default()
                .push(CommandRef {
                    command: command.text.clone(),
                    file: path.clone(),
                    line: command.line,
                });
        }
    }
    index
}

/// Recompute [`IndexStats`] from the current contents of `index`.
///
/// Graph nodes count concept keys plus the distinct artifacts they point at.
pub fn compute_stats(index: &Index) -> IndexStats {
    let docs = index.documents.values();
    let artifacts: BTreeSet<(ArtifactKind, &str, usize)> = index
        .knowledge_graph
        .values()
        .flatten()
        .map(|edge| (edge.artifact, edge.file.as_str(), edge.line))
        .collect();

    IndexStats {
        total_documents: index.documents.len(),
        total_concepts: docs.clone().map(|d| d.knowledge.concepts.len()).sum(),
        total_commands: docs.clone().map(|d| d.knowledge.commands.len()).sum(),
        total_configurations: docs.clone().map(|d| d.knowledge.configurations.len()).sum(),
        total_troubleshooting: docs.map(|d| d.knowledge.troubleshooting.len()).sum(),
        graph_nodes: index.knowledge_graph.len() + artifacts.len(),
        graph_edges: index.knowledge_graph.values().map(Vec::len).sum(),
        repo_type: index.repo_type.clone(),
        last_updated: index.last_updated_at,
    }
}
