//! The indexing run: walk, extract in parallel, merge, rebuild, persist.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use ragkit_core::{
    Document, Index, IndexStats, IndexingSettings, KnowledgeBundle, ProjectConfig, ProjectPaths,
    RagError, INDEX_VERSION,
};
use ragkit_extract::{Format, KnowledgeExtractor};
use ragkit_semantic::{Embedder, EmbeddingProvider};
use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::graph::{build_command_index, build_knowledge_graph, compute_stats};
use crate::pdf;
use crate::store::IndexStore;
use crate::walker::{collect_candidates, Candidate};

/// A file that could not be indexed, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFile {
    pub path: String,
    pub reason: String,
}

/// Summary of one indexing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexReport {
    /// Files whose document was (re)built.
    pub processed: usize,
    pub total_candidates: usize,
    /// Files skipped because their content hash did not change.
    pub unchanged: usize,
    /// Documents pruned because their file is gone or no longer matches.
    pub removed: usize,
    pub failed: Vec<FailedFile>,
    /// Files indexed from a metadata-only stub (e.g. PDF without a text helper).
    pub degraded: usize,
    pub embedded: usize,
    pub embedding_failures: usize,
    pub stats: IndexStats,
}

enum FileOutcome {
    Unchanged,
    Indexed { document: Document, degraded: bool },
    Failed(String),
}

/// Everything a worker needs, owned so it can move onto the blocking pool.
struct ExtractJob {
    extractor: KnowledgeExtractor,
    settings: IndexingSettings,
    known_hashes: BTreeMap<String, String>,
    force: bool,
}

/// Hex SHA-256 of `bytes`.
///
/// # Examples
///
/// ```
/// assert_eq!(ragkit_index::content_hash(b"").len(), 64);
/// ```
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

impl ExtractJob {
    fn process(&self, candidate: &Candidate) -> FileOutcome {
        let format = Format::from_path(&candidate.absolute);
        let size = match std::fs::metadata(&candidate.absolute) {
            Ok(meta) => meta.len(),
            Err(e) => return FileOutcome::Failed(format!("cannot stat: {e}")),
        };
        if !format.is_binary() && size > self.settings.max_file_size {
            return FileOutcome::Failed(format!(
                "too large ({size} bytes, limit {})",
                self.settings.max_file_size
            ));
        }

        let bytes = match std::fs::read(&candidate.absolute) {
            Ok(bytes) => bytes,
            Err(e) => return FileOutcome::Failed(format!("cannot read: {e}")),
        };
        let hash = content_hash(&bytes);
        if !self.force && self.known_hashes.get(&candidate.relative) == Some(&hash) {
            return FileOutcome::Unchanged;
        }

        let extracted = std::panic::catch_unwind(AssertUnwindSafe(|| self.extract(candidate, format, &bytes)));
        let (knowledge, page_count, degraded) = match extracted {
            Ok(parts) => parts,
            Err(_) => return FileOutcome::Failed("extractor panicked".into()),
        };

        tracing::debug!(path = %candidate.relative, items = knowledge.len(), "indexed");
        FileOutcome::Indexed {
            document: Document {
                path: candidate.relative.clone(),
                content_hash: hash,
                size_bytes: bytes.len() as u64,
                line_count: bytes.iter().filter(|b| **b == b'\n').count(),
                last_indexed_at: Utc::now(),
                page_count,
                knowledge,
            },
            degraded,
        }
    }

    fn extract(
        &self,
        candidate: &Candidate,
        format: Format,
        bytes: &[u8],
    ) -> (KnowledgeBundle, Option<usize>, bool) {
        let path = candidate.relative.as_str();
        if format != Format::Pdf {
            let text = String::from_utf8_lossy(bytes);
            return (self.extractor.extract(&text, path, format), None, false);
        }
        match pdf::extract_text(&self.settings.pdf_command, &candidate.absolute) {
            Ok(pdf) => (
                self.extractor.extract(&pdf.text, path, format),
                Some(pdf.page_count),
                false,
            ),
            Err(e) => {
                tracing::warn!(path, error = %e, "indexing PDF metadata only");
                (self.extractor.extract("", path, format), None, true)
            }
        }
    }
}

/// Runs indexing for one project.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use ragkit_core::{IndexingSettings, ProjectConfig, ProjectPaths};
/// use ragkit_index::Indexer;
/// use ragkit_semantic::{EmbeddingClient, EmbeddingProvider};
///
/// # async fn run() -> Result<(), ragkit_core::RagError> {
/// let paths = ProjectPaths::new(std::path::Path::new("."));
/// let config = ProjectConfig::load(&paths.config_file())?;
/// let provider = Arc::new(EmbeddingProvider::<EmbeddingClient>::disabled());
/// let indexer = Indexer::new(paths, config, IndexingSettings::default(), provider);
/// let report = indexer.run(false).await?;
/// println!("{} of {} files indexed", report.processed, report.total_candidates);
/// # Ok(())
/// # }
/// ```
pub struct Indexer<E> {
    paths: ProjectPaths,
    config: ProjectConfig,
    settings: IndexingSettings,
    provider: Arc<EmbeddingProvider<E>>,
}

impl<E: Embedder> Indexer<E> {
    pub fn new(
        paths: ProjectPaths,
        config: ProjectConfig,
        settings: IndexingSettings,
        provider: Arc<EmbeddingProvider<E>>,
    ) -> Self {
        Self {
            paths,
            config,
            settings,
            provider,
        }
    }

    pub fn store(&self) -> IndexStore {
        IndexStore::new(self.paths.index_file())
    }

    /// Index the project, re-extracting only files whose content changed
    /// unless `force` is set or the configured repo type differs from the
    /// one the index was built with.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] if the project root cannot be walked and
    /// [`RagError::Persist`] if the index cannot be written. Per-file problems
    /// are reported in [`IndexReport::failed`] instead.
    pub async fn run(&self, force: bool) -> Result<IndexReport, RagError> {
        let store = self.store();
        let mut index = store.load()?;

        // Enhancement rules depend on the repo type, so cached items are stale.
        let repo_type_changed =
            index.repo_type != self.config.repo_type && !index.documents.is_empty();
        if repo_type_changed && !force {
            tracing::info!(
                from = ?index.repo_type,
                to = ?self.config.repo_type,
                "repo type changed, re-extracting all documents"
            );
        }
        let force = force || repo_type_changed;

        let job = ExtractJob {
            extractor: KnowledgeExtractor::new(&self.config),
            settings: self.settings.clone(),
            known_hashes: index
                .documents
                .iter()
                .map(|(path, doc)| (path.clone(), doc.content_hash.clone()))
                .collect(),
            force,
        };
        let root = self.paths.root().to_path_buf();
        let config = self.config.clone();
        let workers = self.settings.workers;

        let (candidates, outcomes) = tokio::task::spawn_blocking(move || {
            let candidates = collect_candidates(&root, &config)?;
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| RagError::Extraction(format!("cannot start worker pool: {e}")))?;
            let outcomes: Vec<FileOutcome> =
                pool.install(|| candidates.par_iter().map(|c| job.process(c)).collect());
            Ok::<_, RagError>((candidates, outcomes))
        })
        .await
        .map_err(|e| RagError::Extraction(format!("indexing worker failed: {e}")))??;

        let mut report = IndexReport {
            total_candidates: candidates.len(),
            ..IndexReport::default()
        };
        let mut changed = false;

        // merge only after every worker has finished
        for (candidate, outcome) in candidates.iter().zip(outcomes) {
            match outcome {
                FileOutcome::Unchanged => report.unchanged += 1,
                FileOutcome::Indexed { document, degraded } => {
                    index.documents.insert(candidate.relative.clone(), document);
                    report.processed += 1;
                    if degraded {
                        report.degraded += 1;
                    }
                    changed = true;
                }
                FileOutcome::Failed(reason) => {
                    tracing::warn!(path = %candidate.relative, %reason, "skipping file");
                    report.failed.push(FailedFile {
                        path: candidate.relative.clone(),
                        reason,
                    });
                }
            }
        }

        let live: BTreeSet<String> = candidates.into_iter().map(|c| c.relative).collect();
        let before = index.documents.len();
        index.documents.retain(|path, _| live.contains(path));
        report.removed = before - index.documents.len();
        changed |= report.removed > 0;

        if index.repo_type != self.config.repo_type || index.version != INDEX_VERSION {
            index.repo_type = self.config.repo_type.clone();
            index.version = INDEX_VERSION.to_string();
            changed = true;
        }
        let now = Utc::now();
        if index.created_at.is_none() {
            index.created_at = Some(now);
        }
        if changed || index.last_updated_at.is_none() {
            index.last_updated_at = Some(now);
        }
        rebuild_derived(&mut index);

        store.save(&index)?;
        report.stats = index.stats.clone();

        if self.config.semantic_search.enabled && self.provider.is_available() {
            self.refresh_embeddings(&index, &mut report).await;
        }

        tracing::info!(
            processed = report.processed,
            unchanged = report.unchanged,
            removed = report.removed,
            failed = report.failed.len(),
            "indexing finished"
        );
        Ok(report)
    }

    async fn refresh_embeddings(&self, index: &Index, report: &mut IndexReport) {
        let texts: BTreeMap<String, String> = index
            .documents
            .iter()
            .map(|(path, doc)| (path.clone(), doc.knowledge.searchable_text()))
            .filter(|(_, text)| !text.is_empty())
            .collect();

        let outcome = self.provider.embed_documents(&texts).await;
        report.embedded = outcome.computed;
        report.embedding_failures = outcome.failed;

        let live: BTreeSet<String> = index.documents.keys().cloned().collect();
        self.provider.retain(&live);
        if let Err(e) = self.provider.save(&self.paths.embeddings_dir()) {
            tracing::warn!(error = %e, "embedding cache not saved");
            report.embedding_failures = texts.len();
        }
    }
}

/// Rebuild the graph, command index and stats from `index.documents`.
pub fn rebuild_derived(index: &mut Index) {
    index.knowledge_graph = build_knowledge_graph(&index.documents);
    index.command_index = build_command_index(&index.documents);
    index.stats = compute_stats(index);
}
