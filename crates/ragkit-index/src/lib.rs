//! Document indexing for ragkit.
//!
//! Walks the project tree, extracts knowledge from each candidate file on a
//! worker pool, prunes documents whose files disappeared, rebuilds the
//! knowledge graph and command index, and commits the result atomically to
//! `.ragkit/index.json`. Unchanged files (same content hash) are skipped.

pub mod context;
pub mod graph;
pub mod indexer;
pub mod pdf;
pub mod store;
pub mod walker;

pub use context::{file_context, FileContext, FileInfo};
pub use indexer::{content_hash, rebuild_derived, FailedFile, IndexReport, Indexer};
pub use store::IndexStore;
