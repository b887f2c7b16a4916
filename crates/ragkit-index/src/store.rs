//! Durable storage for the [`Index`] at `.ragkit/index.json`.

use std::path::{Path, PathBuf};

use ragkit_core::{write_atomic, Index, RagError};

/// Handle to the persisted index of one project.
///
/// # Examples
///
/// ```
/// use ragkit_index::IndexStore;
///
/// let dir = tempfile::tempdir().unwrap();
/// let store = IndexStore::new(dir.path().join(".ragkit/index.json"));
/// assert!(store.load().unwrap().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the index, or an empty one if nothing has been written yet.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] if the file exists but cannot be read.
    /// Content that does not parse is logged and replaced by an empty index,
    /// which the next run rebuilds.
    pub fn load(&self) -> Result<Index, RagError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Index::default()),
            Err(e) => return Err(RagError::Io(e)),
        };
        match serde_json::from_str(&content) {
            Ok(index) => Ok(index),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "index is unreadable, starting fresh");
                Ok(Index::default())
            }
        }
    }

    /// Whether an index file exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Serialize and atomically replace the index file.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Persist`] if the write fails; the previous file is
    /// left as it was.
    pub fn save(&self, index: &Index) -> Result<(), RagError> {
        let mut json = serde_json::to_vec_pretty(index)?;
        json.push(b'\n');
        write_atomic(&self.path, &json)
    }
}
