use std::io::Write;
use std::path::{Path, PathBuf};

use crate::RagError;

/// Name of the per-project state directory.
pub const STATE_DIR: &str = ".ragkit";
/// Optional tool settings file at the project root.
pub const SETTINGS_FILE: &str = ".ragkit.toml";

/// Resolved locations of every file ragkit reads or writes for one project.
///
/// # Examples
///
/// ```
/// use ragkit_core::ProjectPaths;
/// use std::path::Path;
///
/// let paths = ProjectPaths::new(Path::new("/work/docs"));
/// assert!(paths.index_file().ends_with(".ragkit/index.json"));
/// ```
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn config_file(&self) -> PathBuf {
        self.state_dir().join("config.json")
    }

    pub fn index_file(&self) -> PathBuf {
        self.state_dir().join("index.json")
    }

    pub fn embeddings_dir(&self) -> PathBuf {
        self.state_dir().join("embeddings")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }
}

/// Replace `path` with `bytes` through a temp file in the same directory and a rename.
///
/// A crash or error leaves the previous file untouched.
///
/// # Errors
///
/// Returns [`RagError::Persist`] if the temp file cannot be created, written
/// or moved into place.
///
/// # Examples
///
/// ```
/// use ragkit_core::write_atomic;
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("index.json");
/// write_atomic(&path, b"{}").unwrap();
/// assert_eq!(std::fs::read(&path).unwrap(), b"{}");
/// ```
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), RagError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .map_err(|e| RagError::Persist(format!("creating {}: {e}", dir.display())))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| RagError::Persist(format!("creating temp file in {}: {e}", dir.display())))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| RagError::Persist(format!("writing {}: {e}", path.display())))?;
    tmp.persist(path)
        .map_err(|e| RagError::Persist(format!("replacing {}: {e}", path.display())))?;
    Ok(())
}
