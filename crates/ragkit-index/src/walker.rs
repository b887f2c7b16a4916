//! Candidate discovery: which files under the project root get indexed.

use std::path::{Path, PathBuf};

use ragkit_core::{ProjectConfig, RagError, STATE_DIR};

/// A file selected for indexing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Candidate {
    /// Project-relative path with `/` separators; the document key.
    pub relative: String,
    pub absolute: PathBuf,
}

/// One entry of `filePatterns`.
///
/// # Examples
///
/// ```
/// use ragkit_index::walker::FilePattern;
///
/// let md = FilePattern::parse("*.md").unwrap();
/// assert!(md.matches("docs/deep/setup.md"));
///
/// let roles = FilePattern::parse("roles/**/*.yml").unwrap();
/// assert!(roles.matches("roles/harbor/tasks/main.yml"));
/// assert!(!roles.matches("inventory/hosts.yml"));
///
/// let exact = FilePattern::parse("Makefile").unwrap();
/// assert!(exact.matches("Makefile"));
/// assert!(!exact.matches("sub/Makefile"));
/// ```
#[derive(Debug, Clone)]
pub enum FilePattern {
    /// Wildcard without a `/`: matched against the file name at any depth.
    Name(glob::Pattern),
    /// Wildcard with a `/`: matched against the whole relative path.
    Path(glob::Pattern),
    /// No wildcard: one specific relative path.
    Exact(String),
}

impl FilePattern {
    /// Parse a pattern; `None` for an empty or invalid glob.
    pub fn parse(pattern: &str) -> Option<Self> {
        let pattern = pattern.trim().trim_start_matches("./");
        if pattern.is_empty() {
            return None;
        }
        let has_wildcard = pattern.contains(['*', '?', '[']);
        if !has_wildcard {
            return Some(FilePattern::Exact(pattern.to_string()));
        }
        match glob::Pattern::new(pattern) {
            Ok(compiled) if pattern.contains('/') => Some(FilePattern::Path(compiled)),
            Ok(compiled) => Some(FilePattern::Name(compiled)),
            Err(e) => {
                tracing::warn!(pattern, error = %e, "ignoring invalid file pattern");
                None
            }
        }
    }

    /// Whether the `/`-separated relative path matches.
    pub fn matches(&self, relative: &str) -> bool {
        match self {
            FilePattern::Name(p) => {
                let name = relative.rsplit('/').next().unwrap_or(relative);
                p.matches(name)
            }
            FilePattern::Path(p) => p.matches(relative),
            FilePattern::Exact(path) => path == relative,
        }
    }
}

/// Whether any exclusion entry occurs as a substring of `relative`.
pub fn is_excluded(relative: &str, exclude_paths: &[String]) -> bool {
    exclude_paths
        .iter()
        .filter(|e| !e.is_empty())
        .any(|e| relative.contains(e.as_str()))
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Enumerate the files matching `config.file_patterns` and not excluded.
///
/// `.gitignore` rules are not applied; only the configured exclusions and the
/// state directory are skipped. The result is sorted and free of duplicates.
///
/// # Errors
///
/// Returns [`RagError::Io`] if `root` is not a readable directory.
pub fn collect_candidates(root: &Path, config: &ProjectConfig) -> Result<Vec<Candidate>, RagError> {
    if !std::fs::metadata(root)?.is_dir() {
        return Err(RagError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a directory", root.display()),
        )));
    }

    let patterns: Vec<FilePattern> = config
        .file_patterns
        .iter()
        .filter_map(|p| FilePattern::parse(p))
        .collect();
    if patterns.is_empty() {
        return Ok(Vec::new());
    }

    let prune_root = root.to_path_buf();
    let prune_excludes = config.exclude_paths.clone();
    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            let Some(relative) = relative_key(&prune_root, entry.path()) else {
                return true;
            };
            if relative == STATE_DIR {
                return false;
            }
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            // a directory is pruned when every descendant would be excluded
            !is_dir || !is_excluded(&format!("{relative}/"), &prune_excludes)
        })
        .build();

    let mut candidates = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Some(relative) = relative_key(root, entry.path()) else {
            continue;
        };
        if is_excluded(&relative, &config.exclude_paths) {
            continue;
        }
        if patterns.iter().any(|p| p.matches(&relative)) {
            candidates.push(Candidate {
                relative,
                absolute: entry.into_path(),
            });
        }
    }

    candidates.sort();
    candidates.dedup_by(|a, b| a.relative == b.relative);
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for (path, body) in [
            ("README.md", "# Readme"),
            ("docs/setup.md", "# Setup"),
            ("docs/deploy.yaml", "kind: Pod"),
            ("roles/harbor/tasks/main.yml", "- name: install"),
            ("scripts/run.sh", "echo hi"),
            ("node_modules/pkg/README.md", "# vendored"),
            (".ragkit/index.json", "{}"),
            ("data.csv", "a,b"),
            ("Makefile", "all:"),
        ] {
            let path = root.join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
        dir
    }

    fn config(patterns: &[&str], excludes: &[&str]) -> ProjectConfig {
        ProjectConfig {
            file_patterns: patterns.iter().map(|s| s.to_string()).collect(),
            exclude_paths: excludes.iter().map(|s| s.to_string()).collect(),
            ..ProjectConfig::default()
        }
    }

    fn relatives(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.relative.as_str()).collect()
    }

    #[test]
    fn name_patterns_match_at_any_depth_and_respect_excludes() {
        let dir = make_tree();
        let found = collect_candidates(dir.path(), &config(&["*.md"], &["node_modules"])).unwrap();
        assert_eq!(relatives(&found), vec!["README.md", "docs/setup.md"]);
    }

    #[test]
    fn overlapping_patterns_are_deduplicated() {
        let dir = make_tree();
        let found = collect_candidates(
            dir.path(),
            &config(&["*.yml", "roles/**/*.yml", "Makefile", "missing.txt"], &[]),
        )
        .unwrap();
        assert_eq!(relatives(&found), vec!["Makefile", "roles/harbor/tasks/main.yml"]);
    }

    #[test]
    fn state_dir_is_never_indexed() {
        let dir = make_tree();
        let found = collect_candidates(dir.path(), &config(&["*.json"], &[])).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn exclusion_is_substring_based() {
        let dir = make_tree();
        let found = collect_candidates(dir.path(), &config(&["*.md", "*.yaml"], &["setup"])).unwrap();
        assert_eq!(
            relatives(&found),
            vec!["README.md", "docs/deploy.yaml", "node_modules/pkg/README.md"]
        );
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_candidates(&dir.path().join("nope"), &ProjectConfig::default()).is_err());
    }
}
