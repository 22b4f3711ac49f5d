//! Filesystem walking with directory exclusion.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::debug;

use crate::chunker::chunk::Language;
use crate::indexer::IndexError;

/// Directories skipped by name at any depth during a walk.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] =
    &[".git", "__pycache__", "node_modules", ".venv", "target"];

pub trait FileDiscoverer: Send + Sync {
    /// List every indexable file under `root`, sorted by path.
    fn discover(&self, root: &Path) -> Result<Vec<PathBuf>, IndexError>;
}

pub struct WalkDiscoverer {
    excluded_dirs: HashSet<String>,
}

impl WalkDiscoverer {
    pub fn new() -> Self {
        Self::with_excluded_dirs(DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()))
    }

    pub fn with_excluded_dirs(excluded: impl IntoIterator<Item = String>) -> Self {
        Self {
            excluded_dirs: excluded.into_iter().collect(),
        }
    }
}

impl Default for WalkDiscoverer {
    fn default() -> Self {
        Self::new()
    }
}

impl FileDiscoverer for WalkDiscoverer {
    fn discover(&self, root: &Path) -> Result<Vec<PathBuf>, IndexError> {
        if !root.is_dir() {
            return Err(IndexError::InvalidRoot(root.display().to_string()));
        }

        let excluded = self.excluded_dirs.clone();
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .sort_by_file_path(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                if entry.file_type().is_some_and(|t| t.is_dir()) {
                    let name = entry.file_name().to_string_lossy();
                    if excluded.contains(name.as_ref()) {
                        debug!(dir = %entry.path().display(), "skipping excluded directory");
                        return false;
                    }
                }
                true
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("walk error: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if Language::from_path(entry.path()) == Language::Unknown {
                continue;
            }
            files.push(entry.into_path());
        }

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x = 1\n").unwrap();
    }

    #[test]
    fn test_discovers_supported_files_sorted() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.py");
        touch(tmp.path(), "a.js");
        touch(tmp.path(), "notes.md");

        let files = WalkDiscoverer::new().discover(tmp.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.js", "b.py"]);
    }

    #[test]
    fn test_excluded_directories_are_skipped() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "keep.py");
        touch(tmp.path(), "node_modules/dep.js");
        touch(tmp.path(), "sub/__pycache__/cached.py");
        touch(tmp.path(), "sub/also.py");

        let files = WalkDiscoverer::new().discover(tmp.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| {
            let s = p.to_string_lossy();
            !s.contains("node_modules") && !s.contains("__pycache__")
        }));
    }

    #[test]
    fn test_invalid_root_is_an_error() {
        let err = WalkDiscoverer::new()
            .discover(Path::new("/definitely/not/here"))
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidRoot(_)));
    }
}
