//! Per-session record of files already written.

use std::collections::HashSet;
use std::fs;
use std::io::{ErrorKind, Result as IoResult};
use std::path::{Path, PathBuf};

/// How a write to a path must proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// First write of the session; any earlier file has been removed.
    Fresh {
        /// Whether a pre-existing file was deleted.
        removed_existing: bool,
    },
    /// The path was already written this session; append to it.
    Appending,
}

/// Set of paths truncated during this session.
///
/// A path enters the set exactly once, on its first write.
#[derive(Debug, Clone, Default)]
pub struct FileRegistry {
    written: HashSet<PathBuf>,
}

impl FileRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `path` has been written this session.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.written.contains(path)
    }

    /// Number of registered paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.written.len()
    }

    /// Whether no path has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }

    /// Claims `path` for writing, removing a stale file on the first claim.
    ///
    /// A missing file is not an error. If removal fails the path is not
    /// registered, so the next claim retries the removal.
    pub fn claim(&mut self, path: &Path) -> IoResult<Claim> {
        if self.written.contains(path) {
            return Ok(Claim::Appending);
        }
        let removed_existing = match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e),
        };
        self.written.insert(path.to_path_buf());
        Ok(Claim::Fresh { removed_existing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn first_claim_removes_stale_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.gdat");
        fs::write(&path, "stale").unwrap();

        let mut registry = FileRegistry::new();
        assert_eq!(registry.claim(&path).unwrap(), Claim::Fresh { removed_existing: true });
        assert!(!path.exists());
        assert!(registry.contains(&path));

        fs::write(&path, "fresh").unwrap();
        assert_eq!(registry.claim(&path).unwrap(), Claim::Appending);
        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn missing_file_is_fine() {
        let dir = tempdir().unwrap();
        let mut registry = FileRegistry::new();
        let claim = registry.claim(&dir.path().join("absent.gdat")).unwrap();
        assert_eq!(claim, Claim::Fresh { removed_existing: false });
    }

    #[test]
    fn failed_removal_is_not_registered() {
        let dir = tempdir().unwrap();
        // A directory cannot be removed with remove_file.
        let path = dir.path().join("occupied");
        fs::create_dir(&path).unwrap();

        let mut registry = FileRegistry::new();
        assert!(registry.claim(&path).is_err());
        assert!(registry.is_empty());
    }
}
