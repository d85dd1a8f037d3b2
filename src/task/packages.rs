//! Package preparation — the dependency seam
//!
//! A submission declares the locations its task code depends on. The
//! preparer makes those locations resolvable before the task runs; the
//! default implementation validates each path and prepends it to an
//! ordered search-root list, newest first.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Error, Result};

/// Makes declared dependency locations resolvable before execution
pub trait PackagePreparer: Send + Sync {
    /// Prepare the given locations; called once per submission
    fn prepare(&self, locations: &[String]) -> Result<()>;
}

/// Default preparer keeping an ordered list of validated search roots
#[derive(Clone, Default)]
pub struct PathPreparer {
    roots: Arc<RwLock<Vec<PathBuf>>>,
}

impl PathPreparer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently prepared search roots, most recent first
    pub fn roots(&self) -> Vec<PathBuf> {
        self.roots.read().clone()
    }
}

impl PackagePreparer for PathPreparer {
    fn prepare(&self, locations: &[String]) -> Result<()> {
        for location in locations {
            let path = PathBuf::from(location);
            if !path.exists() {
                return Err(Error::PackageUnavailable {
                    location: location.clone(),
                });
            }
            let mut roots = self.roots.write();
            if !roots.contains(&path) {
                debug!(location = %location, "Prepared package location");
                roots.insert(0, path);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_existing_paths() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let preparer = PathPreparer::new();

        preparer
            .prepare(&[
                dir_a.path().to_string_lossy().to_string(),
                dir_b.path().to_string_lossy().to_string(),
            ])
            .unwrap();

        // most recent first
        let roots = preparer.roots();
        assert_eq!(roots[0], dir_b.path());
        assert_eq!(roots[1], dir_a.path());
    }

    #[test]
    fn test_prepare_missing_path() {
        let preparer = PathPreparer::new();
        let err = preparer
            .prepare(&["/does/not/exist/anywhere".to_string()])
            .unwrap_err();
        assert!(matches!(err, Error::PackageUnavailable { .. }));
    }

    #[test]
    fn test_prepare_deduplicates() {
        let dir = TempDir::new().unwrap();
        let location = dir.path().to_string_lossy().to_string();
        let preparer = PathPreparer::new();

        preparer.prepare(&[location.clone()]).unwrap();
        preparer.prepare(&[location]).unwrap();
        assert_eq!(preparer.roots().len(), 1);
    }

    #[test]
    fn test_prepare_empty_list() {
        let preparer = PathPreparer::new();
        assert!(preparer.prepare(&[]).is_ok());
        assert!(preparer.roots().is_empty());
    }
}
