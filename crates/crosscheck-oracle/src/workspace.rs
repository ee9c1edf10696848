//! Per-invocation scratch directories.

use std::path::{Path, PathBuf};

use crate::backend::Backend;
use crate::Result;

/// Unique scratch area for one oracle invocation.
///
/// Layout:
///
/// ```text
/// <scratch>/crosscheck-XXXX/
///   build/            compiler output, one subtree per candidate
///   run/<backend>/    working directory for executing that backend
/// ```
///
/// Removed on drop. [`Workspace::keep`] disarms the cleanup when evidence
/// should outlive the invocation.
#[derive(Debug)]
pub struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    /// Create a fresh workspace under `scratch`, creating `scratch` itself
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns IO errors from directory creation.
    pub fn create_in(scratch: &Path) -> Result<Self> {
        std::fs::create_dir_all(scratch)?;
        let dir = tempfile::Builder::new()
            .prefix("crosscheck-")
            .tempdir_in(scratch)?;
        std::fs::create_dir(dir.path().join("build"))?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn build_dir(&self) -> PathBuf {
        self.dir.path().join("build")
    }

    /// Working directory for executing one backend's artifact, created on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns IO errors from directory creation.
    pub fn run_dir(&self, backend: Backend) -> Result<PathBuf> {
        let dir = self.dir.path().join("run").join(backend.as_str());
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Disarm cleanup and return the workspace path.
    #[must_use]
    pub fn keep(self) -> PathBuf {
        self.dir.keep()
    }
}
