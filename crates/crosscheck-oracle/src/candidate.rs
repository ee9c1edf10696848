use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// A single source program under evaluation.
///
/// Immutable for the duration of an oracle invocation. The name (file stem)
/// doubles as the artifact base name the compiler derives its output layout
/// from.
#[derive(Debug, Clone)]
pub struct Candidate {
    source: PathBuf,
    name: String,
}

impl Candidate {
    /// Build a candidate from its source file path.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the path has no file stem.
    pub fn from_source(source: impl Into<PathBuf>) -> Result<Self> {
        let source = source.into();
        let name = source
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                Error::Config(format!("candidate has no file stem: {}", source.display()))
            })?
            .to_string();
        Ok(Self { source, name })
    }

    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}
