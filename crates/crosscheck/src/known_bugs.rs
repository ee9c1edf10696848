//! Regex filter for compiler bugs that have already been reported upstream.

use std::fs;
use std::path::Path;

use crosscheck_oracle::Outcome;
use regex::Regex;

use crate::error::{Error, Result};

/// Suppresses outcomes whose captured output matches an already-known bug.
///
/// The pattern file holds one regular expression per line. Blank lines and
/// lines starting with `#` are skipped.
#[derive(Debug, Default)]
pub struct KnownBugFilter {
    patterns: Vec<Regex>,
}

impl KnownBugFilter {
    /// Load and compile a pattern file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Config`]
    /// if a line does not compile as a regex.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut patterns = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let pattern = Regex::new(line).map_err(|err| {
                Error::Config(format!(
                    "{}:{}: bad pattern: {err}",
                    path.display(),
                    idx + 1
                ))
            })?;
            patterns.push(pattern);
        }
        Ok(Self { patterns })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether any pattern matches the given output.
    #[must_use]
    pub fn matches(&self, output: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(output))
    }

    /// Whether any pattern matches the stderr or stdout captured in the
    /// outcome's evidence.
    #[must_use]
    pub fn matches_outcome(&self, outcome: &Outcome) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        match outcome {
            Outcome::Verdict(verdict) => verdict
                .evidence
                .iter()
                .any(|result| self.matches_streams(&result.stderr, &result.stdout)),
            Outcome::CompileFailed(results) | Outcome::CompileTimeout(results) => {
                results.iter().any(|result| {
                    self.matches_streams(&result.execution.stderr, &result.execution.stdout)
                })
            }
        }
    }

    fn matches_streams(&self, stderr: &[u8], stdout: &[u8]) -> bool {
        self.matches(&String::from_utf8_lossy(stderr))
            || self.matches(&String::from_utf8_lossy(stdout))
    }
}
