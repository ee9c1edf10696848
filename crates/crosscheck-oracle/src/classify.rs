//! Differential classification of per-backend execution results.
//!
//! Classification is pure: same results and criterion, same verdict,
//! regardless of how the executions interleaved.

use std::time::Duration;

use crate::backend::Backend;
use crate::process::Execution;
use crate::{Error, Result};

/// Observed behavior of one backend's compiled artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub backend: Backend,
    /// Exit code, or `-1` when the run timed out or died to a signal.
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
    pub duration: Duration,
}

impl ExecutionResult {
    #[must_use]
    pub fn from_execution(backend: Backend, execution: Execution) -> Self {
        Self {
            backend,
            exit_code: execution.exit_code,
            stdout: execution.stdout,
            stderr: execution.stderr,
            timed_out: execution.timed_out,
            duration: execution.duration,
        }
    }
}

/// Interestingness rule applied to one result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    /// Any backend exceeded the runtime deadline.
    Timeout,
    /// Any backend exited non-zero.
    NonZeroExit,
    /// Backends disagree on the exit code.
    ExitCodeDiffer,
    /// Backends disagree on stdout, compared byte for byte.
    StdoutDiffer,
    /// Backends disagree on stderr, compared byte for byte.
    StderrDiffer,
}

impl Criterion {
    pub const ALL: &'static [Self] = &[
        Self::Timeout,
        Self::NonZeroExit,
        Self::ExitCodeDiffer,
        Self::StdoutDiffer,
        Self::StderrDiffer,
    ];

    /// Differential criteria compare across backends and need at least two.
    #[must_use]
    pub const fn requires_pair(self) -> bool {
        matches!(
            self,
            Self::ExitCodeDiffer | Self::StdoutDiffer | Self::StderrDiffer
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::NonZeroExit => "nonzero-exit",
            Self::ExitCodeDiffer => "exit-code-differ",
            Self::StdoutDiffer => "stdout-differ",
            Self::StderrDiffer => "stderr-differ",
        }
    }
}

impl std::fmt::Display for Criterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a verdict came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Timeout,
    NonZeroExit,
    ExitCodeDiffer,
    StdoutDiffer,
    StderrDiffer,
    /// No criterion held; the candidate is boring.
    NoneMatched,
}

impl Reason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::NonZeroExit => "nonzero-exit",
            Self::ExitCodeDiffer => "exit-code-differ",
            Self::StdoutDiffer => "stdout-differ",
            Self::StderrDiffer => "stderr-differ",
            Self::NoneMatched => "none-matched",
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Criterion> for Reason {
    fn from(criterion: Criterion) -> Self {
        match criterion {
            Criterion::Timeout => Self::Timeout,
            Criterion::NonZeroExit => Self::NonZeroExit,
            Criterion::ExitCodeDiffer => Self::ExitCodeDiffer,
            Criterion::StdoutDiffer => Self::StdoutDiffer,
            Criterion::StderrDiffer => Self::StderrDiffer,
        }
    }
}

/// Classification outcome plus the evidence that produced it.
///
/// Evidence keeps the caller's backend order.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub interesting: bool,
    pub reason: Reason,
    pub evidence: Vec<ExecutionResult>,
}

/// Apply one criterion to a result set.
///
/// # Errors
///
/// [`Error::Config`] for an empty result set, or when a differential
/// criterion gets fewer than two results.
pub fn classify(results: &[ExecutionResult], criterion: Criterion) -> Result<Verdict> {
    validate(results, criterion)?;
    let verdict = if matches(results, criterion) {
        Verdict {
            interesting: true,
            reason: criterion.into(),
            evidence: results.to_vec(),
        }
    } else {
        Verdict {
            interesting: false,
            reason: Reason::NoneMatched,
            evidence: results.to_vec(),
        }
    };
    Ok(verdict)
}

/// Apply criteria in order; the first match wins.
///
/// Reproduces a campaign's check ordering over a single result set without
/// re-running anything.
///
/// # Errors
///
/// [`Error::Config`] under the same conditions as [`classify`], checked for
/// every listed criterion up front.
pub fn classify_cascade(results: &[ExecutionResult], criteria: &[Criterion]) -> Result<Verdict> {
    for &criterion in criteria {
        validate(results, criterion)?;
    }
    for &criterion in criteria {
        if matches(results, criterion) {
            return Ok(Verdict {
                interesting: true,
                reason: criterion.into(),
                evidence: results.to_vec(),
            });
        }
    }
    Ok(Verdict {
        interesting: false,
        reason: Reason::NoneMatched,
        evidence: results.to_vec(),
    })
}

fn validate(results: &[ExecutionResult], criterion: Criterion) -> Result<()> {
    if results.is_empty() {
        return Err(Error::Config(
            "classification requires at least one execution result".to_string(),
        ));
    }
    if criterion.requires_pair() && results.len() < 2 {
        return Err(Error::Config(format!(
            "criterion {criterion} requires at least two backends, got {}",
            results.len()
        )));
    }
    Ok(())
}

fn matches(results: &[ExecutionResult], criterion: Criterion) -> bool {
    match criterion {
        Criterion::Timeout => results.iter().any(|r| r.timed_out),
        Criterion::NonZeroExit => results.iter().any(|r| r.exit_code != 0),
        Criterion::ExitCodeDiffer => !all_equal(results, |r| &r.exit_code),
        Criterion::StdoutDiffer => !all_equal(results, |r| &r.stdout),
        Criterion::StderrDiffer => !all_equal(results, |r| &r.stderr),
    }
}

/// Every element compares equal to the first.
fn all_equal<T, F>(results: &[ExecutionResult], key: F) -> bool
where
    T: PartialEq + ?Sized,
    F: Fn(&ExecutionResult) -> &T,
{
    let Some((first, rest)) = results.split_first() else {
        return true;
    };
    rest.iter().all(|r| key(r) == key(first))
}
