//! The differential oracle: compile everywhere, run everywhere, classify.
//!
//! One [`Oracle::evaluate`] call takes a candidate through three phases
//! inside a fresh workspace:
//!
//! 1. compile for every configured backend, in configuration order;
//! 2. if all compiles succeeded, run every artifact;
//! 3. classify the runs under the configured criterion.
//!
//! A compile failure or compile timeout ends the evaluation early with a
//! terminal outcome; runtime failures never do, they are material for
//! classification. Launch failures and cancellation are the only errors.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info_span};

use crate::backend::{Backend, BackendTable};
use crate::cancel::CancelToken;
use crate::candidate::Candidate;
use crate::classify::{Criterion, Verdict, classify};
use crate::compile::{CompileResult, CompileStatus, CompilerUnderTest, compile};
use crate::run::execute;
use crate::workspace::Workspace;
use crate::{Error, Result};

/// Default compile and run deadline per backend.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// What to do with a candidate's workspace after evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetainPolicy {
    /// Delete the workspace regardless of outcome.
    #[default]
    Never,
    /// Keep the workspace when the outcome is an interesting verdict.
    Interesting,
    /// Always keep. Callers that re-classify the evidence under further
    /// criteria use this and remove the tree themselves once done.
    Always,
}

/// Everything one evaluation needs, explicit at the call site.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub compiler: CompilerUnderTest,
    /// Backends to cross-check, in compile and run order.
    pub backends: Vec<Backend>,
    pub table: BackendTable,
    pub compile_timeout: Duration,
    pub run_timeout: Duration,
    pub criterion: Criterion,
    /// Workspaces are created under this directory.
    pub scratch_dir: PathBuf,
    pub retain: RetainPolicy,
}

impl OracleConfig {
    /// Defaults: the supported backend set, stock launchers, 30 second
    /// deadlines, workspaces under the system temp dir, deleted afterwards.
    #[must_use]
    pub fn new(compiler: CompilerUnderTest, criterion: Criterion) -> Self {
        Self {
            compiler,
            backends: Backend::DEFAULT_TARGETS.to_vec(),
            table: BackendTable::default(),
            compile_timeout: DEFAULT_TIMEOUT,
            run_timeout: DEFAULT_TIMEOUT,
            criterion,
            scratch_dir: std::env::temp_dir(),
            retain: RetainPolicy::Never,
        }
    }

    #[must_use]
    pub fn with_backends(mut self, backends: impl Into<Vec<Backend>>) -> Self {
        self.backends = backends.into();
        self
    }

    #[must_use]
    pub fn with_table(mut self, table: BackendTable) -> Self {
        self.table = table;
        self
    }

    #[must_use]
    pub const fn with_compile_timeout(mut self, timeout: Duration) -> Self {
        self.compile_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    #[must_use]
    pub const fn with_retain(mut self, retain: RetainPolicy) -> Self {
        self.retain = retain;
        self
    }
}

/// Terminal result of evaluating one candidate.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Every backend compiled; the runs were classified.
    Verdict(Verdict),
    /// At least one backend rejected the candidate. Nothing was run.
    CompileFailed(Vec<CompileResult>),
    /// At least one compile exceeded its deadline; outranks plain compile
    /// failure when both happened. Nothing was run.
    CompileTimeout(Vec<CompileResult>),
}

impl Outcome {
    /// Whether the configured criterion held. Compile failures are terminal
    /// but not interesting; the campaign layer decides separately whether
    /// to file them as compiler-rejection reports.
    #[must_use]
    pub const fn is_interesting(&self) -> bool {
        matches!(self, Self::Verdict(v) if v.interesting)
    }
}

/// Outcome plus the workspace path, when the retention policy kept it.
#[derive(Debug)]
pub struct Evaluation {
    pub outcome: Outcome,
    pub workspace: Option<PathBuf>,
}

/// A validated configuration, ready to evaluate candidates.
#[derive(Debug)]
pub struct Oracle {
    config: OracleConfig,
    cancel: CancelToken,
}

impl Oracle {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the backend list is empty, repeats a backend,
    /// or names an unsupported one; when a listed backend has no launcher
    /// in the table; when a differential criterion has fewer than two
    /// backends to compare; or when either timeout is zero.
    pub fn new(config: OracleConfig) -> Result<Self> {
        if config.backends.is_empty() {
            return Err(Error::Config("no target backends selected".to_string()));
        }
        let mut seen = HashSet::new();
        for &backend in &config.backends {
            if !backend.supported() {
                return Err(Error::Config(format!(
                    "backend {backend} is not supported for differential testing"
                )));
            }
            if !seen.insert(backend) {
                return Err(Error::Config(format!("backend {backend} listed twice")));
            }
            if config.table.launch_spec(backend).is_none() {
                return Err(Error::Config(format!(
                    "no launcher configured for backend {backend}"
                )));
            }
        }
        if config.criterion.requires_pair() && config.backends.len() < 2 {
            return Err(Error::Config(format!(
                "criterion {} requires at least two backends, got {}",
                config.criterion,
                config.backends.len()
            )));
        }
        if config.compile_timeout.is_zero() || config.run_timeout.is_zero() {
            return Err(Error::Config("timeouts must be non-zero".to_string()));
        }
        Ok(Self {
            config,
            cancel: CancelToken::new(),
        })
    }

    /// Attach a cancellation token, checked between phases and while
    /// children run.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Evaluate one candidate in a fresh workspace.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the workspace cannot be created,
    /// [`Error::Launch`] when the compiler or a launcher cannot be spawned,
    /// and [`Error::Cancelled`] when the token trips. Compile failures and
    /// runtime misbehavior are outcomes, not errors.
    pub fn evaluate(&self, candidate: &Candidate) -> Result<Evaluation> {
        let _span = info_span!("evaluate", candidate = candidate.name()).entered();

        let workspace = Workspace::create_in(&self.config.scratch_dir)?;
        let outcome = self.evaluate_in(candidate, &workspace)?;

        let keep = match self.config.retain {
            RetainPolicy::Never => false,
            RetainPolicy::Interesting => outcome.is_interesting(),
            RetainPolicy::Always => true,
        };
        let workspace = keep.then(|| workspace.keep());
        Ok(Evaluation { outcome, workspace })
    }

    fn evaluate_in(&self, candidate: &Candidate, workspace: &Workspace) -> Result<Outcome> {
        let build_dir = workspace.build_dir();

        // Compile everywhere before deciding: the evidence wants the full
        // per-backend picture even after the first failure.
        let mut compiles = Vec::with_capacity(self.config.backends.len());
        for &backend in &self.config.backends {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            compiles.push(compile(
                &self.config.compiler,
                candidate,
                backend,
                &build_dir,
                self.config.compile_timeout,
                &self.cancel,
            )?);
        }

        if compiles
            .iter()
            .any(|c| c.status == CompileStatus::TimedOut)
        {
            return Ok(Outcome::CompileTimeout(compiles));
        }
        if compiles.iter().any(|c| !c.status.is_success()) {
            return Ok(Outcome::CompileFailed(compiles));
        }

        let mut results = Vec::with_capacity(compiles.len());
        for compiled in &compiles {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let cwd = workspace.run_dir(compiled.backend)?;
            results.push(execute(
                &self.config.table,
                compiled.backend,
                &compiled.artifact,
                &cwd,
                self.config.run_timeout,
                &self.cancel,
            )?);
        }

        let verdict = classify(&results, self.config.criterion)?;
        debug!(
            interesting = verdict.interesting,
            reason = ?verdict.reason,
            "classified"
        );
        Ok(Outcome::Verdict(verdict))
    }
}
