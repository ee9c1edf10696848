//! Invoking the compiler under test, once per backend target.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info_span, warn};

use crate::Result;
use crate::backend::Backend;
use crate::cancel::CancelToken;
use crate::candidate::Candidate;
use crate::process::{Execution, RunRequest};

/// The compiler binary plus an optional host runtime that launches it.
///
/// Managed compilers ship as host payloads, `dotnet Dafny.dll ...` style.
/// Native binaries leave the host unset.
#[derive(Debug, Clone)]
pub struct CompilerUnderTest {
    binary: PathBuf,
    host: Option<PathBuf>,
}

impl CompilerUnderTest {
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            host: None,
        }
    }

    /// Launch the binary through a host runtime.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<PathBuf>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn request(&self) -> RunRequest {
        match &self.host {
            Some(host) => RunRequest::new(host).arg(&self.binary),
            None => RunRequest::new(&self.binary),
        }
    }
}

/// How one backend's compile invocation fared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStatus {
    Succeeded,
    /// The compiler exited non-zero.
    Failed,
    /// The compiler exceeded its deadline.
    TimedOut,
    /// Clean exit, but the expected artifact never appeared.
    MissingArtifact,
}

impl CompileStatus {
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Succeeded)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed-out",
            Self::MissingArtifact => "missing-artifact",
        }
    }
}

impl std::fmt::Display for CompileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One backend's compile invocation with its captured output.
#[derive(Debug, Clone)]
pub struct CompileResult {
    pub backend: Backend,
    pub status: CompileStatus,
    /// Where the artifact is expected under the build directory.
    pub artifact: PathBuf,
    pub execution: Execution,
}

/// Compile the candidate for one backend, artifacts landing under `out_dir`.
///
/// Invokes `<compiler> build --no-verify --allow-warnings --target:<flag>
/// --output <dir> <source>` and checks afterwards that the backend's
/// artifact exists. Compiler failure, deadline overrun, and a missing
/// artifact are all reported through [`CompileStatus`], not as errors.
///
/// # Errors
///
/// [`Error::Launch`](crate::Error::Launch) when the compiler cannot be
/// spawned, [`Error::Cancelled`](crate::Error::Cancelled) when the token
/// trips mid-compile.
pub fn compile(
    compiler: &CompilerUnderTest,
    candidate: &Candidate,
    backend: Backend,
    out_dir: &Path,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<CompileResult> {
    let _span = info_span!("compile", backend = %backend).entered();

    let artifact_dir = backend.artifact_dir(out_dir, candidate.name());
    let artifact = backend.artifact_path(out_dir, candidate.name());

    let execution = compiler
        .request()
        .args(["build", "--no-verify", "--allow-warnings"])
        .arg(format!("--target:{}", backend.target_flag()))
        .arg("--output")
        .arg(&artifact_dir)
        .arg(candidate.source())
        .with_timeout(timeout)
        .with_cancel(cancel.clone())
        .run()?;

    let status = if execution.timed_out {
        CompileStatus::TimedOut
    } else if execution.exit_code != 0 {
        CompileStatus::Failed
    } else if artifact.is_file() {
        CompileStatus::Succeeded
    } else {
        CompileStatus::MissingArtifact
    };

    match status {
        CompileStatus::Succeeded => {
            debug!(artifact = %artifact.display(), duration = ?execution.duration, "compiled");
        }
        CompileStatus::TimedOut => {
            warn!(timeout = ?timeout, "compiler timed out");
        }
        CompileStatus::Failed | CompileStatus::MissingArtifact => {
            warn!(
                exit_code = execution.exit_code,
                error = %first_error_line(&execution),
                "compile failed"
            );
        }
    }

    Ok(CompileResult {
        backend,
        status,
        artifact,
        execution,
    })
}

/// First line of compiler output, stderr preferred.
fn first_error_line(execution: &Execution) -> String {
    let stderr = String::from_utf8_lossy(&execution.stderr);
    let stdout = String::from_utf8_lossy(&execution.stdout);
    stderr
        .lines()
        .next()
        .or_else(|| stdout.lines().next())
        .unwrap_or("unknown error")
        .to_string()
}
