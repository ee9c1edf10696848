//! Evidence records and on-disk persistence for interesting candidates.

use std::fs;
use std::io;
use std::path::Path;

use crosscheck_oracle::{
    Backend, CompileResult, CompileStatus, ExecutionResult, Outcome, Reason, Verdict,
};
use serde::Serialize;
use tracing::info;

use crate::error::Result;

/// Evidence file written next to each persisted candidate. The reducer's
/// interestingness script reads it back.
pub const EVIDENCE_FILENAME: &str = "error.json";

/// Status vocabulary shared with the downstream evidence consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgramStatus {
    ExpectedSuccess,
    CompilerError,
    CompilerTimeout,
    CompilerExitcodeNonZero,
    RuntimeExitcodeNonZero,
    RuntimeTimeout,
    RuntimeExitcodeDiffer,
    RuntimeStdoutDiffer,
    RuntimeStderrDiffer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    pub backend: String,
    pub program_status: ProgramStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendExitCode {
    pub backend: String,
    pub exit_code: i32,
}

/// Contents of [`EVIDENCE_FILENAME`].
///
/// `failed_target_backends` lists only backends whose own status is not
/// `EXPECTED_SUCCESS`; a pure divergence (all backends clean but disagreeing)
/// leaves it empty and is described by `overall_status` and `exit_codes`
/// alone. `exit_codes` covers every backend and is omitted for compile-phase
/// records, which have no runtime exits to report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceRecord {
    pub overall_status: ProgramStatus,
    pub failed_target_backends: Vec<BackendStatus>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exit_codes: Vec<BackendExitCode>,
}

impl EvidenceRecord {
    #[must_use]
    pub fn from_outcome(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::CompileTimeout(results) => {
                Self::from_compile(ProgramStatus::CompilerTimeout, results)
            }
            Outcome::CompileFailed(results) => {
                Self::from_compile(ProgramStatus::CompilerError, results)
            }
            Outcome::Verdict(verdict) => Self::from_verdict(verdict),
        }
    }

    fn from_compile(overall_status: ProgramStatus, results: &[CompileResult]) -> Self {
        let failed_target_backends = results
            .iter()
            .filter_map(|result| {
                let program_status = match result.status {
                    CompileStatus::Succeeded => return None,
                    CompileStatus::TimedOut => ProgramStatus::CompilerTimeout,
                    CompileStatus::Failed => ProgramStatus::CompilerExitcodeNonZero,
                    CompileStatus::MissingArtifact => ProgramStatus::CompilerError,
                };
                Some(BackendStatus {
                    backend: backend_name(result.backend),
                    program_status,
                })
            })
            .collect();
        Self {
            overall_status,
            failed_target_backends,
            exit_codes: Vec::new(),
        }
    }

    fn from_verdict(verdict: &Verdict) -> Self {
        let overall_status = match verdict.reason {
            Reason::Timeout => ProgramStatus::RuntimeTimeout,
            Reason::NonZeroExit => ProgramStatus::RuntimeExitcodeNonZero,
            Reason::ExitCodeDiffer => ProgramStatus::RuntimeExitcodeDiffer,
            Reason::StdoutDiffer => ProgramStatus::RuntimeStdoutDiffer,
            Reason::StderrDiffer => ProgramStatus::RuntimeStderrDiffer,
            Reason::NoneMatched => ProgramStatus::ExpectedSuccess,
        };
        let failed_target_backends = verdict
            .evidence
            .iter()
            .filter_map(|result| {
                let program_status = run_status(result);
                (program_status != ProgramStatus::ExpectedSuccess).then(|| BackendStatus {
                    backend: backend_name(result.backend),
                    program_status,
                })
            })
            .collect();
        let exit_codes = verdict
            .evidence
            .iter()
            .map(|result| BackendExitCode {
                backend: backend_name(result.backend),
                exit_code: result.exit_code,
            })
            .collect();
        Self {
            overall_status,
            failed_target_backends,
            exit_codes,
        }
    }
}

fn run_status(result: &ExecutionResult) -> ProgramStatus {
    if result.timed_out {
        ProgramStatus::RuntimeTimeout
    } else if result.exit_code != 0 {
        ProgramStatus::RuntimeExitcodeNonZero
    } else {
        ProgramStatus::ExpectedSuccess
    }
}

fn backend_name(backend: Backend) -> String {
    backend.as_str().to_ascii_uppercase()
}

/// Persist an interesting candidate under `dest`.
///
/// The generator's output directory is copied as `generation/`, a retained
/// build workspace (when present) as `build/`, followed by
/// [`EVIDENCE_FILENAME`] and per-backend `<backend>.stdout` /
/// `<backend>.stderr` captures. Creation of `dest` is first-wins: if it
/// already exists another runner beat us to the same candidate and this
/// returns `Ok(false)` without touching anything.
///
/// # Errors
///
/// Fails when copying or writing under `dest` fails for any reason other
/// than the first-wins race.
pub fn persist_evidence(
    dest: &Path,
    generation_dir: &Path,
    outcome: &Outcome,
    workspace: Option<&Path>,
) -> Result<bool> {
    match fs::create_dir(dest) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            info!(dest = %dest.display(), "candidate independently found; skipping");
            return Ok(false);
        }
        Err(err) => return Err(err.into()),
    }

    copy_dir_recursive(generation_dir, &dest.join("generation"))?;
    if let Some(workspace) = workspace {
        copy_dir_recursive(workspace, &dest.join("build"))?;
    }

    let record = EvidenceRecord::from_outcome(outcome);
    let file = fs::File::create(dest.join(EVIDENCE_FILENAME))?;
    serde_json::to_writer_pretty(io::BufWriter::new(file), &record)?;
    write_captures(dest, outcome)?;

    info!(
        dest = %dest.display(),
        status = ?record.overall_status,
        "evidence persisted"
    );
    Ok(true)
}

fn write_captures(dest: &Path, outcome: &Outcome) -> Result<()> {
    match outcome {
        Outcome::Verdict(verdict) => {
            for result in &verdict.evidence {
                write_streams(dest, result.backend, &result.stdout, &result.stderr)?;
            }
        }
        Outcome::CompileFailed(results) | Outcome::CompileTimeout(results) => {
            for result in results {
                write_streams(
                    dest,
                    result.backend,
                    &result.execution.stdout,
                    &result.execution.stderr,
                )?;
            }
        }
    }
    Ok(())
}

fn write_streams(dest: &Path, backend: Backend, stdout: &[u8], stderr: &[u8]) -> Result<()> {
    fs::write(dest.join(format!("{backend}.stdout")), stdout)?;
    fs::write(dest.join(format!("{backend}.stderr")), stderr)?;
    Ok(())
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
