//! Check command.
//!
//! `check` is the oracle as an interestingness script: exit 0 when the
//! candidate reproduces the divergence, 1 when it does not, 2 when the
//! oracle itself failed. Delta debuggers drive it directly.

use std::path::Path;
use std::time::Duration;

use crosscheck_oracle::{
    Backend, Candidate, CompilerUnderTest, Evaluation, Oracle, OracleConfig, Outcome, RetainPolicy,
};

use crate::cli::{BackendArg, CriterionArg, EXIT_ERROR, EXIT_INTERESTING, EXIT_NOT_INTERESTING};
use crate::terminal::{self, Spinner};

/// Handle the `check` command.
#[allow(clippy::too_many_arguments)]
pub fn cmd_check(
    program: &Path,
    criterion: CriterionArg,
    compiler_path: &Path,
    host: Option<&Path>,
    backends: &[BackendArg],
    compile_timeout: u64,
    run_timeout: u64,
    scratch: Option<&Path>,
    keep: bool,
) -> i32 {
    let mut compiler = CompilerUnderTest::new(compiler_path);
    if let Some(host) = host {
        compiler = compiler.with_host(host);
    }

    let targets: Vec<Backend> = backends.iter().copied().map(Backend::from).collect();
    let mut config = OracleConfig::new(compiler, criterion.into())
        .with_backends(targets)
        .with_compile_timeout(Duration::from_secs(compile_timeout))
        .with_run_timeout(Duration::from_secs(run_timeout));
    if let Some(dir) = scratch {
        config = config.with_scratch_dir(dir);
    }
    if keep {
        config = config.with_retain(RetainPolicy::Interesting);
    }

    let oracle = match Oracle::new(config) {
        Ok(oracle) => oracle,
        Err(e) => {
            terminal::error(&format!("invalid configuration: {e}"));
            return EXIT_ERROR;
        }
    };
    let candidate = match Candidate::from_source(program) {
        Ok(candidate) => candidate,
        Err(e) => {
            terminal::error(&format!("cannot read candidate: {e}"));
            return EXIT_ERROR;
        }
    };

    let spinner = Spinner::new(format!("Evaluating {}", program.display()));
    match oracle.evaluate(&candidate) {
        Ok(evaluation) => report(&evaluation, spinner),
        Err(e) => {
            spinner.finish_with_failure("oracle failed");
            terminal::error(&e.to_string());
            EXIT_ERROR
        }
    }
}

fn report(evaluation: &Evaluation, spinner: Spinner) -> i32 {
    match &evaluation.outcome {
        Outcome::Verdict(verdict) if verdict.interesting => {
            spinner.finish_with_success(&format!("interesting: {}", verdict.reason));
            if let Some(workspace) = &evaluation.workspace {
                terminal::path_output(workspace);
            }
            EXIT_INTERESTING
        }
        Outcome::Verdict(_) => {
            drop(spinner);
            terminal::info("not interesting: backends agree");
            EXIT_NOT_INTERESTING
        }
        Outcome::CompileTimeout(_) => {
            drop(spinner);
            terminal::warning("compile timed out; nothing was run");
            EXIT_NOT_INTERESTING
        }
        Outcome::CompileFailed(compiles) => {
            drop(spinner);
            let rejected: Vec<String> = compiles
                .iter()
                .filter(|c| !c.status.is_success())
                .map(|c| c.backend.to_string())
                .collect();
            terminal::warning(&format!(
                "compiler rejected the candidate ({})",
                rejected.join(", ")
            ));
            EXIT_NOT_INTERESTING
        }
    }
}
