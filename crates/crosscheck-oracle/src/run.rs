//! Running compiled artifacts through per-backend launchers.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info_span};

use crate::backend::{Backend, BackendTable};
use crate::cancel::CancelToken;
use crate::classify::ExecutionResult;
use crate::process::RunRequest;
use crate::{Error, Result};

/// Execute one backend's artifact and capture its behavior.
///
/// The launcher comes from the table: `go run <artifact>`, `python3
/// <artifact>`, and so on. The child runs inside `cwd` so launcher
/// droppings (go build caches, `__pycache__`) stay out of the build tree.
/// A runtime deadline overrun is captured in the result, never an error:
/// a hanging backend is a behavior worth classifying.
///
/// # Errors
///
/// [`Error::Config`] when the table has no launcher for `backend`,
/// [`Error::Launch`] when the launcher cannot be spawned, and
/// [`Error::Cancelled`] when the token trips mid-run.
pub fn execute(
    table: &BackendTable,
    backend: Backend,
    artifact: &Path,
    cwd: &Path,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<ExecutionResult> {
    let _span = info_span!("run", backend = %backend).entered();

    let spec = table
        .launch_spec(backend)
        .ok_or_else(|| Error::Config(format!("no launcher configured for backend {backend}")))?;

    let execution = RunRequest::new(&spec.launcher)
        .args(&spec.args)
        .arg(artifact)
        .with_cwd(cwd)
        .with_timeout(timeout)
        .with_cancel(cancel.clone())
        .run()?;

    debug!(
        exit_code = execution.exit_code,
        timed_out = execution.timed_out,
        duration = ?execution.duration,
        "backend run finished"
    );

    Ok(ExecutionResult::from_execution(backend, execution))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LaunchSpec;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[test]
    fn launcher_receives_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("main.js");
        std::fs::write(&artifact, "echo hello from artifact\n").unwrap();
        let table = BackendTable::default()
            .with_launch_spec(Backend::Javascript, LaunchSpec::new("/bin/sh"));

        let result = execute(
            &table,
            Backend::Javascript,
            &artifact,
            dir.path(),
            Duration::from_secs(10),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(result.backend, Backend::Javascript);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, b"hello from artifact\n");
    }

    #[test]
    fn launcher_args_precede_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = write_script(dir.path(), "launcher.sh", r#"printf '%s\n' "$@""#);
        let artifact = dir.path().join("main-go");
        std::fs::write(&artifact, "").unwrap();
        let table = BackendTable::default()
            .with_launch_spec(Backend::Go, LaunchSpec::new(launcher).with_args(["run"]));

        let result = execute(
            &table,
            Backend::Go,
            &artifact,
            dir.path(),
            Duration::from_secs(10),
            &CancelToken::new(),
        )
        .unwrap();

        let argv: Vec<String> = String::from_utf8_lossy(&result.stdout)
            .lines()
            .map(str::to_string)
            .collect();
        assert_eq!(argv, ["run".to_string(), artifact.display().to_string()]);
    }

    #[test]
    fn unconfigured_backend_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = execute(
            &BackendTable::default(),
            Backend::Java,
            Path::new("main.java"),
            dir.path(),
            Duration::from_secs(1),
            &CancelToken::new(),
        )
        .unwrap_err();

        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn runtime_timeout_is_a_result_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("main.py");
        std::fs::write(&artifact, "sleep 30\n").unwrap();
        let table =
            BackendTable::default().with_launch_spec(Backend::Python, LaunchSpec::new("/bin/sh"));

        let result = execute(
            &table,
            Backend::Python,
            &artifact,
            dir.path(),
            Duration::from_millis(200),
            &CancelToken::new(),
        )
        .unwrap();

        assert!(result.timed_out);
        assert_eq!(result.exit_code, -1);
    }

    #[test]
    fn child_runs_inside_the_given_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = dir.path().join("run");
        std::fs::create_dir(&run_dir).unwrap();
        let artifact = dir.path().join("main.py");
        std::fs::write(&artifact, "pwd\n").unwrap();
        let table =
            BackendTable::default().with_launch_spec(Backend::Python, LaunchSpec::new("/bin/sh"));

        let result = execute(
            &table,
            Backend::Python,
            &artifact,
            &run_dir,
            Duration::from_secs(10),
            &CancelToken::new(),
        )
        .unwrap();

        let reported = PathBuf::from(String::from_utf8_lossy(&result.stdout).trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            run_dir.canonicalize().unwrap()
        );
    }
}
