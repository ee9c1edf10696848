//! End-to-end oracle scenarios against a scripted fake compiler.
//!
//! The fake compiler understands the real argv shape (`build --no-verify
//! --allow-warnings --target:<t> --output <dir> <source>`) and drops
//! artifacts in the real per-backend layout. Marker files in a control
//! directory select misbehavior per target. Each artifact is a shell
//! script that logs its run and replays the candidate source with the
//! backend name as `$1`, so candidates script per-backend behavior.

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;

use crosscheck_oracle::{
    Backend, BackendTable, CancelToken, Candidate, CompileStatus, CompilerUnderTest, Criterion,
    Error, ExecutionResult, LaunchSpec, Oracle, OracleConfig, Outcome, Reason, RetainPolicy,
    Verdict,
};

const COMPILER_TEMPLATE: &str = r#"#!/bin/sh
ctl=__CTL__
target=""
out=""
src=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    --target:*) target="${1#--target:}"; shift ;;
    --output) out="$2"; shift 2 ;;
    build|--no-verify|--allow-warnings) shift ;;
    *) src="$1"; shift ;;
  esac
done
name=$(basename "$src" .dfy)
echo "$target" >> "$ctl/compiled.log"
if [ -f "$ctl/hang-$target" ]; then sleep 30; fi
if [ -f "$ctl/reject-$target" ]; then
  echo "main.dfy(1,0): Error: rejected for $target" >&2
  exit 1
fi
case "$target" in
  go) rel="$name-go/src/$name.go" ;;
  py) rel="$name-py/__main__.py" ;;
  cs) rel="$name.dll" ;;
  js) rel="$name.js" ;;
  java) rel="$name-java/$name.java" ;;
esac
if [ -f "$ctl/no-artifact-$target" ]; then exit 0; fi
mkdir -p "$(dirname "$out/$rel")"
{
  echo '#!/bin/sh'
  echo "echo $target >> $ctl/ran.log"
  echo "exec /bin/sh $src $target"
} > "$out/$rel"
"#;

struct Harness {
    dir: tempfile::TempDir,
    compiler: PathBuf,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let ctl = dir.path().join("ctl");
        std::fs::create_dir(&ctl).unwrap();

        let compiler = dir.path().join("fake-compiler.sh");
        let body = COMPILER_TEMPLATE.replace("__CTL__", &ctl.display().to_string());
        std::fs::write(&compiler, body).unwrap();
        let mut perms = std::fs::metadata(&compiler).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&compiler, perms).unwrap();

        Self { dir, compiler }
    }

    fn ctl(&self) -> PathBuf {
        self.dir.path().join("ctl")
    }

    fn mark(&self, marker: &str) {
        std::fs::write(self.ctl().join(marker), "").unwrap();
    }

    fn candidate(&self, script: &str) -> Candidate {
        let source = self.dir.path().join("main.dfy");
        std::fs::write(&source, script).unwrap();
        Candidate::from_source(source).unwrap()
    }

    fn config(&self, criterion: Criterion) -> OracleConfig {
        // Artifacts are plain shell scripts; every launcher is sh.
        let table = BackendTable::empty()
            .with_launch_spec(Backend::Go, LaunchSpec::new("/bin/sh"))
            .with_launch_spec(Backend::Python, LaunchSpec::new("/bin/sh"))
            .with_launch_spec(Backend::Csharp, LaunchSpec::new("/bin/sh"))
            .with_launch_spec(Backend::Javascript, LaunchSpec::new("/bin/sh"));
        OracleConfig::new(CompilerUnderTest::new(&self.compiler), criterion)
            .with_table(table)
            .with_scratch_dir(self.dir.path().join("scratch"))
            .with_compile_timeout(Duration::from_secs(20))
            .with_run_timeout(Duration::from_secs(20))
    }

    fn log(&self, name: &str) -> Vec<String> {
        std::fs::read_to_string(self.ctl().join(name))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn compiled(&self) -> Vec<String> {
        self.log("compiled.log")
    }

    fn ran(&self) -> Vec<String> {
        self.log("ran.log")
    }
}

fn verdict(outcome: Outcome) -> Verdict {
    match outcome {
        Outcome::Verdict(verdict) => verdict,
        other => panic!("expected a verdict, got {other:?}"),
    }
}

fn result_for(verdict: &Verdict, backend: Backend) -> &ExecutionResult {
    verdict
        .evidence
        .iter()
        .find(|r| r.backend == backend)
        .unwrap()
}

#[test]
fn agreeing_backends_are_boring() {
    let h = Harness::new();
    let candidate = h.candidate("echo 42\n");
    let oracle = Oracle::new(h.config(Criterion::StdoutDiffer)).unwrap();

    let evaluation = oracle.evaluate(&candidate).unwrap();
    assert!(!evaluation.outcome.is_interesting());
    assert!(evaluation.workspace.is_none());

    let verdict = verdict(evaluation.outcome);
    assert_eq!(verdict.reason, Reason::NoneMatched);
    assert_eq!(verdict.evidence.len(), 4);
    for result in &verdict.evidence {
        assert_eq!(result.exit_code, 0, "{}", result.backend);
        assert_eq!(result.stdout, b"42\n");
    }

    // Configuration order, compile then run.
    assert_eq!(h.compiled(), ["go", "py", "cs", "js"]);
    assert_eq!(h.ran(), ["go", "py", "cs", "js"]);
}

#[test]
fn stdout_divergence_is_flagged() {
    let h = Harness::new();
    let candidate = h.candidate("if [ \"$1\" = py ]; then echo 41; else echo 42; fi\n");
    let oracle = Oracle::new(h.config(Criterion::StdoutDiffer)).unwrap();

    let evaluation = oracle.evaluate(&candidate).unwrap();
    assert!(evaluation.outcome.is_interesting());

    let verdict = verdict(evaluation.outcome);
    assert_eq!(verdict.reason, Reason::StdoutDiffer);
    assert_eq!(result_for(&verdict, Backend::Python).stdout, b"41\n");
    assert_eq!(result_for(&verdict, Backend::Go).stdout, b"42\n");
}

#[test]
fn exit_code_divergence_is_flagged() {
    let h = Harness::new();
    let candidate = h.candidate("if [ \"$1\" = js ]; then exit 3; fi\necho ok\n");
    let oracle = Oracle::new(h.config(Criterion::ExitCodeDiffer)).unwrap();

    let verdict = verdict(oracle.evaluate(&candidate).unwrap().outcome);
    assert!(verdict.interesting);
    assert_eq!(verdict.reason, Reason::ExitCodeDiffer);
    assert_eq!(result_for(&verdict, Backend::Javascript).exit_code, 3);
}

#[test]
fn compile_rejection_ends_evaluation_without_runs() {
    let h = Harness::new();
    h.mark("reject-cs");
    let candidate = h.candidate("echo 42\n");
    let oracle = Oracle::new(h.config(Criterion::StdoutDiffer)).unwrap();

    let evaluation = oracle.evaluate(&candidate).unwrap();
    assert!(!evaluation.outcome.is_interesting());

    let compiles = match evaluation.outcome {
        Outcome::CompileFailed(compiles) => compiles,
        other => panic!("expected CompileFailed, got {other:?}"),
    };
    let cs = compiles
        .iter()
        .find(|c| c.backend == Backend::Csharp)
        .unwrap();
    assert_eq!(cs.status, CompileStatus::Failed);
    assert!(cs.execution.stderr.starts_with(b"main.dfy(1,0)"));

    // Every backend still got its compile attempt, but nothing ran.
    assert_eq!(h.compiled(), ["go", "py", "cs", "js"]);
    assert!(h.ran().is_empty());
}

#[test]
fn missing_artifact_counts_as_compile_failure() {
    let h = Harness::new();
    h.mark("no-artifact-js");
    let candidate = h.candidate("echo 42\n");
    let oracle = Oracle::new(h.config(Criterion::StdoutDiffer)).unwrap();

    let compiles = match oracle.evaluate(&candidate).unwrap().outcome {
        Outcome::CompileFailed(compiles) => compiles,
        other => panic!("expected CompileFailed, got {other:?}"),
    };
    let js = compiles
        .iter()
        .find(|c| c.backend == Backend::Javascript)
        .unwrap();
    assert_eq!(js.status, CompileStatus::MissingArtifact);
    assert!(h.ran().is_empty());
}

#[test]
fn compile_timeout_outranks_compile_failure() {
    let h = Harness::new();
    h.mark("hang-go");
    h.mark("reject-cs");
    let candidate = h.candidate("echo 42\n");
    let config = h
        .config(Criterion::StdoutDiffer)
        .with_compile_timeout(Duration::from_millis(500));
    let oracle = Oracle::new(config).unwrap();

    let compiles = match oracle.evaluate(&candidate).unwrap().outcome {
        Outcome::CompileTimeout(compiles) => compiles,
        other => panic!("expected CompileTimeout, got {other:?}"),
    };
    let go = compiles.iter().find(|c| c.backend == Backend::Go).unwrap();
    assert_eq!(go.status, CompileStatus::TimedOut);
    let cs = compiles
        .iter()
        .find(|c| c.backend == Backend::Csharp)
        .unwrap();
    assert_eq!(cs.status, CompileStatus::Failed);
    assert!(h.ran().is_empty());
}

#[test]
fn runtime_timeout_never_aborts_the_other_runs() {
    let h = Harness::new();
    let candidate = h.candidate("if [ \"$1\" = go ]; then sleep 30; fi\necho done\n");
    let config = h
        .config(Criterion::Timeout)
        .with_run_timeout(Duration::from_millis(500));
    let oracle = Oracle::new(config).unwrap();

    let evaluation = oracle.evaluate(&candidate).unwrap();
    assert!(evaluation.outcome.is_interesting());

    let verdict = verdict(evaluation.outcome);
    assert_eq!(verdict.reason, Reason::Timeout);
    let go = result_for(&verdict, Backend::Go);
    assert!(go.timed_out);
    assert_eq!(go.exit_code, -1);
    let py = result_for(&verdict, Backend::Python);
    assert!(!py.timed_out);
    assert_eq!(py.stdout, b"done\n");

    // The hang cost go its own run only.
    assert_eq!(h.ran(), ["go", "py", "cs", "js"]);
}

#[test]
fn interesting_retention_keeps_the_workspace() {
    let h = Harness::new();
    let candidate = h.candidate("if [ \"$1\" = py ]; then echo 41; else echo 42; fi\n");
    let config = h
        .config(Criterion::StdoutDiffer)
        .with_retain(RetainPolicy::Interesting);
    let oracle = Oracle::new(config).unwrap();

    let evaluation = oracle.evaluate(&candidate).unwrap();
    let workspace = evaluation.workspace.expect("interesting workspace kept");
    assert!(workspace.join("build").is_dir());
    assert!(
        Backend::Go
            .artifact_path(&workspace.join("build"), "main")
            .is_file()
    );
    std::fs::remove_dir_all(&workspace).unwrap();
}

#[test]
fn boring_workspaces_are_deleted_under_interesting_retention() {
    let h = Harness::new();
    let candidate = h.candidate("echo 42\n");
    let config = h
        .config(Criterion::StdoutDiffer)
        .with_retain(RetainPolicy::Interesting);
    let oracle = Oracle::new(config).unwrap();

    let evaluation = oracle.evaluate(&candidate).unwrap();
    assert!(evaluation.workspace.is_none());
}

#[test]
fn always_retention_keeps_boring_workspaces() {
    let h = Harness::new();
    let candidate = h.candidate("echo 42\n");
    let config = h
        .config(Criterion::StdoutDiffer)
        .with_retain(RetainPolicy::Always);
    let oracle = Oracle::new(config).unwrap();

    let evaluation = oracle.evaluate(&candidate).unwrap();
    assert!(!evaluation.outcome.is_interesting());
    let workspace = evaluation.workspace.expect("workspace kept");
    assert!(workspace.is_dir());
    std::fs::remove_dir_all(&workspace).unwrap();
}

#[test]
fn tripped_token_cancels_evaluation() {
    let h = Harness::new();
    let candidate = h.candidate("echo 42\n");
    let token = CancelToken::new();
    token.cancel();
    let oracle = Oracle::new(h.config(Criterion::StdoutDiffer))
        .unwrap()
        .with_cancel(token);

    let err = oracle.evaluate(&candidate).unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(h.compiled().is_empty());
}
