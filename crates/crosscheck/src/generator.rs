//! Candidate generation through the external fuzz-d jar.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crosscheck_oracle::{CancelToken, RunRequest};
use tracing::{info_span, warn};

use crate::error::Result;

/// Entry file the generator is expected to write.
pub const GENERATED_FILENAME: &str = "main.dfy";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    /// Entry program written at the given path.
    Program(PathBuf),
    /// The generator ran past its deadline.
    TimedOut,
    /// The generator exited non-zero or produced no entry file.
    Failed,
}

/// Drives `java -jar <jar> fuzz` to produce candidate programs.
#[derive(Debug, Clone)]
pub struct Generator {
    java: PathBuf,
    jar: PathBuf,
    timeout: Duration,
}

impl Generator {
    pub fn new(jar: impl Into<PathBuf>) -> Self {
        Self {
            java: PathBuf::from("java"),
            jar: jar.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_java(mut self, java: impl Into<PathBuf>) -> Self {
        self.java = java.into();
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Generate a candidate into `output_dir` from the given seed.
    ///
    /// Generator timeouts and rejections are ordinary [`Generation`] values;
    /// the campaign counts them and draws the next seed.
    ///
    /// # Errors
    ///
    /// Fails when the JVM cannot be launched, the output directory cannot be
    /// created, or the campaign is cancelled mid-run.
    pub fn generate(
        &self,
        seed: i64,
        output_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<Generation> {
        let _span = info_span!("generate", seed).entered();

        std::fs::create_dir_all(output_dir)?;
        let execution = RunRequest::new(&self.java)
            .arg("-jar")
            .arg(&self.jar)
            .arg("fuzz")
            .arg("--seed")
            .arg(seed.to_string())
            .arg("--noRun")
            .arg("--output")
            .arg(output_dir)
            .with_timeout(self.timeout)
            .with_cancel(cancel.clone())
            .run()?;

        if execution.timed_out {
            warn!(seed, "generator timed out");
            return Ok(Generation::TimedOut);
        }
        let program = output_dir.join(GENERATED_FILENAME);
        if execution.exit_code == 0 && program.is_file() {
            Ok(Generation::Program(program))
        } else {
            warn!(seed, exit_code = execution.exit_code, "generator failed");
            Ok(Generation::Failed)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    // Accepts the real argv shape: -jar <jar> fuzz --seed <s> --noRun --output <dir>.
    const FAKE_JVM: &str = r#"#!/bin/sh
seed=$5
out=$8
printf '%s\n' "$@" > "$out/argv.txt"
case "$seed" in
    13) exit 1 ;;
    14) exit 0 ;;
    *) printf 'method Main() { print %s; }\n' "$seed" > "$out/main.dfy" ;;
esac
"#;

    fn fake_jvm(dir: &Path) -> PathBuf {
        let path = dir.join("java");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(FAKE_JVM.as_bytes()).unwrap();
        drop(file);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn successful_generation_returns_the_entry_path() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Generator::new("fuzz-d.jar").with_java(fake_jvm(dir.path()));
        let out = dir.path().join("gen");

        let generation = generator.generate(7, &out, &CancelToken::new()).unwrap();
        assert_eq!(generation, Generation::Program(out.join(GENERATED_FILENAME)));

        let argv = fs::read_to_string(out.join("argv.txt")).unwrap();
        let args: Vec<&str> = argv.lines().collect();
        assert_eq!(
            args,
            [
                "-jar",
                "fuzz-d.jar",
                "fuzz",
                "--seed",
                "7",
                "--noRun",
                "--output",
                out.to_str().unwrap(),
            ]
        );
    }

    #[test]
    fn nonzero_exit_is_a_failure_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Generator::new("fuzz-d.jar").with_java(fake_jvm(dir.path()));
        let out = dir.path().join("gen");

        let generation = generator.generate(13, &out, &CancelToken::new()).unwrap();
        assert_eq!(generation, Generation::Failed);
    }

    #[test]
    fn clean_exit_without_entry_file_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Generator::new("fuzz-d.jar").with_java(fake_jvm(dir.path()));
        let out = dir.path().join("gen");

        let generation = generator.generate(14, &out, &CancelToken::new()).unwrap();
        assert_eq!(generation, Generation::Failed);
    }

    #[test]
    fn negative_seeds_are_passed_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Generator::new("fuzz-d.jar").with_java(fake_jvm(dir.path()));
        let out = dir.path().join("gen");

        generator.generate(-42, &out, &CancelToken::new()).unwrap();
        let argv = fs::read_to_string(out.join("argv.txt")).unwrap();
        assert!(argv.lines().any(|arg| arg == "-42"));
    }
}
