//! Target backends of the compiler under test.
//!
//! Backends are configuration, not runtime state: each carries its compile
//! target flag and artifact layout, while launch conventions live in a
//! [`BackendTable`] so tests and deployments can substitute launchers
//! without touching the oracle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A code-generation target of the compiler under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Go,
    Python,
    Csharp,
    Javascript,
    Java,
}

impl Backend {
    /// Every known backend.
    pub const ALL: &'static [Self] = &[
        Self::Go,
        Self::Python,
        Self::Csharp,
        Self::Javascript,
        Self::Java,
    ];

    /// Default differential-testing set.
    ///
    /// Java is excluded: generated programs reliably trip known bugs in its
    /// code generator, which blocks fuzzing.
    pub const DEFAULT_TARGETS: &'static [Self] =
        &[Self::Go, Self::Python, Self::Csharp, Self::Javascript];

    /// Lowercase identifier, also used for per-backend directory names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Go => "go",
            Self::Python => "python",
            Self::Csharp => "csharp",
            Self::Javascript => "javascript",
            Self::Java => "java",
        }
    }

    /// Value passed to the compiler's `--target:` flag.
    #[must_use]
    pub const fn target_flag(self) -> &'static str {
        match self {
            Self::Go => "go",
            Self::Python => "py",
            Self::Csharp => "cs",
            Self::Javascript => "js",
            Self::Java => "java",
        }
    }

    /// Whether the oracle may compile and run this backend.
    #[must_use]
    pub const fn supported(self) -> bool {
        !matches!(self, Self::Java)
    }

    /// Whether the compiler drops the artifact directly into the output
    /// directory instead of a per-target subtree.
    const fn artifact_in_place(self) -> bool {
        matches!(self, Self::Csharp | Self::Javascript)
    }

    /// Directory handed to the compiler's `--output` flag.
    ///
    /// In-place backends get an extra `<name>` level so that every artifact
    /// stays under `out_dir` and can be deleted wholesale.
    #[must_use]
    pub fn artifact_dir(self, out_dir: &Path, name: &str) -> PathBuf {
        if self.artifact_in_place() {
            out_dir.join(name).join(name)
        } else {
            out_dir.join(name)
        }
    }

    /// Runnable artifact the compiler is expected to produce.
    #[must_use]
    pub fn artifact_path(self, out_dir: &Path, name: &str) -> PathBuf {
        let relative = match self {
            Self::Go => format!("{name}-go/src/{name}.go"),
            Self::Python => format!("{name}-py/__main__.py"),
            Self::Csharp => format!("{name}.dll"),
            Self::Javascript => format!("{name}.js"),
            Self::Java => format!("{name}-java/{name}.java"),
        };
        self.artifact_dir(out_dir, name).join(relative)
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to run one backend's compiled artifact.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Launcher program, e.g. `go`, `python3`, `dotnet`, `node`.
    pub launcher: PathBuf,
    /// Arguments inserted between the launcher and the artifact path.
    pub args: Vec<String>,
}

impl LaunchSpec {
    #[must_use]
    pub fn new(launcher: impl Into<PathBuf>) -> Self {
        Self {
            launcher: launcher.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Launch conventions per backend.
#[derive(Debug, Clone)]
pub struct BackendTable {
    specs: HashMap<Backend, LaunchSpec>,
}

impl Default for BackendTable {
    /// Stock conventions for every supported backend.
    fn default() -> Self {
        let mut specs = HashMap::new();
        specs.insert(Backend::Go, LaunchSpec::new("go").with_args(["run"]));
        specs.insert(Backend::Python, LaunchSpec::new("python3"));
        specs.insert(Backend::Csharp, LaunchSpec::new("dotnet"));
        specs.insert(Backend::Javascript, LaunchSpec::new("node"));
        Self { specs }
    }
}

impl BackendTable {
    /// Table with no launchers; populate with [`Self::with_launch_spec`].
    #[must_use]
    pub fn empty() -> Self {
        Self {
            specs: HashMap::new(),
        }
    }

    #[must_use]
    pub fn launch_spec(&self, backend: Backend) -> Option<&LaunchSpec> {
        self.specs.get(&backend)
    }

    /// Replace the launch convention for one backend.
    #[must_use]
    pub fn with_launch_spec(mut self, backend: Backend, spec: LaunchSpec) -> Self {
        self.specs.insert(backend, spec);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_paths_follow_compiler_layout() {
        let out = Path::new("/work/build");

        assert_eq!(
            Backend::Go.artifact_path(out, "main"),
            Path::new("/work/build/main/main-go/src/main.go")
        );
        assert_eq!(
            Backend::Python.artifact_path(out, "main"),
            Path::new("/work/build/main/main-py/__main__.py")
        );
        assert_eq!(
            Backend::Csharp.artifact_path(out, "main"),
            Path::new("/work/build/main/main/main.dll")
        );
        assert_eq!(
            Backend::Javascript.artifact_path(out, "main"),
            Path::new("/work/build/main/main/main.js")
        );
        assert_eq!(
            Backend::Java.artifact_path(out, "main"),
            Path::new("/work/build/main/main-java/main.java")
        );
    }

    #[test]
    fn in_place_backends_nest_output_dir() {
        let out = Path::new("/work/build");

        assert_eq!(
            Backend::Csharp.artifact_dir(out, "main"),
            Path::new("/work/build/main/main")
        );
        assert_eq!(
            Backend::Go.artifact_dir(out, "main"),
            Path::new("/work/build/main")
        );
    }

    #[test]
    fn default_table_covers_supported_backends() {
        let table = BackendTable::default();
        for &backend in Backend::DEFAULT_TARGETS {
            assert!(table.launch_spec(backend).is_some(), "{backend}");
        }
        assert!(table.launch_spec(Backend::Java).is_none());
    }

    #[test]
    fn java_is_not_supported() {
        assert!(!Backend::Java.supported());
        assert!(Backend::DEFAULT_TARGETS.iter().all(|b| b.supported()));
    }

    #[test]
    fn launch_spec_override_replaces_default() {
        let table = BackendTable::default()
            .with_launch_spec(Backend::Go, LaunchSpec::new("/bin/sh").with_args(["-c"]));

        let spec = table.launch_spec(Backend::Go).unwrap();
        assert_eq!(spec.launcher, Path::new("/bin/sh"));
        assert_eq!(spec.args, ["-c"]);
    }
}
