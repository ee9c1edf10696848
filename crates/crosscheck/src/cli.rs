//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use crosscheck_oracle::{Backend, Criterion};

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

/// `check` follows the reducer's interestingness-script convention.
pub const EXIT_INTERESTING: i32 = 0;
/// Exit code when the checked candidate is not interesting.
pub const EXIT_NOT_INTERESTING: i32 = 1;
/// Exit code when the oracle itself failed.
pub const EXIT_ERROR: i32 = 2;

#[derive(Parser)]
#[command(name = "crosscheck")]
#[command(about = "Differential testing driver for multi-backend compilers")]
#[command(version)]
pub struct Cli {
    /// Show metrics summary on exit
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a fuzzing campaign against the compiler under test
    Fuzz {
        /// Generator jar producing candidate programs
        #[arg(long, value_name = "JAR")]
        jar: PathBuf,

        /// JVM used to launch the generator jar
        #[arg(long, default_value = "java")]
        java: PathBuf,

        /// Compiler binary under test (e.g. Dafny.dll)
        #[arg(long, value_name = "BINARY")]
        compiler: PathBuf,

        /// Host runtime the compiler is launched through (e.g. dotnet);
        /// omit to execute the compiler binary directly
        #[arg(long)]
        host: Option<PathBuf>,

        /// Campaign output directory
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Target backends to cross-check
        #[arg(
            long,
            value_enum,
            value_delimiter = ',',
            default_values = ["go", "python", "csharp", "javascript"]
        )]
        backends: Vec<BackendArg>,

        /// Generator timeout in seconds
        #[arg(long, default_value = "30", value_name = "SECS")]
        generation_timeout: u64,

        /// Per-backend compile timeout in seconds
        #[arg(long, default_value = "30", value_name = "SECS")]
        compile_timeout: u64,

        /// Per-backend run timeout in seconds
        #[arg(long, default_value = "30", value_name = "SECS")]
        run_timeout: u64,

        /// Campaign budget in hours
        #[arg(long, default_value = "12", value_name = "HOURS")]
        budget_hours: u64,

        /// Number of parallel workers (0 = auto)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Base RNG seed for a reproducible campaign
        #[arg(long)]
        seed: Option<u64>,

        /// Stop after this many candidates
        #[arg(long, value_name = "N")]
        max_iterations: Option<u64>,

        /// File of known-bug regex patterns, one per line
        #[arg(long, value_name = "FILE")]
        known_bugs: Option<PathBuf>,

        /// Keep every build workspace under scratch/ for debugging
        #[arg(long)]
        keep_workspaces: bool,
    },
    /// Decide whether one candidate program is interesting
    Check {
        /// Candidate program source file
        #[arg(value_name = "PROGRAM")]
        program: PathBuf,

        /// Interestingness criterion
        #[arg(long, value_enum, default_value = "stdout-differ")]
        criterion: CriterionArg,

        /// Compiler binary under test (e.g. Dafny.dll)
        #[arg(long, value_name = "BINARY")]
        compiler: PathBuf,

        /// Host runtime the compiler is launched through (e.g. dotnet);
        /// omit to execute the compiler binary directly
        #[arg(long)]
        host: Option<PathBuf>,

        /// Target backends to cross-check
        #[arg(
            long,
            value_enum,
            value_delimiter = ',',
            default_values = ["go", "python", "csharp", "javascript"]
        )]
        backends: Vec<BackendArg>,

        /// Per-backend compile timeout in seconds
        #[arg(long, default_value = "30", value_name = "SECS")]
        compile_timeout: u64,

        /// Per-backend run timeout in seconds
        #[arg(long, default_value = "30", value_name = "SECS")]
        run_timeout: u64,

        /// Scratch directory for build workspaces
        #[arg(long, value_name = "DIR")]
        scratch: Option<PathBuf>,

        /// Keep the build workspace when the candidate is interesting
        #[arg(long)]
        keep: bool,
    },
    /// Print the backend table
    Backends,
}

/// Target backend argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Go,
    Python,
    Csharp,
    Javascript,
    Java,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Go => Backend::Go,
            BackendArg::Python => Backend::Python,
            BackendArg::Csharp => Backend::Csharp,
            BackendArg::Javascript => Backend::Javascript,
            BackendArg::Java => Backend::Java,
        }
    }
}

/// Interestingness criterion argument.
#[derive(Clone, Copy, Debug, ValueEnum, Default)]
pub enum CriterionArg {
    /// Any backend exceeds the runtime deadline
    Timeout,
    /// Any backend exits non-zero
    NonzeroExit,
    /// Backends disagree on the exit code
    ExitCodeDiffer,
    /// Backends disagree on stdout
    #[default]
    StdoutDiffer,
    /// Backends disagree on stderr
    StderrDiffer,
}

impl From<CriterionArg> for Criterion {
    fn from(arg: CriterionArg) -> Self {
        match arg {
            CriterionArg::Timeout => Criterion::Timeout,
            CriterionArg::NonzeroExit => Criterion::NonZeroExit,
            CriterionArg::ExitCodeDiffer => Criterion::ExitCodeDiffer,
            CriterionArg::StdoutDiffer => Criterion::StdoutDiffer,
            CriterionArg::StderrDiffer => Criterion::StderrDiffer,
        }
    }
}
