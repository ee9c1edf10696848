//! Differential execution oracle for multi-backend compilers.
//!
//! Feed one candidate program through every backend of the compiler under
//! test, run each produced artifact, and compare the observed behaviors.
//! Backends are supposed to be equivalent; disagreement is the signal a
//! fuzzing campaign or a test-case reducer is looking for.
//!
//! # Example
//!
//! ```ignore
//! use crosscheck_oracle::{Candidate, CompilerUnderTest, Criterion, Oracle, OracleConfig};
//!
//! let compiler = CompilerUnderTest::new("/opt/dafny/Dafny.dll").with_host("dotnet");
//! let oracle = Oracle::new(OracleConfig::new(compiler, Criterion::StdoutDiffer))?;
//! let evaluation = oracle.evaluate(&Candidate::from_source("main.dfy")?)?;
//! if evaluation.outcome.is_interesting() {
//!     // hand the candidate to the reducer
//! }
//! ```

mod backend;
mod cancel;
mod candidate;
mod classify;
mod compile;
mod error;
mod oracle;
mod process;
mod run;
mod workspace;

pub use backend::{Backend, BackendTable, LaunchSpec};
pub use cancel::CancelToken;
pub use candidate::Candidate;
pub use classify::{Criterion, ExecutionResult, Reason, Verdict, classify, classify_cascade};
pub use compile::{CompileResult, CompileStatus, CompilerUnderTest, compile};
pub use error::{Error, Result};
pub use oracle::{DEFAULT_TIMEOUT, Evaluation, Oracle, OracleConfig, Outcome, RetainPolicy};
pub use process::{Execution, RunRequest};
pub use run::execute;
pub use workspace::Workspace;
