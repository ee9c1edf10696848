//! Campaign driver for differential testing of a multi-backend compiler.
//!
//! [`crosscheck_oracle`] decides whether one candidate program is
//! interesting; this crate turns that decision into a bug-finding campaign:
//! seed drawing, candidate generation, worker pooling, known-bug filtering,
//! and evidence persistence, plus the `crosscheck` command-line interface
//! on top.

pub mod campaign;
pub mod generator;
pub mod known_bugs;
pub mod metrics;
pub mod persist;
pub mod signal;

mod error;

pub use error::{Error, Result};
