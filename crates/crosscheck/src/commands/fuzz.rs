//! Fuzz command.

use std::path::Path;
use std::time::Duration;

use tracing::error;

use crosscheck::campaign::{CampaignConfig, print_summary, run_campaign};
use crosscheck::generator::Generator;
use crosscheck::known_bugs::KnownBugFilter;
use crosscheck::signal;
use crosscheck_oracle::{Backend, CancelToken, CompilerUnderTest};

use crate::cli::{BackendArg, EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal;

/// Arguments to the `fuzz` command.
pub struct FuzzArgs<'a> {
    pub jar: &'a Path,
    pub java: &'a Path,
    pub compiler: &'a Path,
    pub host: Option<&'a Path>,
    pub output: &'a Path,
    pub backends: &'a [BackendArg],
    pub generation_timeout: u64,
    pub compile_timeout: u64,
    pub run_timeout: u64,
    pub budget_hours: u64,
    pub jobs: usize,
    pub seed: Option<u64>,
    pub max_iterations: Option<u64>,
    pub known_bugs: Option<&'a Path>,
    pub keep_workspaces: bool,
}

/// Handle the `fuzz` command.
pub fn cmd_fuzz(args: &FuzzArgs) -> i32 {
    let token = CancelToken::new();
    if let Err(e) = signal::install_shutdown_handler(token.clone()) {
        error!(error = %e, "failed to install shutdown handler");
        return EXIT_FAILURE;
    }

    let known_bugs = match args.known_bugs {
        Some(path) => match KnownBugFilter::load(path) {
            Ok(filter) => filter,
            Err(e) => {
                error!(error = %e, "failed to load known-bug patterns");
                return EXIT_FAILURE;
            }
        },
        None => KnownBugFilter::default(),
    };

    let generator = Generator::new(args.jar)
        .with_java(args.java)
        .with_timeout(Duration::from_secs(args.generation_timeout));
    let mut compiler = CompilerUnderTest::new(args.compiler);
    if let Some(host) = args.host {
        compiler = compiler.with_host(host);
    }

    let mut config = CampaignConfig::new(generator, compiler, args.output);
    config.backends = args.backends.iter().copied().map(Backend::from).collect();
    config.compile_timeout = Duration::from_secs(args.compile_timeout);
    config.run_timeout = Duration::from_secs(args.run_timeout);
    config.budget = Duration::from_secs(args.budget_hours.saturating_mul(60 * 60));
    config.jobs = args.jobs;
    config.seed = args.seed;
    config.max_iterations = args.max_iterations;
    config.known_bugs = known_bugs;
    config.keep_workspaces = args.keep_workspaces;
    config.cancel = token;

    terminal::info(&format!(
        "fuzzing into {} (interrupt with Ctrl-C)",
        args.output.display()
    ));
    match run_campaign(config) {
        Ok(summary) => {
            print_summary(&summary);
            EXIT_SUCCESS
        }
        Err(e) => {
            error!(error = %e, "campaign failed");
            EXIT_FAILURE
        }
    }
}
