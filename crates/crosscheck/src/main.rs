//! crosscheck CLI - differential testing for a multi-backend compiler

mod cli;
mod commands;
mod terminal;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    // Initialize metrics recorder if enabled
    let metrics_handle = if cli.metrics {
        let recorder = crosscheck::metrics::CliRecorder::new();
        recorder.install()
    } else {
        None
    };

    // Initialize metric descriptions
    crosscheck::metrics::init();

    // Initialize tracing with appropriate level based on flags and command
    let (cli_level, oracle_level) = if cli.silent {
        ("crosscheck=error", "crosscheck_oracle=error")
    } else if cli.verbose {
        ("crosscheck=debug", "crosscheck_oracle=debug")
    } else {
        match &cli.command {
            Commands::Fuzz { .. } => ("crosscheck=info", "crosscheck_oracle=warn"),
            Commands::Check { .. } | Commands::Backends => {
                ("crosscheck=warn", "crosscheck_oracle=warn")
            }
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(cli_level.parse().unwrap())
                .add_directive(oracle_level.parse().unwrap()),
        )
        .with_target(false)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let exit_code = commands::run_command(&cli);

    // Print metrics summary if enabled
    if let Some(handle) = metrics_handle {
        handle.print_summary();
    }

    std::process::exit(exit_code);
}
