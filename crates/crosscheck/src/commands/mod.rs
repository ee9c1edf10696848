//! Command implementations.
//!
//! Each submodule handles a specific CLI command.

mod backends;
mod check;
mod fuzz;

use crate::cli::{Cli, Commands};

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    match &cli.command {
        Commands::Fuzz { .. } => handle_fuzz(cli),
        Commands::Check { .. } => handle_check(cli),
        Commands::Backends => backends::cmd_backends(),
    }
}

fn handle_fuzz(cli: &Cli) -> i32 {
    let Commands::Fuzz {
        jar,
        java,
        compiler,
        host,
        output,
        backends,
        generation_timeout,
        compile_timeout,
        run_timeout,
        budget_hours,
        jobs,
        seed,
        max_iterations,
        known_bugs,
        keep_workspaces,
    } = &cli.command
    else {
        unreachable!("fuzz command variant mismatch");
    };

    fuzz::cmd_fuzz(&fuzz::FuzzArgs {
        jar,
        java,
        compiler,
        host: host.as_deref(),
        output,
        backends,
        generation_timeout: *generation_timeout,
        compile_timeout: *compile_timeout,
        run_timeout: *run_timeout,
        budget_hours: *budget_hours,
        jobs: *jobs,
        seed: *seed,
        max_iterations: *max_iterations,
        known_bugs: known_bugs.as_deref(),
        keep_workspaces: *keep_workspaces,
    })
}

fn handle_check(cli: &Cli) -> i32 {
    let Commands::Check {
        program,
        criterion,
        compiler,
        host,
        backends,
        compile_timeout,
        run_timeout,
        scratch,
        keep,
    } = &cli.command
    else {
        unreachable!("check command variant mismatch");
    };

    check::cmd_check(
        program,
        *criterion,
        compiler,
        host.as_deref(),
        backends,
        *compile_timeout,
        *run_timeout,
        scratch.as_deref(),
        *keep,
    )
}
