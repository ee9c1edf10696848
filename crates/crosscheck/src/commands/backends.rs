//! Backends command.

use crosscheck_oracle::{Backend, BackendTable};

use crate::cli::EXIT_SUCCESS;

/// Handle the `backends` command.
pub fn cmd_backends() -> i32 {
    let table = BackendTable::default();

    println!(
        "{:<12} {:<8} {:<10} LAUNCHER",
        "BACKEND", "TARGET", "SUPPORTED"
    );
    for &backend in Backend::ALL {
        let launcher = table.launch_spec(backend).map_or_else(
            || "-".to_string(),
            |spec| {
                let mut parts = vec![spec.launcher.display().to_string()];
                parts.extend(spec.args.iter().cloned());
                parts.join(" ")
            },
        );
        println!(
            "{:<12} {:<8} {:<10} {}",
            backend.as_str(),
            backend.target_flag(),
            if backend.supported() { "yes" } else { "no" },
            launcher
        );
    }
    EXIT_SUCCESS
}
