//! Styled terminal output for CLI commands.

use std::borrow::Cow;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Spinner for indeterminate progress.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    /// Create a new spinner with a message.
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    /// Finish the spinner with a success message.
    pub fn finish_with_success(&self, message: &str) {
        self.bar.finish_and_clear();
        success(message);
    }

    /// Finish the spinner with a failure message.
    pub fn finish_with_failure(&self, message: &str) {
        self.bar.finish_and_clear();
        error(message);
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Print an info message to stderr.
pub fn info(message: &str) {
    eprintln!("{} {message}", style("→").cyan());
}

/// Print a success message to stderr.
pub fn success(message: &str) {
    eprintln!("{} {message}", style("✓").green().bold());
}

/// Print an error message to stderr.
pub fn error(message: &str) {
    eprintln!("{} {message}", style("✗").red().bold());
}

/// Print a warning message to stderr.
pub fn warning(message: &str) {
    eprintln!("{} {message}", style("!").yellow().bold());
}

/// Print a path line (like "→ /path/to/dir").
pub fn path_output(path: &std::path::Path) {
    eprintln!("  {} {}", style("→").dim(), style(path.display()).dim());
}
