//! SIGINT/SIGTERM wiring for cooperative campaign shutdown.

use std::sync::OnceLock;

use crosscheck_oracle::CancelToken;
use nix::libc::c_int;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

use crate::error::{Error, Result};

static SHUTDOWN: OnceLock<CancelToken> = OnceLock::new();

// Signal context: nothing here beyond atomic loads and stores.
extern "C" fn trip_shutdown(_signal: c_int) {
    if let Some(token) = SHUTDOWN.get() {
        token.cancel();
    }
}

/// Cancel `token` when SIGINT or SIGTERM arrives.
///
/// # Errors
///
/// Fails when a handler is already installed or the sigaction calls are
/// rejected by the kernel.
pub fn install_shutdown_handler(token: CancelToken) -> Result<()> {
    SHUTDOWN
        .set(token)
        .map_err(|_| Error::Config("shutdown handler already installed".into()))?;

    let action = SigAction::new(
        SigHandler::Handler(trip_shutdown),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    unsafe {
        signal::sigaction(Signal::SIGINT, &action).map_err(std::io::Error::from)?;
        signal::sigaction(Signal::SIGTERM, &action).map_err(std::io::Error::from)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test owns the process-wide handler slot; raise() delivers to the
    // calling thread before returning.
    #[test]
    fn sigint_trips_the_token_and_reinstall_fails() {
        let token = CancelToken::new();
        install_shutdown_handler(token.clone()).unwrap();
        assert!(!token.is_cancelled());

        signal::raise(Signal::SIGINT).unwrap();
        assert!(token.is_cancelled());

        assert!(install_shutdown_handler(CancelToken::new()).is_err());
    }
}
