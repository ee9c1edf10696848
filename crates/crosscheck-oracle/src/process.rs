//! Child process execution with process-group teardown.
//!
//! Every child runs as the leader of a fresh process group. Teardown signals
//! the whole group, so descendants spawned by launchers (`go run` builds and
//! forks the real binary, `dotnet` forks workers) cannot outlive the call.

use std::ffi::OsString;
use std::io::{self, Read};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, trace};

use crate::cancel::CancelToken;
use crate::{Error, Result};

/// Poll slice for the deadline wait; bounds cancellation latency.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Grace period between SIGTERM and SIGKILL when tearing a group down.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Captured outcome of one child process.
#[derive(Debug, Clone)]
pub struct Execution {
    /// Exit code, or `-1` when the process timed out or died to a signal.
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// The deadline passed and the process group was terminated.
    pub timed_out: bool,
    pub duration: Duration,
}

impl Execution {
    /// Clean exit within the deadline.
    #[must_use]
    pub const fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }
}

/// A single child invocation: argv, environment, bounds.
#[derive(Debug, Clone)]
pub struct RunRequest {
    program: PathBuf,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
    timeout: Duration,
    cancel: CancelToken,
}

impl RunRequest {
    /// Create a request with a 30 second default deadline.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
            timeout: Duration::from_secs(30),
            cancel: CancelToken::new(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Add an environment variable for the child.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Set the deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the child to completion, enforcing the deadline on its group.
    ///
    /// Stdout and stderr are drained fully and separately; partial output
    /// survives a kill. On timeout the group gets SIGTERM, then SIGKILL
    /// after [`KILL_GRACE`], and `timed_out` is set with the `-1` sentinel
    /// exit code. The group is swept on every exit path, normal exit
    /// included, so stragglers never leak.
    ///
    /// # Errors
    ///
    /// [`Error::Launch`] when the program cannot be spawned and
    /// [`Error::Cancelled`] when the token trips before completion (the
    /// group is torn down first). Wait failures surface as [`Error::Io`].
    pub fn run(self) -> Result<Execution> {
        let start = Instant::now();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }

        trace!(program = %self.program.display(), timeout = ?self.timeout, "spawning");

        let mut child = cmd.spawn().map_err(|source| Error::Launch {
            program: self.program.display().to_string(),
            source,
        })?;

        #[allow(clippy::cast_possible_wrap)]
        let pgid = Pid::from_raw(child.id() as i32);
        let guard = GroupGuard(pgid);

        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(child.wait());
        });

        let deadline = start + self.timeout;
        let mut timed_out = false;
        let mut cancelled = false;

        let status = loop {
            if self.cancel.is_cancelled() {
                cancelled = true;
            } else if Instant::now() >= deadline {
                timed_out = true;
            }
            if timed_out || cancelled {
                debug!(pgid = %pgid, timed_out, "terminating process group");
                break terminate_group(pgid, &rx);
            }
            let slice = POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now()));
            match rx.recv_timeout(slice) {
                Ok(status) => break status,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    break Err(io::Error::other("wait thread disconnected"));
                }
            }
        };
        let status = status?;

        // Sweep before draining: a straggler holding the pipe write end
        // open would block the readers forever.
        drop(guard);

        if cancelled {
            return Err(Error::Cancelled);
        }

        let stdout = join_reader(stdout_reader);
        let stderr = join_reader(stderr_reader);
        let duration = start.elapsed();

        let exit_code = if timed_out {
            -1
        } else {
            status.code().unwrap_or(-1)
        };
        trace!(exit_code, timed_out, ?duration, "child finished");

        Ok(Execution {
            exit_code,
            stdout,
            stderr,
            timed_out,
            duration,
        })
    }
}

/// SIGTERM the group, then SIGKILL once the grace period lapses.
///
/// Returns the reaped status from the wait thread. ESRCH from either kill
/// means the group already emptied, which is fine.
fn terminate_group(pgid: Pid, rx: &Receiver<io::Result<ExitStatus>>) -> io::Result<ExitStatus> {
    let _ = signal::killpg(pgid, Signal::SIGTERM);
    match rx.recv_timeout(KILL_GRACE) {
        Ok(status) => status,
        Err(RecvTimeoutError::Timeout) => {
            let _ = signal::killpg(pgid, Signal::SIGKILL);
            rx.recv()
                .unwrap_or_else(|_| Err(io::Error::other("wait thread disconnected")))
        }
        Err(RecvTimeoutError::Disconnected) => Err(io::Error::other("wait thread disconnected")),
    }
}

/// Final SIGKILL sweep over the child's process group, on every exit path.
struct GroupGuard(Pid);

impl Drop for GroupGuard {
    fn drop(&mut self) {
        let _ = signal::killpg(self.0, Signal::SIGKILL);
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}
