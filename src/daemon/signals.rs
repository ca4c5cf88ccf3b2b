// Termination signal handling for the detached daemon

use crate::error::{Result, ShdError};
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use nix::libc;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

/// Set by the first SIGTERM the daemon receives
static TERMINATED: AtomicBool = AtomicBool::new(false);

/// PID file unlinked by the handler on a hard exit
static PID_PATH: OnceLock<CString> = OnceLock::new();

/// Exit status of a daemon ended by SIGTERM
pub const TERMINATED_EXIT_CODE: i32 = 1;

/// Seconds a task gets to return after the first SIGTERM
pub const TERMINATION_GRACE_SECS: u32 = 2;

/// Read-only view of a shutdown request, handed to the supervised task
#[derive(Debug, Clone, Copy)]
pub struct Shutdown {
    flag: &'static AtomicBool,
}

impl Shutdown {
    /// Token backed by an arbitrary flag, for running a task outside the daemon
    pub fn new(flag: &'static AtomicBool) -> Self {
        Self { flag }
    }

    /// Token backed by the process-wide termination flag
    pub fn termination() -> Self {
        Self { flag: &TERMINATED }
    }

    /// Whether the task has been asked to stop
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Install the SIGTERM handler for a daemon owning `pid_path`.
///
/// The first signal sets the termination flag so the task can wind down and
/// the PID file guard can drop normally, and arms a `TERMINATION_GRACE_SECS`
/// alarm. When the alarm fires, or another SIGTERM arrives first, the handler
/// unlinks the PID file and exits immediately with status 1. A task that
/// never looks at its `Shutdown` token is therefore still ended by a single
/// SIGTERM.
pub fn install_termination_handler(pid_path: &Path) -> Result<Shutdown> {
    let c_path = CString::new(pid_path.as_os_str().as_bytes()).map_err(|e| {
        ShdError::SignalHandler(format!("PID file path contains a NUL byte: {}", e))
    })?;
    if PID_PATH.set(c_path).is_err() {
        tracing::warn!("Termination handler already installed for this process");
    }

    let action = SigAction::new(
        SigHandler::Handler(on_terminate),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );

    let expire = SigAction::new(
        SigHandler::Handler(on_grace_expired),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );

    // SAFETY: both handlers only touch atomics and call async-signal-safe libc functions
    let installed = unsafe { signal::sigaction(Signal::SIGALRM, &expire) };
    installed
        .map_err(|e| ShdError::SignalHandler(format!("sigaction(SIGALRM) failed: {}", e)))?;
    let installed = unsafe { signal::sigaction(Signal::SIGTERM, &action) };
    installed
        .map_err(|e| ShdError::SignalHandler(format!("sigaction(SIGTERM) failed: {}", e)))?;

    Ok(Shutdown::termination())
}

extern "C" fn on_terminate(_signum: libc::c_int) {
    if !TERMINATED.swap(true, Ordering::SeqCst) {
        unsafe {
            libc::alarm(TERMINATION_GRACE_SECS);
        }
        return;
    }

    hard_exit();
}

extern "C" fn on_grace_expired(_signum: libc::c_int) {
    hard_exit();
}

/// Unlink the PID file and leave without running any Rust cleanup
fn hard_exit() -> ! {
    if let Some(path) = PID_PATH.get() {
        unsafe {
            libc::unlink(path.as_ptr());
        }
    }
    unsafe { libc::_exit(TERMINATED_EXIT_CODE) }
}
