// Process supervisor: start/stop/restart of a detached task via its PID file

use super::daemonize::{self, StdioPaths};
use super::pid::PidFile;
use super::probe::{probe, Presence};
use super::signals::{self, Shutdown, TERMINATED_EXIT_CODE};
use crate::error::{Result, ShdError};
use chrono::{DateTime, Local};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Delay between termination signals while stopping the daemon
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Body of the supervised daemon.
///
/// Called once, in the detached process. Implementations are expected to run
/// until `shutdown` reports a request and then return.
pub trait Task {
    fn run(&mut self, shutdown: &Shutdown) -> Result<()>;
}

impl<F> Task for F
where
    F: FnMut(&Shutdown) -> Result<()>,
{
    fn run(&mut self, shutdown: &Shutdown) -> Result<()> {
        self(shutdown)
    }
}

/// How the task body of a started daemon came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The task returned on its own
    Completed,
    /// The task returned after a termination signal
    Signalled,
}

impl Termination {
    /// Exit status the daemon process should end with
    pub fn exit_code(self) -> i32 {
        match self {
            Termination::Completed => 0,
            Termination::Signalled => TERMINATED_EXIT_CODE,
        }
    }
}

/// Daemon status information
#[derive(Debug, Clone)]
pub struct DaemonStatus {
    pub running: bool,
    pub pid: Option<i32>,
    pub pid_file: PathBuf,
    pub since: Option<DateTime<Local>>,
}

/// Turns a task into a detached daemon and controls it through a PID file
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    pid_file: PidFile,
    stdio: StdioPaths,
}

impl ProcessSupervisor {
    /// Create a supervisor with all standard streams bound to the null device.
    ///
    /// Relative paths are resolved now, since the daemon runs from `/`.
    pub fn new<P: AsRef<Path>>(pid_file: P) -> Self {
        Self {
            pid_file: PidFile::with_path(absolute(pid_file.as_ref())),
            stdio: StdioPaths::default(),
        }
    }

    /// Bind the daemon's standard streams to the given files
    pub fn with_stdio(mut self, stdio: StdioPaths) -> Self {
        self.stdio = StdioPaths {
            stdin: absolute(&stdio.stdin),
            stdout: absolute(&stdio.stdout),
            stderr: absolute(&stdio.stderr),
        };
        self
    }

    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    pub fn stdio(&self) -> &StdioPaths {
        &self.stdio
    }

    /// Detach and run `task` as the daemon.
    ///
    /// Never returns in the invoking process: it exits 0 once the first fork
    /// succeeds. In the daemon it returns after the task body has finished,
    /// with the PID file already removed.
    pub fn start<T: Task + ?Sized>(&self, task: &mut T) -> Result<Termination> {
        if self.pid_file.exists() {
            return Err(ShdError::AlreadyRunning);
        }

        info!(
            "Starting daemon (PID file: {})",
            self.pid_file.path().display()
        );
        daemonize::detach(&self.stdio)?;

        let guard = self.pid_file.create()?;
        let shutdown = signals::install_termination_handler(guard.path())?;
        info!("Daemon running as PID {}", std::process::id());

        let outcome = task.run(&shutdown);
        drop(guard);
        outcome?;

        if shutdown.is_requested() {
            info!("Daemon terminated by signal");
            Ok(Termination::Signalled)
        } else {
            info!("Daemon task completed");
            Ok(Termination::Completed)
        }
    }

    /// Stop the recorded daemon by sending SIGTERM until it is gone
    pub fn stop(&self) -> Result<()> {
        if !self.pid_file.exists() {
            return Err(ShdError::NotRunning);
        }

        let pid = self.pid_file.read()?;
        let target = Pid::from_raw(pid);
        info!("Stopping daemon (PID: {})...", pid);

        let mut signals_sent: u32 = 0;
        loop {
            match kill(target, Signal::SIGTERM) {
                Ok(()) => signals_sent += 1,
                Err(Errno::ESRCH) => break,
                Err(errno) => {
                    return Err(ShdError::SignalDelivery {
                        pid,
                        message: errno.desc().to_string(),
                    })
                }
            }

            std::thread::sleep(STOP_POLL_INTERVAL);

            // An exited child nobody reaps still accepts signals
            if probe(pid) == Presence::Zombie {
                debug!("PID {} exited but has not been reaped", pid);
                break;
            }
        }

        self.pid_file.remove()?;
        info!(
            "Daemon stopped (PID: {}, signals sent: {})",
            pid, signals_sent
        );

        Ok(())
    }

    /// Stop the running daemon, then start `task` in its place
    pub fn restart<T: Task + ?Sized>(&self, task: &mut T) -> Result<Termination> {
        self.stop()?;
        self.start(task)
    }

    /// Get daemon status information
    pub fn status(&self) -> DaemonStatus {
        let pid = self.pid_file.read().ok();
        DaemonStatus {
            running: pid.is_some_and(|pid| probe(pid) == Presence::Alive),
            pid,
            pid_file: self.pid_file.path().to_path_buf(),
            since: pid.and_then(|_| self.pid_file.modified()),
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::process::Command;
    use tempfile::TempDir;

    fn never_called(_: &Shutdown) -> Result<()> {
        panic!("task must not run");
    }

    #[test]
    fn test_stop_without_pid_file() {
        let temp_dir = TempDir::new().unwrap();
        let supervisor = ProcessSupervisor::new(temp_dir.path().join("x.pid"));

        assert!(matches!(supervisor.stop(), Err(ShdError::NotRunning)));

        // Nothing was created
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_start_with_existing_pid_file() {
        let temp_dir = TempDir::new().unwrap();
        let pid_path = temp_dir.path().join("x.pid");
        fs::write(&pid_path, "999999\n").unwrap();

        let supervisor = ProcessSupervisor::new(&pid_path);
        let result = supervisor.start(&mut never_called);

        assert!(matches!(result, Err(ShdError::AlreadyRunning)));
        assert_eq!(fs::read_to_string(&pid_path).unwrap(), "999999\n");
    }

    #[test]
    fn test_restart_when_not_running() {
        let temp_dir = TempDir::new().unwrap();
        let supervisor = ProcessSupervisor::new(temp_dir.path().join("x.pid"));

        let result = supervisor.restart(&mut never_called);

        assert!(matches!(result, Err(ShdError::NotRunning)));
        assert!(!supervisor.pid_file().exists());
    }

    #[test]
    fn test_stop_terminates_recorded_process() {
        let temp_dir = TempDir::new().unwrap();
        let pid_path = temp_dir.path().join("x.pid");

        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        fs::write(&pid_path, format!("{}\n", child.id())).unwrap();

        let supervisor = ProcessSupervisor::new(&pid_path);
        supervisor.stop().unwrap();

        assert!(!pid_path.exists());
        let status = child.wait().unwrap();
        assert!(!status.success());
    }

    #[test]
    fn test_stop_with_stale_pid_file() {
        let temp_dir = TempDir::new().unwrap();
        let pid_path = temp_dir.path().join("x.pid");

        let mut child = Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        fs::write(&pid_path, format!("{}\n", pid)).unwrap();

        let supervisor = ProcessSupervisor::new(&pid_path);
        supervisor.stop().unwrap();

        assert!(!pid_path.exists());
    }

    #[test]
    fn test_stop_with_invalid_pid_file() {
        let temp_dir = TempDir::new().unwrap();
        let pid_path = temp_dir.path().join("x.pid");
        fs::write(&pid_path, "-1\n").unwrap();

        let supervisor = ProcessSupervisor::new(&pid_path);

        assert!(matches!(
            supervisor.stop(),
            Err(ShdError::InvalidPidFile(_))
        ));
        assert!(pid_path.exists());
    }

    #[test]
    fn test_stop_without_permission_to_signal() {
        use std::os::unix::fs::MetadataExt;

        // Needs a process this user may not signal; init works unless we own it
        let euid = nix::unistd::geteuid();
        let init_owner = fs::metadata("/proc/1").map(|meta| meta.uid()).ok();
        if euid.is_root() || init_owner.map_or(true, |uid| uid == euid.as_raw()) {
            return;
        }

        let temp_dir = TempDir::new().unwrap();
        let pid_path = temp_dir.path().join("x.pid");
        fs::write(&pid_path, "1\n").unwrap();

        let supervisor = ProcessSupervisor::new(&pid_path);

        match supervisor.stop() {
            Err(ShdError::SignalDelivery { pid, .. }) => assert_eq!(pid, 1),
            other => panic!("expected SignalDelivery, got {:?}", other),
        }
        assert_eq!(fs::read_to_string(&pid_path).unwrap(), "1\n");
    }

    #[test]
    fn test_status() {
        let temp_dir = TempDir::new().unwrap();
        let pid_path = temp_dir.path().join("x.pid");
        let supervisor = ProcessSupervisor::new(&pid_path);

        let status = supervisor.status();
        assert!(!status.running);
        assert!(status.pid.is_none());
        assert!(status.since.is_none());
        assert_eq!(status.pid_file, pid_path);

        fs::write(&pid_path, format!("{}\n", std::process::id())).unwrap();
        let status = supervisor.status();
        assert!(status.running);
        assert_eq!(status.pid, Some(std::process::id() as i32));
        assert!(status.since.is_some());
    }

    #[test]
    fn test_relative_paths_are_resolved() {
        let supervisor = ProcessSupervisor::new("shd.pid").with_stdio(StdioPaths {
            stdout: PathBuf::from("out.log"),
            ..StdioPaths::default()
        });

        assert!(supervisor.pid_file().path().is_absolute());
        assert!(supervisor.stdio().stdout.is_absolute());
        assert_eq!(supervisor.stdio().stdin, PathBuf::from("/dev/null"));
    }

    #[test]
    fn test_termination_exit_codes() {
        assert_eq!(Termination::Completed.exit_code(), 0);
        assert_eq!(Termination::Signalled.exit_code(), 1);
    }
}
