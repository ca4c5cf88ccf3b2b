// PID file management for the detached daemon

use super::probe::{probe, Presence};
use crate::error::{Result, ShdError};
use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Default PID file location
pub const DEFAULT_PID_FILE: &str = "/tmp/shd.pid";

/// PID file permissions; the daemon writes it with umask 0
const PID_FILE_MODE: u32 = 0o644;

/// Handle on the PID file of a supervised daemon.
///
/// The file holds the decimal PID of the detached instance followed by a
/// newline. Its existence is what `start` and `stop` treat as "running".
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Create a PID file handle for the given path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Write the current process PID, failing if the file already exists.
    ///
    /// The returned guard removes the file when dropped.
    pub fn create(&self) -> Result<PidFileGuard> {
        let pid = std::process::id();
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(PID_FILE_MODE)
            .open(&self.path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => ShdError::AlreadyRunning,
                _ => ShdError::Io(e),
            })?;

        // The file is ours from here on, so a failed write must not leave it behind
        let guard = PidFileGuard {
            path: self.path.clone(),
            owner: pid,
        };
        writeln!(file, "{}", pid)?;
        file.sync_all()?;

        Ok(guard)
    }

    /// Read the PID from the file
    pub fn read(&self) -> Result<i32> {
        let content = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ShdError::NotRunning,
            _ => ShdError::InvalidPidFile(format!("{}: {}", self.path.display(), e)),
        })?;

        parse_pid(&content)
    }

    /// Check if the PID file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Remove the PID file. Removing a file that is already gone is not an error.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ShdError::Io(e)),
        }
    }

    /// Check if the recorded process is alive
    pub fn is_daemon_running(&self) -> bool {
        match self.read() {
            Ok(pid) => probe(pid) == Presence::Alive,
            Err(_) => false,
        }
    }

    /// Time the PID file was last written
    pub fn modified(&self) -> Option<DateTime<Local>> {
        fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Local>::from)
    }

    /// Get the path to the PID file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for PidFile {
    fn default() -> Self {
        Self::with_path(DEFAULT_PID_FILE)
    }
}

/// Parse PID file contents. Only positive PIDs are accepted so that a
/// corrupt file can never turn into a signal for a process group.
fn parse_pid(content: &str) -> Result<i32> {
    let trimmed = content.trim();
    let pid = trimmed
        .parse::<i32>()
        .map_err(|e| ShdError::InvalidPidFile(format!("'{}': {}", trimmed, e)))?;

    if pid <= 0 {
        return Err(ShdError::InvalidPidFile(format!(
            "PID must be positive, got {}",
            pid
        )));
    }

    Ok(pid)
}

/// Ownership of a written PID file, held by the daemon for its lifetime.
///
/// Dropping the guard deletes the file, but only in the process that wrote
/// it: a forked child inheriting the guard leaves it alone.
#[derive(Debug)]
pub struct PidFileGuard {
    path: PathBuf,
    owner: u32,
}

impl PidFileGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        if std::process::id() != self.owner {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed PID file {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove PID file {}: {}", self.path.display(), e),
        }
    }
}
