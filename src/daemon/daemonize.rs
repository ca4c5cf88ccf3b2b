// Daemonization support for Unix systems

use crate::error::{Result, ShdError};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Mode for output sinks created by the daemon, which runs with umask 0
const SINK_MODE: u32 = 0o644;

/// Null device the standard streams default to
pub const NULL_DEVICE: &str = "/dev/null";

/// Files the daemon's standard streams are bound to after detaching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdioPaths {
    pub stdin: PathBuf,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
}

impl Default for StdioPaths {
    fn default() -> Self {
        Self {
            stdin: PathBuf::from(NULL_DEVICE),
            stdout: PathBuf::from(NULL_DEVICE),
            stderr: PathBuf::from(NULL_DEVICE),
        }
    }
}

/// Side of a fork the current process is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Branch {
    Parent,
    Child,
}

/// Detach the calling process from its terminal and session.
///
/// Runs the classic double fork:
/// 1. fork, the original process exits 0
/// 2. chdir to `/`, clear the umask, `setsid`
/// 3. fork again, the session leader exits 0
/// 4. bind stdin/stdout/stderr to `stdio`
///
/// Only the final grandchild returns from this function. Fork failures are
/// returned before anything is written to disk.
pub fn detach(stdio: &StdioPaths) -> Result<()> {
    // Step 1: leave the invoker's foreground process group
    match fork_branch(1)? {
        Branch::Parent => exit_branch(),
        Branch::Child => {}
    }

    // Step 2: drop the controlling terminal
    become_session_leader()?;

    // Step 3: give up session leadership so no terminal can be reacquired
    match fork_branch(2)? {
        Branch::Parent => exit_branch(),
        Branch::Child => {}
    }

    // Step 4: bind the standard streams to the configured files
    redirect_streams(stdio)?;

    tracing::debug!("Detached as PID {}", std::process::id());
    Ok(())
}

fn fork_branch(stage: u8) -> Result<Branch> {
    use nix::unistd::{fork, ForkResult};

    // Buffered output would otherwise be written once per process
    flush_std_streams();

    // SAFETY: called before any threads or runtimes exist; both branches only
    // exit or continue single-threaded
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            tracing::debug!("fork #{} spawned PID {}", stage, child);
            Ok(Branch::Parent)
        }
        Ok(ForkResult::Child) => Ok(Branch::Child),
        Err(errno) => Err(ShdError::fork(stage, errno)),
    }
}

fn exit_branch() -> ! {
    std::process::exit(0)
}

fn become_session_leader() -> Result<()> {
    use nix::sys::stat::{umask, Mode};
    use nix::unistd::setsid;

    std::env::set_current_dir("/")
        .map_err(|e| ShdError::Detach(format!("Failed to change directory to /: {}", e)))?;
    umask(Mode::empty());
    setsid().map_err(|e| ShdError::Detach(format!("setsid failed: {}", e)))?;

    Ok(())
}

fn flush_std_streams() {
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
}

/// Standard stream targets, opened but not yet bound
#[derive(Debug)]
struct StdioFiles {
    stdin: File,
    stdout: File,
    stderr: File,
}

fn open_streams(stdio: &StdioPaths) -> Result<StdioFiles> {
    let stdin = File::open(&stdio.stdin).map_err(|e| open_error(&stdio.stdin, e))?;
    let stdout = open_append(&stdio.stdout)?;
    let stderr = open_append(&stdio.stderr)?;

    Ok(StdioFiles {
        stdin,
        stdout,
        stderr,
    })
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .mode(SINK_MODE)
        .append(true)
        .open(path)
        .map_err(|e| open_error(path, e))
}

fn open_error(path: &Path, e: std::io::Error) -> ShdError {
    ShdError::Detach(format!("Failed to open {}: {}", path.display(), e))
}

/// Bind the standard file descriptors to the configured files
fn redirect_streams(stdio: &StdioPaths) -> Result<()> {
    use nix::libc;
    use nix::unistd::dup2;
    use std::os::unix::io::AsRawFd;

    flush_std_streams();
    let files = open_streams(stdio)?;

    let bindings = [
        (files.stdin.as_raw_fd(), libc::STDIN_FILENO, "stdin"),
        (files.stdout.as_raw_fd(), libc::STDOUT_FILENO, "stdout"),
        (files.stderr.as_raw_fd(), libc::STDERR_FILENO, "stderr"),
    ];
    for (fd, target, name) in bindings {
        dup2(fd, target)
            .map_err(|e| ShdError::Detach(format!("Failed to redirect {}: {}", name, e)))?;
    }

    // The duplicated descriptors stay open; the originals close with `files`
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stdio_defaults_to_null_device() {
        let stdio = StdioPaths::default();
        assert_eq!(stdio.stdin, PathBuf::from("/dev/null"));
        assert_eq!(stdio.stdout, PathBuf::from("/dev/null"));
        assert_eq!(stdio.stderr, PathBuf::from("/dev/null"));
    }

    #[test]
    fn test_open_streams_creates_sinks() {
        let temp_dir = TempDir::new().unwrap();
        let stdio = StdioPaths {
            stdin: PathBuf::from(NULL_DEVICE),
            stdout: temp_dir.path().join("out.log"),
            stderr: temp_dir.path().join("err.log"),
        };

        open_streams(&stdio).unwrap();

        assert!(stdio.stdout.exists());
        assert!(stdio.stderr.exists());
    }

    #[test]
    fn test_open_streams_appends() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("out.log");
        std::fs::write(&out, "existing\n").unwrap();
        let stdio = StdioPaths {
            stdout: out.clone(),
            ..StdioPaths::default()
        };

        let mut files = open_streams(&stdio).unwrap();
        writeln!(files.stdout, "appended").unwrap();

        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "existing\nappended\n"
        );
    }

    #[test]
    fn test_open_streams_missing_stdin() {
        let temp_dir = TempDir::new().unwrap();
        let stdio = StdioPaths {
            stdin: temp_dir.path().join("does-not-exist"),
            ..StdioPaths::default()
        };

        assert!(matches!(open_streams(&stdio), Err(ShdError::Detach(_))));
    }

    #[test]
    fn test_created_sinks_are_not_group_writable() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let stdio = StdioPaths {
            stderr: temp_dir.path().join("err.log"),
            ..StdioPaths::default()
        };

        open_streams(&stdio).unwrap();

        let mode = std::fs::metadata(&stdio.stderr).unwrap().permissions().mode();
        assert_eq!(mode & 0o022, 0);
    }
}
