// Daemon module - detached process lifecycle

pub mod daemonize;
pub mod pid;
pub mod probe;
pub mod signals;
pub mod supervisor;

pub use daemonize::{detach, StdioPaths};
pub use pid::{PidFile, PidFileGuard};
pub use signals::Shutdown;
pub use supervisor::{DaemonStatus, ProcessSupervisor, Task, Termination};
