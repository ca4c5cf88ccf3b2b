use thiserror::Error;

/// Main error type for the shd daemon supervisor
#[derive(Debug, Error)]
pub enum ShdError {
    // Lifecycle guard conditions
    #[error("Already running")]
    AlreadyRunning,

    #[error("Not running")]
    NotRunning,

    // Detachment errors
    #[error("fork #{stage} failed: {code} ({message})")]
    Fork {
        stage: u8,
        code: i32,
        message: String,
    },

    #[error("Failed to detach: {0}")]
    Detach(String),

    // Signal errors
    #[error("Failed to signal process {pid}: {message}")]
    SignalDelivery { pid: i32, message: String },

    #[error("Failed to install signal handler: {0}")]
    SignalHandler(String),

    // PID file errors
    #[error("Invalid PID file: {0}")]
    InvalidPidFile(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    // Supervised task errors
    #[error("Task failed: {0}")]
    Task(String),

    // IO errors (automatically converted from std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShdError {
    /// Build a fork error from the errno reported by the failed fork
    pub fn fork(stage: u8, errno: nix::errno::Errno) -> Self {
        ShdError::Fork {
            stage,
            code: errno as i32,
            message: errno.desc().to_string(),
        }
    }
}

/// Result type alias for shd operations
pub type Result<T> = std::result::Result<T, ShdError>;
