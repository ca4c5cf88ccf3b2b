use crate::daemon::daemonize::NULL_DEVICE;
use crate::daemon::pid::DEFAULT_PID_FILE;
use crate::daemon::StdioPaths;
use crate::error::{Result, ShdError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "SHD_CONFIG";

/// Configuration file used when neither `--config` nor `SHD_CONFIG` is given
pub const DEFAULT_CONFIG_PATH: &str = "conf/shd.toml";

/// Daemon configuration: PID file, stream redirection and logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// PID file recording the running daemon
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// File the daemon reads as standard input
    #[serde(default = "default_stream")]
    pub stdin: PathBuf,

    /// File the daemon's standard output is appended to
    #[serde(default = "default_stream")]
    pub stdout: PathBuf,

    /// File the daemon's standard error is appended to
    #[serde(default = "default_stream")]
    pub stderr: PathBuf,

    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum level: trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions for serde
fn default_pid_file() -> PathBuf {
    PathBuf::from(DEFAULT_PID_FILE)
}

fn default_stream() -> PathBuf {
    PathBuf::from(NULL_DEVICE)
}

fn default_log_level() -> String {
    "info".to_string()
}

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            pid_file: default_pid_file(),
            stdin: default_stream(),
            stdout: default_stream(),
            stderr: default_stream(),
            log: LogConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Resolve and load the configuration.
    ///
    /// Uses `explicit` if given, then the file named by `SHD_CONFIG`, then
    /// `conf/shd.toml` if present. With none of these, defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<DaemonConfig> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Some(value) = std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
            return Self::from_file(Path::new(&value));
        }

        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            return Self::from_file(fallback);
        }

        Ok(DaemonConfig::default())
    }

    /// Load the configuration from a file (supports TOML and JSON)
    pub fn from_file(path: &Path) -> Result<DaemonConfig> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ShdError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        // Determine format based on file extension
        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let mut config = match extension {
            "toml" => Self::parse_toml(&contents)?,
            "json" => Self::parse_json(&contents)?,
            _ => {
                return Err(ShdError::InvalidConfig(format!(
                    "Unsupported file format: {}. Use .toml or .json",
                    extension
                )))
            }
        };

        config.expand_env_vars();
        config.validate()?;

        Ok(config)
    }

    fn parse_toml(contents: &str) -> Result<DaemonConfig> {
        toml::from_str(contents)
            .map_err(|e| ShdError::InvalidConfig(format!("Failed to parse TOML: {}", e)))
    }

    fn parse_json(contents: &str) -> Result<DaemonConfig> {
        serde_json::from_str(contents)
            .map_err(|e| ShdError::InvalidConfig(format!("Failed to parse JSON: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.pid_file.as_os_str().is_empty() {
            return Err(ShdError::ConfigValidation(
                "pid_file must not be empty".to_string(),
            ));
        }

        if self.pid_file.is_dir() {
            return Err(ShdError::ConfigValidation(format!(
                "pid_file is a directory: {}",
                self.pid_file.display()
            )));
        }

        for (name, path) in [
            ("stdin", &self.stdin),
            ("stdout", &self.stdout),
            ("stderr", &self.stderr),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ShdError::ConfigValidation(format!(
                    "{} must not be empty",
                    name
                )));
            }
        }

        if !VALID_LOG_LEVELS.contains(&self.log.level.to_lowercase().as_str()) {
            return Err(ShdError::ConfigValidation(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.log.level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Standard stream redirection for the daemon
    pub fn stdio(&self) -> StdioPaths {
        StdioPaths {
            stdin: self.stdin.clone(),
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        }
    }

    /// Expand environment variables in path fields
    fn expand_env_vars(&mut self) {
        self.pid_file = expand_env_in_path(&self.pid_file);
        self.stdin = expand_env_in_path(&self.stdin);
        self.stdout = expand_env_in_path(&self.stdout);
        self.stderr = expand_env_in_path(&self.stderr);
    }
}

/// Expand `$VAR` and `${VAR}` references in a string
fn expand_env_in_string(s: &str) -> String {
    let mut result = s.to_string();

    // Longest names first so $HOME_DIR is not clobbered by $HOME
    let mut vars: Vec<(String, String)> = std::env::vars().collect();
    vars.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    for (key, value) in vars {
        result = result.replace(&format!("${{{}}}", key), &value);
        result = result.replace(&format!("${}", key), &value);
    }

    result
}

fn expand_env_in_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(expand_env_in_string(&path_str))
}
