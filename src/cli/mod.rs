// CLI module - start/stop/restart entry point for the shd daemon

pub mod output;

use crate::config::DaemonConfig;
use crate::daemon::ProcessSupervisor;
use crate::dispatcher::Dispatcher;
use crate::logging;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Exit status for usage errors and failed commands
pub const FAILURE_EXIT_CODE: i32 = 1;

/// shd - smart home daemon
#[derive(Debug, Parser)]
#[command(name = "shd")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Lifecycle action to perform
    #[arg(value_enum)]
    action: Action,

    /// Configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// PID file, overriding the configured one
    #[arg(short, long)]
    pid_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Action {
    /// Detach and run the dispatcher in the background
    Start,
    /// Stop the running daemon
    Stop,
    /// Stop the running daemon and start a new one
    Restart,
}

impl Cli {
    /// Parse arguments, exiting 1 on usage errors
    pub fn parse_or_exit() -> Cli {
        match Cli::try_parse() {
            Ok(cli) => cli,
            Err(e) => {
                // --help and --version are not failures
                let code = if e.use_stderr() { FAILURE_EXIT_CODE } else { 0 };
                let _ = e.print();
                std::process::exit(code);
            }
        }
    }

    /// Run the CLI application, returning the process exit status
    pub fn run() -> Result<i32> {
        let cli = Cli::parse_or_exit();
        let config = cli.resolve_config()?;

        logging::init(&config.log);

        let supervisor =
            ProcessSupervisor::new(&config.pid_file).with_stdio(config.stdio());
        cli.execute(&supervisor)
    }

    /// Load the configuration and apply command-line overrides
    fn resolve_config(&self) -> Result<DaemonConfig> {
        let mut config = DaemonConfig::load(self.config.as_deref())
            .context("Failed to load configuration")?;

        if let Some(ref pid_file) = self.pid_file {
            config.pid_file = pid_file.clone();
            config.validate()?;
        }

        Ok(config)
    }

    /// Execute the parsed command
    fn execute(&self, supervisor: &ProcessSupervisor) -> Result<i32> {
        match self.action {
            Action::Start => {
                let termination = supervisor.start(&mut Dispatcher::new())?;
                Ok(termination.exit_code())
            }
            Action::Stop => {
                supervisor.stop()?;
                output::print_success("Daemon stopped");
                Ok(0)
            }
            Action::Restart => {
                let termination = supervisor.restart(&mut Dispatcher::new())?;
                Ok(termination.exit_code())
            }
        }
    }
}
