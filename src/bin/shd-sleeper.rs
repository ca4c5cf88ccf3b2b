// shd-sleeper - a daemon whose task never checks for shutdown
//
// Used to exercise the termination paths that do not depend on the task
// cooperating: the grace alarm, a repeated SIGTERM, and a failing task.

use clap::{Parser, ValueEnum};
use shd::cli::{output, FAILURE_EXIT_CODE};
use shd::config::LogConfig;
use shd::daemon::{ProcessSupervisor, Shutdown, StdioPaths, Task};
use shd::error::{Result, ShdError};
use shd::logging;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "shd-sleeper")]
#[command(version, about = "Daemon that ignores its shutdown token", long_about = None)]
struct Args {
    #[arg(value_enum)]
    action: Action,

    /// PID file of the sleeper daemon
    #[arg(short, long)]
    pid_file: PathBuf,

    /// File the daemon's standard error is appended to
    #[arg(long)]
    stderr: Option<PathBuf>,

    /// Fail the task immediately with this message
    #[arg(long)]
    fail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Action {
    Start,
    Stop,
}

struct Sleeper {
    fail: Option<String>,
}

impl Task for Sleeper {
    fn run(&mut self, _shutdown: &Shutdown) -> Result<()> {
        if let Some(message) = self.fail.take() {
            return Err(ShdError::Task(message));
        }

        loop {
            std::thread::sleep(Duration::from_millis(100));
        }
    }
}

fn run(args: Args) -> Result<i32> {
    let mut stdio = StdioPaths::default();
    if let Some(stderr) = args.stderr {
        stdio.stderr = stderr;
    }
    let supervisor = ProcessSupervisor::new(&args.pid_file).with_stdio(stdio);

    match args.action {
        Action::Start => {
            let mut sleeper = Sleeper { fail: args.fail };
            let termination = supervisor.start(&mut sleeper)?;
            Ok(termination.exit_code())
        }
        Action::Stop => {
            supervisor.stop()?;
            Ok(0)
        }
    }
}

fn main() {
    let args = Args::parse();
    logging::init(&LogConfig::default());

    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // Goes to the redirected stderr when the daemon itself fails
            output::print_error(&e.to_string());
            std::process::exit(FAILURE_EXIT_CODE);
        }
    }
}
