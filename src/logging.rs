// Tracing subscriber setup for the shd binary

use crate::config::LogConfig;
use tracing_subscriber::EnvFilter;

/// Build the event filter: `RUST_LOG` wins over the configured level
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()))
}

/// Install the global fmt subscriber writing to standard output.
///
/// Must run before the daemon detaches: the subscriber writes through the
/// stdout descriptor, which then points at the configured output file.
pub fn init(config: &LogConfig) {
    let result = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_target(true)
        .with_ansi(false)
        .with_writer(std::io::stdout)
        .try_init();

    if let Err(e) = result {
        eprintln!("Logging already initialised: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_env_filter_uses_configured_level() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let filter = env_filter(&LogConfig {
            level: "WARN".to_string(),
        });
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }
}
