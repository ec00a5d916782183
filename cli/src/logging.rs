//! Diagnostic output for the `typemap` binary.
//!
//! Everything goes to stderr so stdout stays clean for rule data. `RUST_LOG`
//! takes precedence over the verbosity flags.

use std::io::IsTerminal;

use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy)]
pub struct LogConfig {
    pub level: Level,
    /// Colour output; on only when stderr is a terminal.
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            with_ansi: std::io::stderr().is_terminal(),
        }
    }
}

impl LogConfig {
    /// Maps `-v` counts to a level: none is warn, then info, debug, trace.
    #[must_use]
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            ..Default::default()
        }
    }
}

/// Installs the global subscriber. Later calls are ignored.
pub fn init_logging(config: &LogConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(config.level))
        .with_writer(std::io::stderr)
        .with_ansi(config.with_ansi)
        .with_target(false)
        .without_time()
        .try_init();
}

fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level.as_str().to_lowercase();
        EnvFilter::new(format!("warn,typemap={level},typemap_core={level}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(LogConfig::from_verbosity(0).level, Level::WARN);
        assert_eq!(LogConfig::from_verbosity(1).level, Level::INFO);
        assert_eq!(LogConfig::from_verbosity(2).level, Level::DEBUG);
        assert_eq!(LogConfig::from_verbosity(9).level, Level::TRACE);
    }

    #[test]
    fn test_ansi_follows_stderr() {
        let expected = std::io::stderr().is_terminal();
        assert_eq!(LogConfig::default().with_ansi, expected);
        assert_eq!(LogConfig::from_verbosity(2).with_ansi, expected);
    }
}
