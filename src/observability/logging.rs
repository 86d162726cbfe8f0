//! Logging setup with structured output and a configurable level
//!
//! Diagnostics go to stderr so command output on stdout stays machine
//! readable.

use crate::error::{Result, TribError};
use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Log format type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Plain text format (default)
    #[default]
    Text,
    /// JSON structured format
    Json,
}

impl LogFormat {
    /// Parse log format from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Log configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Level,
    /// Log format (text or json)
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Text,
        }
    }
}

impl LogConfig {
    /// Parse log level from string
    pub fn parse_level(s: &str) -> Option<Level> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }

    /// Convert level to string
    pub fn level_to_string(level: Level) -> &'static str {
        match level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        }
    }

    /// Filter built from the configured level; `RUST_LOG` takes precedence.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.level).into())
            .from_env_lossy()
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(config.env_filter());

    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| TribError::Config(format!("failed to install logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::parse("text"), Some(LogFormat::Text));
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("plain"), Some(LogFormat::Text));
        assert_eq!(LogFormat::parse("invalid"), None);
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogConfig::parse_level("trace"), Some(Level::TRACE));
        assert_eq!(LogConfig::parse_level("debug"), Some(Level::DEBUG));
        assert_eq!(LogConfig::parse_level("info"), Some(Level::INFO));
        assert_eq!(LogConfig::parse_level("warning"), Some(Level::WARN));
        assert_eq!(LogConfig::parse_level("error"), Some(Level::ERROR));
        assert_eq!(LogConfig::parse_level("invalid"), None);
    }

    #[test]
    fn test_level_round_trip_through_name() {
        for level in [Level::TRACE, Level::DEBUG, Level::INFO, Level::WARN, Level::ERROR] {
            let name = LogConfig::level_to_string(level);
            assert_eq!(LogConfig::parse_level(name), Some(level));
        }
    }

    #[test]
    fn test_second_init_fails() {
        let config = LogConfig::default();
        // Another test in this binary may already own the global subscriber.
        let _ = init_logging(&config);
        assert!(matches!(init_logging(&config), Err(TribError::Config(_))));
    }
}
