//! TOML configuration for the `redtrib` binary.
//!
//! ```toml
//! [talker]
//! connect_timeout_secs = 8
//! io_timeout_secs = 8
//! recv_buffer_size = 16384
//!
//! [logging]
//! level = "info"
//! format = "text"
//!
//! [balance]
//! default_weight = 1.0
//!
//! [balance.weights]
//! "127.0.0.1:7000" = 2.0
//! ```

use crate::cluster::WeightTable;
use crate::error::{Result, TribError};
use crate::observability::{LogConfig, LogFormat};
use crate::talker::{TalkerConfig, DEFAULT_RECV_BUFFER_SIZE};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Talker section of the configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct TalkerSection {
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// 0 disables the read/write timeout
    #[serde(default = "default_timeout_secs")]
    pub io_timeout_secs: u64,
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,
}

fn default_timeout_secs() -> u64 {
    8
}

fn default_recv_buffer_size() -> usize {
    DEFAULT_RECV_BUFFER_SIZE
}

impl Default for TalkerSection {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_timeout_secs(),
            io_timeout_secs: default_timeout_secs(),
            recv_buffer_size: default_recv_buffer_size(),
        }
    }
}

impl TalkerSection {
    pub fn to_talker_config(&self) -> TalkerConfig {
        TalkerConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            io_timeout: match self.io_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            recv_buffer_size: self.recv_buffer_size,
        }
    }
}

/// Logging section of the configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format: text or json
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingSection {
    pub fn to_log_config(&self) -> Result<LogConfig> {
        let level = LogConfig::parse_level(&self.level)
            .ok_or_else(|| TribError::Config(format!("invalid log level '{}'", self.level)))?;
        let format = LogFormat::parse(&self.format)
            .ok_or_else(|| TribError::Config(format!("invalid log format '{}'", self.format)))?;
        Ok(LogConfig { level, format })
    }
}

/// Balance section: per-node weights keyed by node id or `host:port`
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceSection {
    #[serde(default = "default_weight")]
    pub default_weight: f64,
    #[serde(default)]
    pub weights: HashMap<String, f64>,
}

fn default_weight() -> f64 {
    1.0
}

impl Default for BalanceSection {
    fn default() -> Self {
        Self {
            default_weight: default_weight(),
            weights: HashMap::new(),
        }
    }
}

impl BalanceSection {
    pub fn to_weight_table(&self) -> WeightTable {
        let mut table = WeightTable::new(self.default_weight);
        for (key, weight) in &self.weights {
            table.insert(key.clone(), *weight);
        }
        table
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub talker: TalkerSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub balance: BalanceSection,
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| TribError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TribError::Config(format!("failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tracing::Level;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        let talker = config.talker.to_talker_config();
        assert_eq!(talker, TalkerConfig::default());
        assert_eq!(config.logging.to_log_config().unwrap().level, Level::INFO);
        assert_eq!(config.balance.default_weight, 1.0);
        assert!(config.balance.weights.is_empty());
    }

    #[test]
    fn test_full_file() {
        let config = Config::from_toml(
            r#"
            [talker]
            connect_timeout_secs = 2
            io_timeout_secs = 0
            recv_buffer_size = 4096

            [logging]
            level = "debug"
            format = "json"

            [balance]
            default_weight = 0.5

            [balance.weights]
            "127.0.0.1:7000" = 2.0
            "#,
        )
        .unwrap();

        let talker = config.talker.to_talker_config();
        assert_eq!(talker.connect_timeout, Duration::from_secs(2));
        assert_eq!(talker.io_timeout, None);
        assert_eq!(talker.recv_buffer_size, 4096);

        let log = config.logging.to_log_config().unwrap();
        assert_eq!(log.level, Level::DEBUG);
        assert_eq!(log.format, LogFormat::Json);

        assert_eq!(config.balance.weights.get("127.0.0.1:7000"), Some(&2.0));
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(Config::from_toml("[talker]\nconnect_timeout_secs = \"soon\"").is_err());

        let config = Config::from_toml("[logging]\nlevel = \"loud\"").unwrap();
        assert!(matches!(
            config.logging.to_log_config(),
            Err(TribError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[balance]\ndefault_weight = 3.0").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.balance.default_weight, 3.0);

        assert!(Config::load("/nonexistent/redtrib.toml").is_err());
    }
}
