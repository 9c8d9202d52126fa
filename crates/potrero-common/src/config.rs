//! ---
//! ipc_section: "01-core-functionality"
//! ipc_subsection: "module"
//! ipc_type: "source"
//! ipc_scope: "code"
//! ipc_description: "Node configuration loading and validation."
//! ipc_version: "v0.1.0"
//! ipc_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LogFormat;

fn default_broker_host() -> String {
    "localhost".to_owned()
}

fn default_broker_port() -> u16 {
    6379
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object shared by all node binaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Broker endpoint every node publishes through.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Tracing output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which pub/sub broker to connect to. The fleet shares one instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker hostname.
    #[serde(default = "default_broker_host")]
    pub host: String,
    /// Broker port.
    #[serde(default = "default_broker_port")]
    pub port: u16,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
        }
    }
}

/// Tracing output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory receiving the rolling log files.
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    /// Stdout log format.
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Log file name prefix; defaults to the node name.
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

impl AppConfig {
    /// Environment variable overriding the configuration path.
    pub const ENV_CONFIG_PATH: &'static str = "POTRERO_CONFIG";

    /// Load configuration from disk, respecting the `POTRERO_CONFIG`
    /// override, and failing when none of the candidates exists.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                return Self::from_path(PathBuf::from(env_path));
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                return Self::from_path(candidate.as_ref().to_path_buf());
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Like [`AppConfig::load`], but fall back to built-in defaults when
    /// no configuration file is present. Nodes are expected to run with
    /// zero configuration on a developer machine.
    pub fn load_or_default<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        match Self::load(candidates) {
            Ok(config) => Ok(config),
            Err(err) => {
                debug!(error = %err, "no configuration file; using defaults");
                Ok(Self::default())
            }
        }
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.broker.host.trim().is_empty() {
            return Err(anyhow!("broker.host must not be empty"));
        }
        if self.broker.port == 0 {
            return Err(anyhow!("broker.port must not be zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_point_at_local_broker() {
        let config = AppConfig::default();
        assert_eq!(config.broker.host, "localhost");
        assert_eq!(config.broker.port, 6379);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn loads_partial_toml_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[broker]\nhost = \"broker.fleet\"").expect("write");
        let config = AppConfig::load(&[file.path()]).expect("load");
        assert_eq!(config.broker.host, "broker.fleet");
        assert_eq!(config.broker.port, 6379);
    }

    #[test]
    fn rejects_zero_port() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[broker]\nport = 0").expect("write");
        assert!(AppConfig::load(&[file.path()]).is_err());
    }

    #[test]
    fn missing_candidates_fall_back_to_defaults() {
        let config =
            AppConfig::load_or_default(&[Path::new("does/not/exist.toml")]).expect("defaults");
        assert_eq!(config.broker.port, 6379);
    }
}
