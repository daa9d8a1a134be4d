//! Configuration management

use anyhow::Result;
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
    pub keys: KeysConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub web: WebConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    /// Decoy ports to listen on. The port matching `ssh_port` gets the
    /// deceptive SSH server, every other port gets the probe handler.
    pub ports: Vec<u16>,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
}

fn default_ssh_port() -> u16 {
    22
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Concurrent connection handlers across all ports; connections beyond
    /// this are dropped at accept time.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> usize {
    512
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// JSON-lines event log path
    pub events_file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeysConfig {
    /// SSH host key location; generated on first start, reused afterwards
    pub host_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_rdap_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_lookup_timeout")]
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            endpoint: default_rdap_endpoint(),
            timeout_secs: default_lookup_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_rdap_endpoint() -> String {
    "https://rdap.org/ip".to_string()
}

fn default_lookup_timeout() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_web_port")]
    pub port: u16,
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: String,
    #[serde(default = "default_documents_dir")]
    pub documents_dir: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_web_port(),
            downloads_dir: default_downloads_dir(),
            documents_dir: default_documents_dir(),
        }
    }
}

fn default_web_port() -> u16 {
    80
}

fn default_downloads_dir() -> String {
    "static/tools".to_string()
}

fn default_documents_dir() -> String {
    "static/document".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "netsnare.toml";

        let builder = config::Config::builder()
            .add_source(config::File::with_name(config_path))
            .add_source(config::Environment::with_prefix("NETSNARE"));

        let settings = builder.build()?;
        let config: Config = settings.try_deserialize()?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Server host cannot be empty");
        }
        if self.server.ports.is_empty() {
            anyhow::bail!("No listen ports configured");
        }

        let mut seen = HashSet::new();
        for port in &self.server.ports {
            if *port == 0 {
                anyhow::bail!("Invalid listen port: 0 is not allowed");
            }
            if !seen.insert(port) {
                anyhow::bail!("Duplicate listen port: {}", port);
            }
        }

        if self.limits.max_connections == 0 {
            anyhow::bail!("limits.max_connections must be at least 1");
        }

        if self.logging.events_file.is_empty() {
            anyhow::bail!("Event log path cannot be empty");
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid logging level '{}'. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            );
        }

        if self.keys.host_key.is_empty() {
            anyhow::bail!("Host key path cannot be empty");
        }

        if self.classifier.enabled {
            if self.classifier.endpoint.is_empty() {
                anyhow::bail!("Classifier endpoint cannot be empty");
            }
            if self.classifier.timeout_secs == 0 {
                anyhow::bail!("Classifier timeout must be at least 1 second");
            }
        }

        if self.web.enabled && self.web.port == 0 {
            anyhow::bail!("Invalid web port: 0 is not allowed");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                ports: vec![22, 2222, 8888],
                ssh_port: 22,
            },
            limits: LimitsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                events_file: "netsnare.log".to_string(),
            },
            keys: KeysConfig {
                host_key: "netsnare_host_key".to_string(),
            },
            classifier: ClassifierConfig::default(),
            web: WebConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn duplicate_ports_rejected() {
        let mut config = base_config();
        config.server.ports = vec![22, 8888, 22];
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("Duplicate listen port: 22"), "{}", err);
    }

    #[test]
    fn empty_ports_rejected() {
        let mut config = base_config();
        config.server.ports = vec![];
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_port_rejected() {
        let mut config = base_config();
        config.server.ports = vec![22, 0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_log_level_rejected() {
        let mut config = base_config();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_admission_limit_rejected() {
        let mut config = base_config();
        config.limits.max_connections = 0;
        assert!(config.validate().is_err());
    }
}
