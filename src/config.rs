//! Configuration management for custodychain

use crate::error::ChainError;
use serde::Deserialize;
use std::fs;

/// Upper bound on difficulty in hex digits; beyond this mining a single
/// block is not feasible on any node this is meant to run on.
const MAX_DIFFICULTY: u32 = 16;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Base URL other peers use to reach this node; derived from the listen
    /// port when unset.
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default)]
    pub bootstrap_url: Option<String>,
    #[serde(default = "default_peer_timeout_ms")]
    pub peer_timeout_ms: u64,
    #[serde(default = "default_gossip_timeout_ms")]
    pub gossip_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_data_path")]
    pub path: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            listen_port: default_listen_port(),
            public_url: None,
            bootstrap_url: None,
            peer_timeout_ms: default_peer_timeout_ms(),
            gossip_timeout_ms: default_gossip_timeout_ms(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            difficulty: default_difficulty(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: default_data_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            network: NetworkConfig::default(),
            chain: ChainConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Config {
    /// Base URL peers use to reach this node.
    pub fn public_url(&self) -> String {
        self.network
            .public_url
            .clone()
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", self.network.listen_port))
    }

    /// Check the values a node cannot start without. Malformed configuration
    /// is the only startup-fatal condition in the system.
    pub fn validate(&self) -> Result<(), ChainError> {
        let public_url = self.public_url();
        reqwest::Url::parse(&public_url).map_err(|e| {
            ChainError::ConfigError(format!("Unparseable node address {:?}: {}", public_url, e))
        })?;

        if let Some(bootstrap) = &self.network.bootstrap_url {
            reqwest::Url::parse(bootstrap).map_err(|e| {
                ChainError::ConfigError(format!(
                    "Unparseable bootstrap address {:?}: {}",
                    bootstrap, e
                ))
            })?;
        }

        if self.chain.difficulty == 0 || self.chain.difficulty > MAX_DIFFICULTY {
            return Err(ChainError::ConfigError(format!(
                "chain.difficulty must be between 1 and {}, got {}",
                MAX_DIFFICULTY, self.chain.difficulty
            )));
        }

        if self.database.path.is_empty() {
            return Err(ChainError::ConfigError(
                "database.path must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Load configuration from `config.toml` (defaults when absent), then apply
/// the `PORT` and `BOOTSTRAP_URL` environment overrides.
pub fn load_config() -> Result<Config, ChainError> {
    let config_str = fs::read_to_string("config.toml").unwrap_or_default();
    let mut config: Config = if config_str.is_empty() {
        Config::default()
    } else {
        toml::from_str(&config_str)
            .map_err(|e| ChainError::ConfigError(format!("Failed to parse config.toml: {}", e)))?
    };

    if let Ok(port) = std::env::var("PORT") {
        config.network.listen_port = port
            .parse()
            .map_err(|e| ChainError::ConfigError(format!("Invalid PORT {:?}: {}", port, e)))?;
    }
    if let Ok(bootstrap) = std::env::var("BOOTSTRAP_URL") {
        if !bootstrap.is_empty() {
            config.network.bootstrap_url = Some(bootstrap);
        }
    }

    config.validate()?;
    Ok(config)
}

fn default_listen_port() -> u16 {
    8001
}

fn default_peer_timeout_ms() -> u64 {
    800
}

fn default_gossip_timeout_ms() -> u64 {
    500
}

fn default_difficulty() -> u32 {
    3
}

fn default_data_path() -> String {
    "./data/custody.db".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.public_url(), "http://127.0.0.1:8001");
    }

    #[test]
    fn test_zero_difficulty_rejected() {
        let mut config = Config::default();
        config.chain.difficulty = 0;
        assert!(matches!(
            config.validate(),
            Err(ChainError::ConfigError(_))
        ));
    }

    #[test]
    fn test_malformed_public_url_rejected() {
        let mut config = Config::default();
        config.network.public_url = Some("not a url".to_string());
        assert!(matches!(
            config.validate(),
            Err(ChainError::ConfigError(_))
        ));
    }

    #[test]
    fn test_malformed_bootstrap_rejected() {
        let mut config = Config::default();
        config.network.bootstrap_url = Some("::::".to_string());
        assert!(matches!(
            config.validate(),
            Err(ChainError::ConfigError(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let config: Config = toml::from_str(
            r#"
            [network]
            listen_port = 9005
            bootstrap_url = "http://127.0.0.1:9000"

            [chain]
            difficulty = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.network.listen_port, 9005);
        assert_eq!(
            config.network.bootstrap_url.as_deref(),
            Some("http://127.0.0.1:9000")
        );
        assert_eq!(config.chain.difficulty, 2);
        assert_eq!(config.database.path, "./data/custody.db");
    }
}
