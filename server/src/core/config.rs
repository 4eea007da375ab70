use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::cli::CliConfig;
use super::constants::{
    DEFAULT_CLICKHOUSE_DATABASE, DEFAULT_CLICKHOUSE_URL, DEFAULT_HOST, DEFAULT_PORT,
};

// =============================================================================
// Server Config
// =============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

// =============================================================================
// ClickHouse Config
// =============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClickhouseConfig {
    /// HTTP(S) endpoint of the ClickHouse server
    pub url: String,
    /// Database holding the request log tables
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Enable LZ4 compression on the wire
    pub compression: bool,
}

impl Default for ClickhouseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_CLICKHOUSE_URL.to_string(),
            database: DEFAULT_CLICKHOUSE_DATABASE.to_string(),
            user: None,
            password: None,
            compression: true,
        }
    }
}

// =============================================================================
// App Config
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub clickhouse: ClickhouseConfig,
}

impl AppConfig {
    /// Load configuration: config file (if present) with CLI/env overrides on top
    pub fn load(cli: &CliConfig) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(host) = &cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(url) = &cli.clickhouse_url {
            config.clickhouse.url = url.clone();
        }
        if let Some(database) = &cli.clickhouse_database {
            config.clickhouse.database = database.clone();
        }
        if let Some(user) = &cli.clickhouse_user {
            config.clickhouse.user = Some(user.clone());
        }
        if let Some(password) = &cli.clickhouse_password {
            config.clickhouse.password = Some(password.clone());
        }

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.clickhouse.database, DEFAULT_CLICKHOUSE_DATABASE);
        assert!(config.clickhouse.compression);
    }

    #[test]
    fn cli_overrides_win() {
        let cli = CliConfig {
            host: Some("0.0.0.0".to_string()),
            port: Some(9000),
            clickhouse_url: Some("http://ch:8123".to_string()),
            ..Default::default()
        };
        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.clickhouse.url, "http://ch:8123");
        // Untouched fields keep defaults
        assert_eq!(config.clickhouse.database, DEFAULT_CLICKHOUSE_DATABASE);
    }

    #[test]
    fn partial_config_file_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"server": {"port": 8080}}"#).expect("valid config");
        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.server.host, DEFAULT_HOST);
        assert_eq!(parsed.clickhouse.url, DEFAULT_CLICKHOUSE_URL);
    }
}
