//! Configuration management for the Parkin gateway

pub mod file;
pub mod fleet;

use std::path::PathBuf;
use std::time::Duration;

use file::ParkinConfigFile;

use crate::{Error, Result};

/// Default address the HTTP API binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default HTTP API port
pub const DEFAULT_PORT: u16 = 5000;

/// Default fleet file path, relative to the working directory
pub const DEFAULT_FLEET_FILE: &str = "lamp_config.json";

/// Nodes synthesized when no fleet file exists
pub const DEFAULT_FLEET_SIZE: u32 = 100;

/// Default mesh command (`BlueZ` meshctl)
pub const DEFAULT_MESH_COMMAND: &str = "/usr/bin/meshctl";

/// Default per-command mesh timeout
pub const DEFAULT_MESH_TIMEOUT: Duration = Duration::from_secs(5);

/// Default age after which a node without acknowledged commands is offline
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(300);

/// Default time between staleness sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Parkin gateway configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// HTTP API server configuration
    pub api_server: ApiServerConfig,

    /// Fleet configuration
    pub fleet: FleetConfig,

    /// Mesh transport configuration
    pub mesh: MeshConfig,

    /// Health monitor configuration
    pub health: HealthConfig,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Address to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Fleet configuration
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Fleet file listing node IDs and slots
    pub path: PathBuf,

    /// Size of the synthesized fleet when the file is absent
    pub default_size: u32,

    /// Max dispatches in flight during bulk and reset operations (1 = sequential)
    pub bulk_concurrency: usize,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_FLEET_FILE),
            default_size: DEFAULT_FLEET_SIZE,
            bulk_concurrency: 1,
        }
    }
}

/// Mesh transport configuration
#[derive(Debug, Clone)]
pub struct MeshConfig {
    /// Mesh command to execute
    pub command: String,

    /// Timeout for a single command
    pub timeout: Duration,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_MESH_COMMAND.to_string(),
            timeout: DEFAULT_MESH_TIMEOUT,
        }
    }
}

/// Health monitor configuration
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Age after which a node is considered offline
    pub stale_after: Duration,

    /// Time between sweeps
    pub sweep_interval: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            stale_after: DEFAULT_STALE_AFTER,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl Config {
    /// Load configuration from the environment and the optional TOML file
    ///
    /// Precedence: env > toml > default
    ///
    /// # Errors
    ///
    /// Returns error if a value is malformed or out of range
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with values from `env`
    ///
    /// # Errors
    ///
    /// Returns error if a value is malformed or out of range
    pub fn from_sources(fc: ParkinConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_server = ApiServerConfig {
            host: env("PARKIN_HOST")
                .or(fc.server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_env(&env, "PARKIN_PORT")?
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
        };

        let fleet = FleetConfig {
            path: env("PARKIN_FLEET_FILE")
                .or(fc.fleet.path)
                .map_or_else(|| PathBuf::from(DEFAULT_FLEET_FILE), PathBuf::from),
            default_size: parse_env(&env, "PARKIN_DEFAULT_FLEET_SIZE")?
                .or(fc.fleet.default_size)
                .unwrap_or(DEFAULT_FLEET_SIZE),
            bulk_concurrency: parse_env(&env, "PARKIN_BULK_CONCURRENCY")?
                .or(fc.fleet.bulk_concurrency)
                .unwrap_or(1),
        };

        let mesh = MeshConfig {
            command: env("PARKIN_MESH_COMMAND")
                .or(fc.mesh.command)
                .unwrap_or_else(|| DEFAULT_MESH_COMMAND.to_string()),
            timeout: parse_env(&env, "PARKIN_MESH_TIMEOUT_SECS")?
                .or(fc.mesh.timeout_secs)
                .map_or(DEFAULT_MESH_TIMEOUT, Duration::from_secs),
        };

        let health = HealthConfig {
            stale_after: parse_env(&env, "PARKIN_STALE_AFTER_SECS")?
                .or(fc.health.stale_after_secs)
                .map_or(DEFAULT_STALE_AFTER, Duration::from_secs),
            sweep_interval: parse_env(&env, "PARKIN_SWEEP_INTERVAL_SECS")?
                .or(fc.health.sweep_interval_secs)
                .map_or(DEFAULT_SWEEP_INTERVAL, Duration::from_secs),
        };

        let config = Self {
            api_server,
            fleet,
            mesh,
            health,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that all values are usable
    ///
    /// # Errors
    ///
    /// Returns error naming the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if self.fleet.default_size == 0 {
            return Err(Error::Config("default fleet size must be at least 1".to_string()));
        }
        if self.fleet.bulk_concurrency == 0 {
            return Err(Error::Config("bulk concurrency must be at least 1".to_string()));
        }
        if self.mesh.command.trim().is_empty() {
            return Err(Error::Config("mesh command must not be empty".to_string()));
        }
        if self.mesh.timeout.is_zero() {
            return Err(Error::Config("mesh timeout must be non-zero".to_string()));
        }
        if self.health.sweep_interval.is_zero() {
            return Err(Error::Config("sweep interval must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Socket address string for the HTTP API
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api_server.host, self.api_server.port)
    }
}

/// Parse an optional environment variable, rejecting malformed values
fn parse_env<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid value for {key}: {raw:?}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_sources() {
        let config = Config::from_sources(ParkinConfigFile::default(), env_from(&[])).unwrap();

        assert_eq!(config.api_server.port, 5000);
        assert_eq!(config.bind_addr(), "0.0.0.0:5000");
        assert_eq!(config.fleet.path, PathBuf::from("lamp_config.json"));
        assert_eq!(config.fleet.default_size, 100);
        assert_eq!(config.fleet.bulk_concurrency, 1);
        assert_eq!(config.mesh.command, "/usr/bin/meshctl");
        assert_eq!(config.mesh.timeout, Duration::from_secs(5));
        assert_eq!(config.health.stale_after, Duration::from_secs(300));
        assert_eq!(config.health.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn env_overrides_file() {
        let fc: ParkinConfigFile = toml::from_str(
            r#"
            [server]
            port = 7000
            host = "127.0.0.1"

            [health]
            stale_after_secs = 120
            "#,
        )
        .unwrap();

        let config = Config::from_sources(
            fc,
            env_from(&[("PARKIN_PORT", "7100"), ("PARKIN_MESH_TIMEOUT_SECS", "2")]),
        )
        .unwrap();

        assert_eq!(config.api_server.port, 7100);
        assert_eq!(config.api_server.host, "127.0.0.1");
        assert_eq!(config.mesh.timeout, Duration::from_secs(2));
        assert_eq!(config.health.stale_after, Duration::from_secs(120));
    }

    #[test]
    fn malformed_env_value_is_an_error() {
        let result = Config::from_sources(
            ParkinConfigFile::default(),
            env_from(&[("PARKIN_PORT", "eighty")]),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn zero_values_rejected() {
        for key in [
            "PARKIN_DEFAULT_FLEET_SIZE",
            "PARKIN_BULK_CONCURRENCY",
            "PARKIN_MESH_TIMEOUT_SECS",
            "PARKIN_SWEEP_INTERVAL_SECS",
        ] {
            let result =
                Config::from_sources(ParkinConfigFile::default(), env_from(&[(key, "0")]));
            assert!(result.is_err(), "{key}=0 should be rejected");
        }
    }
}
