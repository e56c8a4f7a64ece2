//! TOML configuration file loading
//!
//! Supports `~/.config/parkin/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParkinConfigFile {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Fleet file location and default population
    #[serde(default)]
    pub fleet: FleetFileConfig,

    /// Mesh transport configuration
    #[serde(default)]
    pub mesh: MeshFileConfig,

    /// Health monitor configuration
    #[serde(default)]
    pub health: HealthFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Address to bind (e.g. "0.0.0.0")
    pub host: Option<String>,

    /// API server port
    pub port: Option<u16>,
}

/// Fleet configuration
#[derive(Debug, Default, Deserialize)]
pub struct FleetFileConfig {
    /// Path to the fleet file (`lamp_config.json`)
    pub path: Option<String>,

    /// Number of nodes synthesized when the fleet file is absent
    pub default_size: Option<u32>,

    /// Max dispatches in flight during bulk and reset operations
    pub bulk_concurrency: Option<usize>,
}

/// Mesh transport configuration
#[derive(Debug, Default, Deserialize)]
pub struct MeshFileConfig {
    /// Mesh command (e.g. "/usr/bin/meshctl")
    pub command: Option<String>,

    /// Per-command timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Health monitor configuration
#[derive(Debug, Default, Deserialize)]
pub struct HealthFileConfig {
    /// Seconds without an acknowledged command before a node is offline
    pub stale_after_secs: Option<u64>,

    /// Seconds between staleness sweeps
    pub sweep_interval_secs: Option<u64>,
}

/// Load the TOML config file from `PARKIN_CONFIG` or the standard path
///
/// Returns `ParkinConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ParkinConfigFile {
    let path = std::env::var("PARKIN_CONFIG")
        .ok()
        .map(PathBuf::from)
        .or_else(config_file_path);

    let Some(path) = path else {
        return ParkinConfigFile::default();
    };

    if !path.exists() {
        return ParkinConfigFile::default();
    }

    load_from(&path)
}

/// Parse a config file at an explicit path, falling back to defaults on error
pub fn load_from(path: &Path) -> ParkinConfigFile {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ParkinConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ParkinConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/parkin/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("parkin").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_parses() {
        let fc: ParkinConfigFile = toml::from_str(
            r#"
            [server]
            port = 8080

            [mesh]
            timeout_secs = 2
            "#,
        )
        .unwrap();

        assert_eq!(fc.server.port, Some(8080));
        assert!(fc.server.host.is_none());
        assert_eq!(fc.mesh.timeout_secs, Some(2));
        assert!(fc.health.stale_after_secs.is_none());
    }

    #[test]
    fn unparseable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = \"not a port\"").unwrap();

        let fc = load_from(&path);
        assert!(fc.server.port.is_none());
    }

    #[test]
    fn unknown_section_rejected() {
        let parsed = toml::from_str::<ParkinConfigFile>("[voice]\nenabled = true");
        assert!(parsed.is_err());
    }
}
