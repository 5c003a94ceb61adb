//! Infrastructure configuration - things that cannot change at runtime.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem paths for qrdrop state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory for the disk-backed artifact store.
    /// Default: ~/.local/share/qrdrop
    #[serde(default = "PathsConfig::default_data_dir")]
    pub data_dir: PathBuf,
}

impl PathsConfig {
    fn default_data_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".local/share/qrdrop"))
            .unwrap_or_else(|| PathBuf::from(".local/share/qrdrop"))
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
        }
    }
}

/// Listening address and the public address advertised in download URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindConfig {
    /// Interface to bind.
    /// Default: 0.0.0.0
    #[serde(default = "BindConfig::default_host")]
    pub host: String,

    /// HTTP port.
    /// Default: 5000
    #[serde(default = "BindConfig::default_port")]
    pub port: u16,

    /// Externally reachable base URL (e.g. a tunnel or reverse proxy).
    /// Empty means "derive from the machine's LAN address and `port`".
    #[serde(default)]
    pub public_url: String,
}

impl BindConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        5000
    }

    /// The public URL, if one was configured.
    pub fn public_url(&self) -> Option<&str> {
        let trimmed = self.public_url.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            public_url: String::new(),
        }
    }
}

/// Telemetry and observability configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint for OpenTelemetry. Empty disables export.
    /// Default: disabled
    #[serde(default)]
    pub otlp_endpoint: String,

    /// Log level (trace, debug, info, warn, error) or a full EnvFilter directive.
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }

    pub fn otlp_endpoint(&self) -> Option<&str> {
        let trimmed = self.otlp_endpoint.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: String::new(),
            log_level: Self::default_log_level(),
        }
    }
}
