//! Configuration loading for qrdrop.
//!
//! Every value here is read once at startup and stays fixed for the
//! lifetime of the process.
//!
//! # Configuration Philosophy
//!
//! - **Infrastructure** (`PathsConfig`, `BindConfig`, `TelemetryConfig`):
//!   where the service lives and what it tells the world about itself.
//!
//! - **Policy** (`UploadsConfig`, `RetentionConfig`): what uploads are
//!   accepted and how long they live.
//!
//! # Usage
//!
//! ```rust,no_run
//! use dropconf::DropConfig;
//!
//! let config = DropConfig::load().expect("Failed to load config");
//! config.validate().expect("invalid config");
//!
//! println!("data dir: {}", config.paths.data_dir.display());
//! println!("port: {}", config.bind.port);
//! println!("ttl: {:?}", config.retention.ttl());
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/qrdrop/config.toml` (system)
//! 2. `~/.config/qrdrop/config.toml` (user)
//! 3. `./qrdrop.toml` or `--config PATH` (local override)
//! 4. Environment variables (`QRDROP_*`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! data_dir = "~/.local/share/qrdrop"
//!
//! [bind]
//! host = "0.0.0.0"
//! port = 5000
//! public_url = ""
//!
//! [uploads]
//! storage = "disk"
//! max_upload_bytes = 16777216
//! allowed_extensions = ["txt", "pdf", "png"]
//! url_style = "path"
//!
//! [retention]
//! ttl_secs = 3600
//! sweep_interval_secs = 300
//!
//! [telemetry]
//! otlp_endpoint = ""
//! log_level = "info"
//! ```

pub mod infra;
pub mod loader;
pub mod policy;

pub use infra::{BindConfig, PathsConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};
pub use policy::{RetentionConfig, StorageKind, UploadsConfig, UrlStyle};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("Failed to serialize config: {0}")]
    Serialize(String),
}

/// Complete qrdrop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DropConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub bind: BindConfig,

    #[serde(default)]
    pub uploads: UploadsConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl DropConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/qrdrop/config.toml`
    /// 3. `~/.config/qrdrop/config.toml`
    /// 4. `./qrdrop.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./qrdrop.toml` override. System and user configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and return information about sources.
    pub fn load_with_sources() -> Result<(Self, ConfigSources), ConfigError> {
        Self::load_with_sources_from(None)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in loader::discover_config_files_with_override(config_path) {
            let table = loader::load_table_from_file(&path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path);
        }

        let origin = sources
            .files
            .last()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("<defaults>"));
        let mut config = loader::config_from_table(merged, &origin)?;

        loader::apply_env_overrides(&mut config, &mut sources)?;

        Ok((config, sources))
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention.ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "retention.ttl_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.retention.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "retention.sweep_interval_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.uploads.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "uploads.max_upload_bytes",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.bind.host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "bind.host",
                message: "must not be empty".to_string(),
            });
        }
        if self.uploads.storage == StorageKind::Disk
            && self.paths.data_dir.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid {
                field: "paths.data_dir",
                message: "required for disk storage".to_string(),
            });
        }
        Ok(())
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let body =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(format!("# qrdrop configuration\n\n{body}"))
    }
}
