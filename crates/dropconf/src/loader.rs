//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, DropConfig};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/qrdrop/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("qrdrop/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("qrdrop.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a config file as a raw TOML table.
pub fn load_table_from_file(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_table(&contents, path)
}

fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Merge `overlay` into `base` key by key. Nested tables merge recursively;
/// any other value in `overlay` replaces the one in `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Turn a merged table into a config, filling gaps with compiled defaults.
pub fn config_from_table(table: toml::Table, origin: &Path) -> Result<DropConfig, ConfigError> {
    let mut config = toml::Value::Table(table)
        .try_into::<DropConfig>()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;

    let raw = config.paths.data_dir.to_string_lossy().into_owned();
    config.paths.data_dir = expand_path(&raw);
    Ok(config)
}

/// Apply `QRDROP_*` environment variables on top of a loaded config.
pub fn apply_env_overrides(
    config: &mut DropConfig,
    sources: &mut ConfigSources,
) -> Result<(), ConfigError> {
    apply_overrides_from(config, sources, |key| env::var(key).ok())
}

/// Parse an override value, naming the variable in the error.
fn parse_var<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        field: key,
        message: format!("'{value}': {e}"),
    })
}

/// Apply overrides using an arbitrary lookup (tests pass a map instead of the
/// process environment).
///
/// A value that does not parse is an error; a key is recorded in `sources`
/// only once its value has been applied.
pub fn apply_overrides_from<F>(
    config: &mut DropConfig,
    sources: &mut ConfigSources,
    lookup: F,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied: Vec<&'static str> = Vec::new();
    let mut var = |key: &'static str| {
        let value = lookup(key)?;
        applied.push(key);
        Some(value)
    };

    if let Some(v) = var("QRDROP_DATA_DIR") {
        config.paths.data_dir = expand_path(&v);
    }

    if let Some(v) = var("QRDROP_HOST") {
        config.bind.host = v;
    }
    if let Some(v) = var("QRDROP_PORT") {
        config.bind.port = parse_var("QRDROP_PORT", &v)?;
    }
    if let Some(v) = var("QRDROP_PUBLIC_URL") {
        config.bind.public_url = v;
    }

    if let Some(v) = var("QRDROP_STORAGE") {
        config.uploads.storage = parse_var("QRDROP_STORAGE", &v)?;
    }
    if let Some(v) = var("QRDROP_MAX_UPLOAD_BYTES") {
        config.uploads.max_upload_bytes = parse_var("QRDROP_MAX_UPLOAD_BYTES", &v)?;
    }
    if let Some(v) = var("QRDROP_ALLOWED_EXTENSIONS") {
        config.uploads.allowed_extensions = v
            .split(',')
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
    }
    if let Some(v) = var("QRDROP_URL_STYLE") {
        config.uploads.url_style = parse_var("QRDROP_URL_STYLE", &v)?;
    }

    if let Some(v) = var("QRDROP_TTL_SECS") {
        config.retention.ttl_secs = parse_var("QRDROP_TTL_SECS", &v)?;
    }
    if let Some(v) = var("QRDROP_SWEEP_INTERVAL_SECS") {
        config.retention.sweep_interval_secs = parse_var("QRDROP_SWEEP_INTERVAL_SECS", &v)?;
    }

    if let Some(v) = var("QRDROP_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = v;
    }
    // Also support standard OTEL env var
    if let Some(v) = var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = v;
    }
    if let Some(v) = var("QRDROP_LOG_LEVEL") {
        config.telemetry.log_level = v;
    }
    if let Some(v) = var("RUST_LOG") {
        config.telemetry.log_level = v;
    }

    sources
        .env_overrides
        .extend(applied.into_iter().map(str::to_string));
    Ok(())
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}
