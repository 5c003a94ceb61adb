//! Upload and retention policy - fixed for the process lifetime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which artifact store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// One file per artifact under `paths.data_dir`.
    #[default]
    Disk,
    /// Process memory; nothing survives a restart.
    Memory,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disk" => Ok(Self::Disk),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(format!("unknown storage kind '{other}' (expected disk or memory)")),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disk => write!(f, "disk"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Shape of the download URL encoded into QR codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlStyle {
    /// `{base}/download/{id}`
    #[default]
    Path,
    /// `{base}/?file_id={id}&download=true`
    Query,
}

impl FromStr for UrlStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "path" => Ok(Self::Path),
            "query" => Ok(Self::Query),
            other => Err(format!("unknown url style '{other}' (expected path or query)")),
        }
    }
}

impl fmt::Display for UrlStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path => write!(f, "path"),
            Self::Query => write!(f, "query"),
        }
    }
}

/// What uploads are accepted and where they go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadsConfig {
    #[serde(default)]
    pub storage: StorageKind,

    /// Maximum accepted request body in bytes.
    /// Default: 16 MiB
    #[serde(default = "UploadsConfig::default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Lowercase extensions without the dot. Empty accepts any file.
    #[serde(default = "UploadsConfig::default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    #[serde(default)]
    pub url_style: UrlStyle,
}

impl UploadsConfig {
    fn default_max_upload_bytes() -> u64 {
        16 * 1024 * 1024
    }

    fn default_allowed_extensions() -> Vec<String> {
        [
            "txt", "pdf", "png", "jpg", "jpeg", "gif", "doc", "docx", "xls", "xlsx", "zip",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Whether a filename passes the extension allow-list.
    ///
    /// A name without an extension is rejected unless the list is empty.
    pub fn allows(&self, filename: &str) -> bool {
        if self.allowed_extensions.is_empty() {
            return true;
        }
        let Some((stem, ext)) = filename.rsplit_once('.') else {
            return false;
        };
        if stem.is_empty() && ext.is_empty() {
            return false;
        }
        let ext = ext.to_ascii_lowercase();
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    }
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            storage: StorageKind::default(),
            max_upload_bytes: Self::default_max_upload_bytes(),
            allowed_extensions: Self::default_allowed_extensions(),
            url_style: UrlStyle::default(),
        }
    }
}

/// How long artifacts live and how often expired ones are reclaimed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Default: 3600 (one hour)
    #[serde(default = "RetentionConfig::default_ttl_secs")]
    pub ttl_secs: u64,

    /// Default: 300 (five minutes)
    #[serde(default = "RetentionConfig::default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl RetentionConfig {
    fn default_ttl_secs() -> u64 {
        3600
    }

    fn default_sweep_interval_secs() -> u64 {
        300
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: Self::default_ttl_secs(),
            sweep_interval_secs: Self::default_sweep_interval_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uploads_defaults() {
        let uploads = UploadsConfig::default();
        assert_eq!(uploads.storage, StorageKind::Disk);
        assert_eq!(uploads.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(uploads.allowed_extensions.len(), 11);
        assert_eq!(uploads.url_style, UrlStyle::Path);
    }

    #[test]
    fn test_allows_is_case_insensitive() {
        let uploads = UploadsConfig::default();
        assert!(uploads.allows("report.PDF"));
        assert!(uploads.allows("archive.tar.zip"));
        assert!(!uploads.allows("script.sh"));
        assert!(!uploads.allows("README"));
    }

    #[test]
    fn test_empty_allow_list_accepts_anything() {
        let uploads = UploadsConfig {
            allowed_extensions: Vec::new(),
            ..UploadsConfig::default()
        };
        assert!(uploads.allows("README"));
        assert!(uploads.allows("binary.exe"));
    }

    #[test]
    fn test_retention_defaults() {
        let retention = RetentionConfig::default();
        assert_eq!(retention.ttl(), Duration::from_secs(3600));
        assert_eq!(retention.sweep_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_storage_kind_parse() {
        assert_eq!("Disk".parse::<StorageKind>(), Ok(StorageKind::Disk));
        assert_eq!("memory".parse::<StorageKind>(), Ok(StorageKind::Memory));
        assert!("s3".parse::<StorageKind>().is_err());
    }

    #[test]
    fn test_url_style_parse() {
        assert_eq!("query".parse::<UrlStyle>(), Ok(UrlStyle::Query));
        assert_eq!(UrlStyle::Path.to_string(), "path");
        assert!("fragment".parse::<UrlStyle>().is_err());
    }
}
