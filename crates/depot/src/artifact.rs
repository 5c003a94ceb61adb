//! Artifact metadata and payload references.
//!
//! The metadata is what the disk store writes to its JSON sidecar, so it
//! carries everything needed to rebuild the index after a restart.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::StoreError;
use crate::id::ArtifactId;

/// Everything known about an artifact except its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub id: ArtifactId,

    /// Sanitized client filename, echoed back on download.
    pub original_name: String,

    /// Guessed from the extension of `original_name`.
    pub mime_type: String,

    pub size_bytes: u64,

    pub created_at: DateTime<Utc>,

    /// `created_at + ttl`, fixed at creation.
    pub expires_at: DateTime<Utc>,
}

impl ArtifactMeta {
    pub fn new(
        id: ArtifactId,
        original_name: impl Into<String>,
        size_bytes: u64,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let original_name = original_name.into();
        Self {
            id,
            mime_type: guess_mime_type(&original_name).to_string(),
            original_name,
            size_bytes,
            created_at,
            expires_at: created_at
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Live iff `now < expires_at`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Time elapsed since creation. Negative if `now` precedes creation.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    /// Whole seconds until expiry, zero once expired.
    pub fn remaining_secs_at(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// Where an artifact's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Held in memory.
    Inline(Bytes),
    /// A file on local disk.
    File(PathBuf),
}

impl Payload {
    /// Read the full payload into memory.
    pub fn read_all(&self) -> Result<Bytes, StoreError> {
        match self {
            Payload::Inline(bytes) => Ok(bytes.clone()),
            Payload::File(path) => fs::read(path)
                .map(Bytes::from)
                .map_err(|source| StoreError::io("read payload", path, source)),
        }
    }
}

/// Metadata plus a reference to the payload.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub meta: ArtifactMeta,
    pub payload: Payload,
}

/// Guess a MIME type from a filename extension.
pub fn guess_mime_type(filename: &str) -> &'static str {
    let ext = match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return "application/octet-stream",
    };

    match ext.as_str() {
        "txt" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "zip" => "application/zip",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_meta_expiry_window() {
        let meta = ArtifactMeta::new(ArtifactId::mint(), "a.txt", 10, t0(), Duration::seconds(3600));
        assert_eq!(meta.expires_at, t0() + Duration::seconds(3600));
        assert_eq!(meta.mime_type, "text/plain");

        assert!(meta.is_live_at(t0()));
        assert!(meta.is_live_at(t0() + Duration::seconds(3599)));
        assert!(!meta.is_live_at(t0() + Duration::seconds(3600)));
        assert!(!meta.is_live_at(t0() + Duration::seconds(3601)));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let meta = ArtifactMeta::new(ArtifactId::mint(), "a.txt", 1, t0(), Duration::MAX);
        assert_eq!(meta.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(meta.is_live_at(t0() + Duration::days(365 * 100)));
    }

    #[test]
    fn test_remaining_secs_clamps() {
        let meta = ArtifactMeta::new(ArtifactId::mint(), "a.txt", 10, t0(), Duration::seconds(60));
        assert_eq!(meta.remaining_secs_at(t0()), 60);
        assert_eq!(meta.remaining_secs_at(t0() + Duration::seconds(90)), 0);
        assert_eq!(meta.age_at(t0() + Duration::seconds(90)), Duration::seconds(90));
    }

    #[test]
    fn test_meta_serde() {
        let meta = ArtifactMeta::new(ArtifactId::mint(), "photo.JPG", 48000, t0(), Duration::seconds(5));
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"original_name\":\"photo.JPG\""));
        let restored: ArtifactMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(meta, restored);
    }

    #[test]
    fn test_guess_mime_type() {
        assert_eq!(guess_mime_type("a.PNG"), "image/png");
        assert_eq!(guess_mime_type("archive.tar.zip"), "application/zip");
        assert_eq!(guess_mime_type("README"), "application/octet-stream");
        assert_eq!(guess_mime_type("weird.xyz"), "application/octet-stream");
    }

    #[test]
    fn test_inline_payload_read() {
        let payload = Payload::Inline(Bytes::from_static(b"hello"));
        assert_eq!(payload.read_all().unwrap(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn test_missing_file_payload_errors() {
        let payload = Payload::File(PathBuf::from("/nonexistent/qrdrop/payload"));
        assert!(payload.read_all().is_err());
    }
}
