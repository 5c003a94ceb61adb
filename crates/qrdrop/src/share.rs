//! The upload → link → download lifecycle.
//!
//! [`ShareService`] owns the store, the clock and the fixed policy. Its
//! methods block on store I/O; async callers run them on the blocking pool.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use depot::{sanitize_filename, Artifact, ArtifactId, ArtifactMeta, ArtifactStore, StoreError};
use dropconf::{DropConfig, UploadsConfig, UrlStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{Rejection, ShareError};
use crate::gate::{self, Resolution};
use crate::links::BaseUrl;
use crate::sweeper::{self, SweepReport};

/// How many fresh ids to try before giving up on an upload.
pub const MAX_MINT_ATTEMPTS: usize = 8;

/// What the uploader gets back.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub id: ArtifactId,
    /// Sanitized name the download will carry.
    pub filename: String,
    pub download_url: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct ShareService {
    store: Arc<dyn ArtifactStore>,
    clock: Arc<dyn Clock>,
    base_url: BaseUrl,
    uploads: UploadsConfig,
    ttl: Duration,
}

impl ShareService {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        clock: Arc<dyn Clock>,
        base_url: BaseUrl,
        uploads: UploadsConfig,
        ttl: std::time::Duration,
    ) -> Self {
        Self {
            store,
            clock,
            base_url,
            uploads,
            ttl: Duration::from_std(ttl).unwrap_or(Duration::MAX),
        }
    }

    pub fn from_config(
        store: Arc<dyn ArtifactStore>,
        clock: Arc<dyn Clock>,
        base_url: BaseUrl,
        config: &DropConfig,
    ) -> Self {
        Self::new(
            store,
            clock,
            base_url,
            config.uploads.clone(),
            config.retention.ttl(),
        )
    }

    pub fn store(&self) -> &dyn ArtifactStore {
        self.store.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    pub fn uploads(&self) -> &UploadsConfig {
        &self.uploads
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn url_style(&self) -> UrlStyle {
        self.uploads.url_style
    }

    pub fn download_url(&self, id: &ArtifactId) -> String {
        self.base_url.download_url(id, self.uploads.url_style)
    }

    pub fn qr_url(&self, id: &ArtifactId) -> String {
        self.base_url.qr_url(id)
    }

    /// Apply upload policy and return the sanitized filename.
    pub fn check_upload(&self, original_name: &str, size: u64) -> Result<String, ShareError> {
        if original_name.trim().is_empty() {
            return Err(Rejection::NoSelectedFile.into());
        }
        let filename = sanitize_filename(original_name);
        if !self.uploads.allows(&filename) {
            debug!(filename = %filename, "Rejected upload by extension");
            return Err(Rejection::TypeNotAllowed.into());
        }
        if size > self.uploads.max_upload_bytes {
            return Err(ShareError::TooLarge {
                limit: self.uploads.max_upload_bytes,
            });
        }
        Ok(filename)
    }

    /// Store a new artifact and build its download URL.
    pub fn upload(&self, original_name: &str, payload: &[u8]) -> Result<UploadReceipt, ShareError> {
        let size_bytes = payload.len() as u64;
        let filename = self.check_upload(original_name, size_bytes)?;
        let created_at = self.clock.now();

        for attempt in 1..=MAX_MINT_ATTEMPTS {
            let meta = ArtifactMeta::new(
                ArtifactId::mint(),
                filename.clone(),
                size_bytes,
                created_at,
                self.ttl,
            );
            let id = meta.id.clone();
            let expires_at = meta.expires_at;

            match self.store.put(meta, payload) {
                Ok(()) => {
                    info!(
                        artifact.id = %id,
                        artifact.name = %filename,
                        artifact.size_bytes = size_bytes,
                        %expires_at,
                        "Stored upload"
                    );
                    return Ok(UploadReceipt {
                        download_url: self.download_url(&id),
                        id,
                        filename,
                        size_bytes,
                        created_at,
                        expires_at,
                    });
                }
                Err(StoreError::Collision(id)) => {
                    warn!(artifact.id = %id, attempt, "Minted id already in use, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ShareError::IdsExhausted(MAX_MINT_ATTEMPTS))
    }

    /// Look up `raw_id` as of now. Malformed ids resolve to `NotFound`.
    pub fn resolve(&self, raw_id: &str) -> Result<Resolution, ShareError> {
        let Ok(id) = ArtifactId::parse(raw_id) else {
            debug!(raw_id, "Malformed artifact id");
            return Ok(Resolution::NotFound);
        };
        let resolution = gate::resolve(self.store.as_ref(), &id, self.clock.now())?;
        if let Resolution::Expired(meta) = &resolution {
            debug!(artifact.id = %id, expired_at = %meta.expires_at, "Refused expired artifact");
        }
        Ok(resolution)
    }

    /// The artifact if it is live, otherwise `NotFound` or `Expired`.
    pub fn download(&self, raw_id: &str) -> Result<Artifact, ShareError> {
        match self.resolve(raw_id)? {
            Resolution::Live(artifact) => Ok(artifact),
            Resolution::Expired(meta) => Err(ShareError::Expired(meta.id)),
            Resolution::NotFound => Err(ShareError::NotFound(raw_id.to_string())),
        }
    }

    /// One eviction pass as of `now`.
    pub fn sweep_once(&self, now: DateTime<Utc>) -> SweepReport {
        sweeper::sweep_once(self.store.as_ref(), self.ttl, now)
    }
}
