//! Retrieval gate: decide whether an artifact may be served right now.
//!
//! Expiry is checked on every request, so an artifact stops being served
//! the instant its deadline passes even if the sweeper has not reached it.

use chrono::{DateTime, Utc};
use depot::{Artifact, ArtifactId, ArtifactMeta, ArtifactStore, StoreError};

#[derive(Debug, Clone)]
pub enum Resolution {
    Live(Artifact),
    /// Still stored but past `expires_at`.
    Expired(ArtifactMeta),
    NotFound,
}

impl Resolution {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }
}

pub fn resolve(
    store: &dyn ArtifactStore,
    id: &ArtifactId,
    now: DateTime<Utc>,
) -> Result<Resolution, StoreError> {
    Ok(match store.get(id)? {
        None => Resolution::NotFound,
        Some(artifact) if artifact.meta.is_live_at(now) => Resolution::Live(artifact),
        Some(artifact) => Resolution::Expired(artifact.meta),
    })
}
