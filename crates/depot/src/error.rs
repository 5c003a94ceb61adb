use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::id::ArtifactId;

/// Errors from an artifact store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The id is already taken. Callers mint a new id and retry.
    #[error("artifact id collision: {0}")]
    Collision(ArtifactId),

    #[error("failed to {context} at {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bad metadata in {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }
}
