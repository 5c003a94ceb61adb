//! On-disk layout of a [`FileStore`](crate::FileStore).
//!
//! ```text
//! {base_path}/
//! ├── objects/{id}          payload bytes
//! ├── metadata/{id}.json    ArtifactMeta sidecar
//! └── staging/{id}.part     in-flight writes
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::id::ArtifactId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepotConfig {
    pub base_path: PathBuf,
}

impl DepotConfig {
    pub fn with_base_path(path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: path.into(),
        }
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.base_path.join("objects")
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.base_path.join("metadata")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.base_path.join("staging")
    }

    pub fn object_path(&self, id: &ArtifactId) -> PathBuf {
        self.objects_dir().join(id.as_str())
    }

    pub fn metadata_path(&self, id: &ArtifactId) -> PathBuf {
        self.metadata_dir().join(format!("{id}.json"))
    }

    /// Staging file for `name`, which is an id optionally with a suffix.
    pub(crate) fn staging_path(&self, name: &str) -> PathBuf {
        self.staging_dir().join(format!("{name}.part"))
    }
}
