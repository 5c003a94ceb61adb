//! Artifact stores.
//!
//! [`ArtifactStore`] is the seam between the share service and storage.
//! [`FileStore`] keeps one file per artifact plus a JSON sidecar;
//! [`MemoryStore`](crate::MemoryStore) keeps everything in process memory.
//!
//! Both keep an id → metadata index behind a single lock that is held only
//! while the index itself changes. Payload I/O happens outside it, and an id
//! becomes visible only after its payload and sidecar are durable.

use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::artifact::{Artifact, ArtifactMeta, Payload};
use crate::config::DepotConfig;
use crate::error::StoreError;
use crate::id::ArtifactId;

/// Storage backend for uploaded artifacts.
///
/// Implementations must be safe to share across threads; every method may be
/// called concurrently.
pub trait ArtifactStore: Send + Sync {
    /// Store an artifact under `meta.id`.
    ///
    /// Returns [`StoreError::Collision`] if the id is taken.
    fn put(&self, meta: ArtifactMeta, payload: &[u8]) -> Result<(), StoreError>;

    /// Fetch an artifact regardless of expiry. `Ok(None)` if absent.
    fn get(&self, id: &ArtifactId) -> Result<Option<Artifact>, StoreError>;

    /// Remove an artifact. Returns whether anything was removed; deleting an
    /// absent id is not an error.
    fn delete(&self, id: &ArtifactId) -> Result<bool, StoreError>;

    /// All stored ids, in no particular order.
    fn list_ids(&self) -> Result<Vec<ArtifactId>, StoreError>;

    fn count(&self) -> usize;

    fn total_bytes(&self) -> u64;

    /// Short backend name for logs and the health endpoint.
    fn backend(&self) -> &'static str;
}

#[derive(Debug, Default)]
pub(crate) struct Index {
    pub(crate) live: HashMap<ArtifactId, ArtifactMeta>,
    /// Ids with a `put` in flight.
    pub(crate) reserved: HashSet<ArtifactId>,
}

impl Index {
    /// Claim `id` for a put. Fails if it is stored or already claimed.
    pub(crate) fn reserve(&mut self, id: &ArtifactId) -> Result<(), StoreError> {
        if self.live.contains_key(id) || !self.reserved.insert(id.clone()) {
            return Err(StoreError::Collision(id.clone()));
        }
        Ok(())
    }
}

pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Filesystem-backed artifact store.
#[derive(Debug)]
pub struct FileStore {
    config: DepotConfig,
    index: RwLock<Index>,
}

impl FileStore {
    /// Open (or create) a store.
    ///
    /// Leftover staging files are discarded and the index is rebuilt from
    /// the metadata sidecars, so artifacts survive a restart.
    pub fn new(config: DepotConfig) -> Result<Self, StoreError> {
        for dir in [
            config.objects_dir(),
            config.metadata_dir(),
            config.staging_dir(),
        ] {
            fs::create_dir_all(&dir)
                .map_err(|source| StoreError::io("create directory", &dir, source))?;
        }

        clear_staging(&config)?;
        let live = load_index(&config)?;

        info!(
            path = %config.base_path.display(),
            artifacts = live.len(),
            "Opened artifact store"
        );

        Ok(Self {
            config,
            index: RwLock::new(Index {
                live,
                reserved: HashSet::new(),
            }),
        })
    }

    /// Open a store at a specific path.
    pub fn at_path(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::new(DepotConfig::with_base_path(path))
    }

    pub fn config(&self) -> &DepotConfig {
        &self.config
    }

    /// Write payload and sidecar to their final paths.
    fn persist(&self, meta: &ArtifactMeta, payload: &[u8]) -> Result<(), StoreError> {
        let id = &meta.id;

        write_durably(
            &self.config.staging_path(id.as_str()),
            &self.config.object_path(id),
            payload,
        )?;

        let meta_path = self.config.metadata_path(id);
        let json = serde_json::to_vec_pretty(meta).map_err(|source| StoreError::Metadata {
            path: meta_path.clone(),
            source,
        })?;
        write_durably(
            &self.config.staging_path(&format!("{id}.json")),
            &meta_path,
            &json,
        )
    }

    /// Remove the sidecar, then the payload. Missing files are fine.
    fn remove_files(&self, id: &ArtifactId) -> Result<(), StoreError> {
        remove_if_present(&self.config.metadata_path(id))?;
        remove_if_present(&self.config.object_path(id))
    }
}

impl ArtifactStore for FileStore {
    fn put(&self, meta: ArtifactMeta, payload: &[u8]) -> Result<(), StoreError> {
        debug_assert_eq!(meta.size_bytes, payload.len() as u64);
        let id = meta.id.clone();

        write_lock(&self.index).reserve(&id)?;

        let result = self.persist(&meta, payload);
        if result.is_err() {
            for name in [id.to_string(), format!("{id}.json")] {
                let _ = remove_if_present(&self.config.staging_path(&name));
            }
            if let Err(e) = self.remove_files(&id) {
                warn!(artifact.id = %id, error = %e, "Failed to clean up after failed put");
            }
        }

        let mut index = write_lock(&self.index);
        index.reserved.remove(&id);
        result?;
        index.live.insert(id.clone(), meta);
        drop(index);

        debug!(artifact.id = %id, artifact.size_bytes = payload.len(), "Stored artifact");
        Ok(())
    }

    fn get(&self, id: &ArtifactId) -> Result<Option<Artifact>, StoreError> {
        let meta = read_lock(&self.index).live.get(id).cloned();
        Ok(meta.map(|meta| Artifact {
            payload: Payload::File(self.config.object_path(id)),
            meta,
        }))
    }

    fn delete(&self, id: &ArtifactId) -> Result<bool, StoreError> {
        let Some(meta) = write_lock(&self.index).live.remove(id) else {
            return Ok(false);
        };

        if let Err(e) = self.remove_files(id) {
            // Put it back so the next sweep retries.
            write_lock(&self.index).live.insert(id.clone(), meta);
            return Err(e);
        }

        debug!(artifact.id = %id, "Deleted artifact");
        Ok(true)
    }

    fn list_ids(&self) -> Result<Vec<ArtifactId>, StoreError> {
        Ok(read_lock(&self.index).live.keys().cloned().collect())
    }

    fn count(&self) -> usize {
        read_lock(&self.index).live.len()
    }

    fn total_bytes(&self) -> u64 {
        read_lock(&self.index)
            .live
            .values()
            .map(|meta| meta.size_bytes)
            .sum()
    }

    fn backend(&self) -> &'static str {
        "disk"
    }
}

/// Write to `staging`, fsync, then rename over `dest`.
fn write_durably(staging: &Path, dest: &Path, data: &[u8]) -> Result<(), StoreError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(staging)
        .map_err(|source| StoreError::io("create staging file", staging, source))?;
    file.write_all(data)
        .and_then(|()| file.sync_all())
        .map_err(|source| StoreError::io("write staging file", staging, source))?;
    drop(file);

    fs::rename(staging, dest).map_err(|source| StoreError::io("rename staging file", dest, source))
}

fn remove_if_present(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StoreError::io("remove file", path, source)),
    }
}

fn read_dir_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let entries = fs::read_dir(dir).map_err(|source| StoreError::io("read directory", dir, source))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| StoreError::io("read directory", dir, source))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

fn clear_staging(config: &DepotConfig) -> Result<(), StoreError> {
    let mut cleared = 0usize;
    for path in read_dir_files(&config.staging_dir())? {
        match fs::remove_file(&path) {
            Ok(()) => cleared += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove staging file"),
        }
    }
    if cleared > 0 {
        info!(cleared, "Discarded interrupted uploads");
    }
    Ok(())
}

/// Rebuild the index from sidecars, dropping anything half-written.
fn load_index(config: &DepotConfig) -> Result<HashMap<ArtifactId, ArtifactMeta>, StoreError> {
    let mut live = HashMap::new();

    for path in read_dir_files(&config.metadata_dir())? {
        let stem_id = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_suffix(".json"))
            .and_then(|stem| ArtifactId::parse(stem).ok());
        let Some(stem_id) = stem_id else {
            debug!(path = %path.display(), "Ignoring unrecognized file in metadata directory");
            continue;
        };

        let meta = fs::read(&path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_slice::<ArtifactMeta>(&raw).map_err(|e| e.to_string()));

        match meta {
            Ok(meta) if meta.id == stem_id && config.object_path(&stem_id).is_file() => {
                live.insert(stem_id, meta);
            }
            Ok(_) => {
                warn!(path = %path.display(), "Dropping sidecar without matching payload");
                remove_if_present(&path)?;
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "Dropping unreadable sidecar");
                remove_if_present(&path)?;
            }
        }
    }

    for path in read_dir_files(&config.objects_dir())? {
        let id = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| ArtifactId::parse(name).ok());
        if let Some(id) = id {
            if !live.contains_key(&id) {
                warn!(artifact.id = %id, "Removing payload without metadata");
                remove_if_present(&path)?;
            }
        }
    }

    Ok(live)
}
