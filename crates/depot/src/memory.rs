//! In-memory artifact store. Nothing survives process exit.

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;
use tracing::debug;

use crate::artifact::{Artifact, ArtifactMeta, Payload};
use crate::error::StoreError;
use crate::id::ArtifactId;
use crate::store::{read_lock, write_lock, ArtifactStore};

#[derive(Debug, Default)]
pub struct MemoryStore {
    artifacts: RwLock<HashMap<ArtifactId, (ArtifactMeta, Bytes)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for MemoryStore {
    fn put(&self, meta: ArtifactMeta, payload: &[u8]) -> Result<(), StoreError> {
        debug_assert_eq!(meta.size_bytes, payload.len() as u64);
        // Copy before taking the lock.
        let bytes = Bytes::copy_from_slice(payload);
        let id = meta.id.clone();

        let mut artifacts = write_lock(&self.artifacts);
        if artifacts.contains_key(&id) {
            return Err(StoreError::Collision(id));
        }
        artifacts.insert(id.clone(), (meta, bytes));
        drop(artifacts);

        debug!(artifact.id = %id, artifact.size_bytes = payload.len(), "Stored artifact in memory");
        Ok(())
    }

    fn get(&self, id: &ArtifactId) -> Result<Option<Artifact>, StoreError> {
        let artifacts = read_lock(&self.artifacts);
        Ok(artifacts.get(id).map(|(meta, bytes)| Artifact {
            meta: meta.clone(),
            payload: Payload::Inline(bytes.clone()),
        }))
    }

    fn delete(&self, id: &ArtifactId) -> Result<bool, StoreError> {
        Ok(write_lock(&self.artifacts).remove(id).is_some())
    }

    fn list_ids(&self) -> Result<Vec<ArtifactId>, StoreError> {
        Ok(read_lock(&self.artifacts).keys().cloned().collect())
    }

    fn count(&self) -> usize {
        read_lock(&self.artifacts).len()
    }

    fn total_bytes(&self) -> u64 {
        read_lock(&self.artifacts)
            .values()
            .map(|(meta, _)| meta.size_bytes)
            .sum()
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use std::thread;

    fn meta_for(name: &str, payload: &[u8]) -> ArtifactMeta {
        ArtifactMeta::new(
            ArtifactId::mint(),
            name,
            payload.len() as u64,
            Utc::now(),
            Duration::seconds(3600),
        )
    }

    #[test]
    fn test_put_get_delete() {
        let store = MemoryStore::new();
        let meta = meta_for("a.txt", b"hello");
        let id = meta.id.clone();

        store.put(meta, b"hello").unwrap();
        let artifact = store.get(&id).unwrap().unwrap();
        assert_eq!(artifact.payload, Payload::Inline(Bytes::from_static(b"hello")));
        assert_eq!(store.count(), 1);
        assert_eq!(store.total_bytes(), 5);

        assert!(store.delete(&id).unwrap());
        assert!(!store.delete(&id).unwrap());
        assert!(store.get(&id).unwrap().is_none());
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_collision() {
        let store = MemoryStore::new();
        let meta = meta_for("a.txt", b"one");
        store.put(meta.clone(), b"one").unwrap();
        assert!(matches!(store.put(meta, b"one"), Err(StoreError::Collision(_))));
    }

    #[test]
    fn test_concurrent_puts() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..100)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let payload = vec![i as u8; i + 1];
                    let meta = meta_for("x.bin", &payload);
                    let id = meta.id.clone();
                    store.put(meta, &payload).unwrap();
                    (id, payload)
                })
            })
            .collect();

        for handle in handles {
            let (id, payload) = handle.join().unwrap();
            let artifact = store.get(&id).unwrap().unwrap();
            assert_eq!(artifact.payload.read_all().unwrap(), payload);
        }
        assert_eq!(store.count(), 100);
        assert_eq!(store.list_ids().unwrap().len(), 100);
    }
}
