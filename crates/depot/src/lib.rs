//! Short-lived artifact storage for qrdrop.
//!
//! An uploaded file becomes an *artifact*: a random [`ArtifactId`], an
//! [`ArtifactMeta`] record (name, size, creation and expiry time) and a
//! payload. Stores know nothing about expiry policy; they keep whatever they
//! are given until it is deleted.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use chrono::{Duration, Utc};
//! use depot::{ArtifactId, ArtifactMeta, ArtifactStore, FileStore};
//!
//! let store = FileStore::at_path("/var/lib/qrdrop").unwrap();
//!
//! let payload = b"Hello, World!";
//! let meta = ArtifactMeta::new(
//!     ArtifactId::mint(),
//!     depot::sanitize_filename("hello.txt"),
//!     payload.len() as u64,
//!     Utc::now(),
//!     Duration::hours(1),
//! );
//! let id = meta.id.clone();
//! store.put(meta, payload).unwrap();
//!
//! if let Some(artifact) = store.get(&id).unwrap() {
//!     println!("{} expires at {}", artifact.meta.original_name, artifact.meta.expires_at);
//! }
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod id;
pub mod memory;
pub mod sanitize;
pub mod store;

pub use artifact::{guess_mime_type, Artifact, ArtifactMeta, Payload};
pub use config::DepotConfig;
pub use error::StoreError;
pub use id::{ArtifactId, IdError, ID_LEN};
pub use memory::MemoryStore;
pub use sanitize::sanitize_filename;
pub use store::{ArtifactStore, FileStore};
