//! Readiness storage
//!
//! Structured records go through `PersistenceLayer` (sled or in-memory);
//! raw artifact bytes go through `ByteStore`.

pub mod blobs;
pub mod persistence;
mod sled_dal;

pub use blobs::{BlobError, ByteStore, FsByteStore, InMemoryByteStore};
pub use persistence::{InMemoryDAL, PersistenceError, PersistenceLayer};
pub use sled_dal::SledDAL;

use std::sync::Arc;

use crate::config::StorageConfig;

/// Structured store and byte store for a configured backend.
pub fn open_backend(
    config: &StorageConfig,
) -> Result<(Arc<dyn PersistenceLayer>, Arc<dyn ByteStore>), PersistenceError> {
    match config.backend.as_str() {
        "memory" => Ok((Arc::new(InMemoryDAL::new()), Arc::new(InMemoryByteStore::new()))),
        "sled" => {
            let store = SledDAL::open(config.db_path())?;
            Ok((Arc::new(store), Arc::new(FsByteStore::new(config.blob_dir()))))
        }
        other => Err(PersistenceError::Storage(format!(
            "unknown storage backend '{other}'"
        ))),
    }
}
