//! Artifact byte storage.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

use crate::types::StorageRef;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("no bytes stored at {0}")]
    NotFound(StorageRef),
    #[error("byte store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where artifact bytes live. Only `get` is on the processing path.
#[async_trait]
pub trait ByteStore: Send + Sync {
    async fn put(&self, reference: &StorageRef, bytes: &[u8]) -> Result<(), BlobError>;

    async fn get(&self, reference: &StorageRef) -> Result<Vec<u8>, BlobError>;
}

/// One file per artifact under a root directory.
pub struct FsByteStore {
    root: PathBuf,
}

impl FsByteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, reference: &StorageRef) -> PathBuf {
        // references are generated ids; strip separators anyway
        let name: String = reference
            .as_str()
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.root.join(name)
    }
}

#[async_trait]
impl ByteStore for FsByteStore {
    async fn put(&self, reference: &StorageRef, bytes: &[u8]) -> Result<(), BlobError> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.path_for(reference), bytes).await?;
        Ok(())
    }

    async fn get(&self, reference: &StorageRef) -> Result<Vec<u8>, BlobError> {
        match tokio::fs::read(self.path_for(reference)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(reference.clone()))
            }
            Err(e) => Err(BlobError::Io(e)),
        }
    }
}

#[derive(Default)]
pub struct InMemoryByteStore {
    blobs: RwLock<HashMap<StorageRef, Vec<u8>>>,
}

impl InMemoryByteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop stored bytes, simulating an expired or deleted upload.
    pub async fn remove(&self, reference: &StorageRef) -> bool {
        self.blobs.write().await.remove(reference).is_some()
    }
}

#[async_trait]
impl ByteStore for InMemoryByteStore {
    async fn put(&self, reference: &StorageRef, bytes: &[u8]) -> Result<(), BlobError> {
        self.blobs
            .write()
            .await
            .insert(reference.clone(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, reference: &StorageRef) -> Result<Vec<u8>, BlobError> {
        self.blobs
            .read()
            .await
            .get(reference)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(reference.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_store_round_trip_and_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsByteStore::new(dir.path().join("blobs"));
        let r = StorageRef::new("abc");
        store.put(&r, b"hello").await.unwrap();
        assert_eq!(store.get(&r).await.unwrap(), b"hello");

        let missing = store.get(&StorageRef::new("nope")).await;
        assert!(matches!(missing, Err(BlobError::NotFound(_))));
    }

    #[tokio::test]
    async fn memory_store_remove() {
        let store = InMemoryByteStore::new();
        let r = StorageRef::new("abc");
        store.put(&r, b"x").await.unwrap();
        assert!(store.remove(&r).await);
        assert!(matches!(store.get(&r).await, Err(BlobError::NotFound(_))));
    }
}
