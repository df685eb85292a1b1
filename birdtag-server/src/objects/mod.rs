//! Object storage for uploads, probes and thumbnails.
//!
//! Keys follow the layout in [`birdtag_core::keys`]. Two backends exist: a
//! directory on the local filesystem (`OBJECT_STORE_DIR`) and an in-memory map
//! for tests and development.

mod fs;
mod presign;

pub use fs::FsObjectStore;
pub use presign::{PresignError, Presigner};

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

/// Object storage errors
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Object I/O error: {0}")]
    Io(String),
}

/// Key-addressed blob storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), ObjectError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectError>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> Result<(), ObjectError>;

    /// Identifier used in logs and health output.
    fn name(&self) -> &'static str;
}

/// Reject keys that could escape the store root or are empty.
pub(crate) fn check_key(key: &str) -> Result<(), ObjectError> {
    if key.is_empty() || key.starts_with('/') {
        return Err(ObjectError::InvalidKey(key.to_string()));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(ObjectError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// In-memory object store
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, Vec<u8>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), ObjectError> {
        check_key(key)?;
        self.objects.insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectError> {
        self.objects
            .get(key)
            .map(|data| data.clone())
            .ok_or_else(|| ObjectError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectError> {
        self.objects.remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Filesystem store if `dir` is set, otherwise memory.
pub async fn open(dir: Option<&str>) -> Result<Arc<dyn ObjectStore>, ObjectError> {
    match dir {
        Some(dir) if !dir.is_empty() => {
            tracing::info!(dir = dir, "Using filesystem object store");
            Ok(Arc::new(FsObjectStore::open(dir).await?))
        }
        _ => {
            tracing::warn!("OBJECT_STORE_DIR not set, using in-memory object store - objects will be lost on restart!");
            Ok(Arc::new(MemoryObjectStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_key() {
        assert!(check_key("users/u1/raw/a.jpg").is_ok());
        assert!(check_key("").is_err());
        assert!(check_key("/etc/passwd").is_err());
        assert!(check_key("users/../../etc").is_err());
        assert!(check_key("users//raw").is_err());
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryObjectStore::new();
        store.put("tmp/u1/j1.jpg", b"probe".to_vec()).await.unwrap();
        assert_eq!(store.get("tmp/u1/j1.jpg").await.unwrap(), b"probe");

        store.delete("tmp/u1/j1.jpg").await.unwrap();
        assert!(matches!(
            store.get("tmp/u1/j1.jpg").await,
            Err(ObjectError::NotFound(_))
        ));
        // Deleting again is fine
        assert!(store.delete("tmp/u1/j1.jpg").await.is_ok());
    }
}
