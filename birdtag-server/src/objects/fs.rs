//! Filesystem-backed object store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{check_key, ObjectError, ObjectStore};

/// Objects stored as files under a root directory, one file per key.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open (and create if needed) the store root.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, ObjectError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| ObjectError::Io(format!("{}: {e}", root.display())))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ObjectError> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), ObjectError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ObjectError::Io(e.to_string()))?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| ObjectError::Io(e.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectError> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ObjectError::NotFound(key.to_string()),
            _ => ObjectError::Io(e.to_string()),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ObjectError::Io(e.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_store_nested_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(dir.path()).await.unwrap();

        store
            .put("users/u1/raw/a.wav", b"audio".to_vec())
            .await
            .unwrap();
        assert!(dir.path().join("users/u1/raw/a.wav").exists());
        assert_eq!(store.get("users/u1/raw/a.wav").await.unwrap(), b"audio");

        store.delete("users/u1/raw/a.wav").await.unwrap();
        assert!(matches!(
            store.get("users/u1/raw/a.wav").await,
            Err(ObjectError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fs_store_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(dir.path()).await.unwrap();
        assert!(matches!(
            store.put("../escape", Vec::new()).await,
            Err(ObjectError::InvalidKey(_))
        ));
    }
}
