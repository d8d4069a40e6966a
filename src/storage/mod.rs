//! Write-once photo storage on the local filesystem
//!
//! Photo bytes live under a single root directory, one file per photo id.
//! Metadata (slot, MIME type, content hash) is kept in the database.

use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum PhotoStoreError {
    #[error("Photo '{0}' already exists")]
    AlreadyExists(String),

    #[error("Photo '{0}' not found")]
    NotFound(String),

    #[error("Invalid photo path for '{0}'")]
    InvalidPath(String),

    #[error("Photo storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct PhotoStore {
    root: PathBuf,
}

impl PhotoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it does not exist yet
    pub async fn ensure_root(&self) -> Result<(), PhotoStoreError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, PhotoStoreError> {
        let path = self.root.join(id);
        // Ids are validated upstream; refuse anything that would leave the root anyway
        if id.is_empty()
            || id.contains(['/', '\\'])
            || id.starts_with('.')
            || path.parent() != Some(self.root.as_path())
        {
            return Err(PhotoStoreError::InvalidPath(id.to_string()));
        }
        Ok(path)
    }

    /// Write photo bytes. Fails if a file already exists for `id`.
    pub async fn write(&self, id: &str, data: &[u8]) -> Result<(), PhotoStoreError> {
        let path = self.path_for(id)?;

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(PhotoStoreError::AlreadyExists(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = write_all_synced(&mut file, data).await {
            drop(file);
            if let Err(cleanup_err) = fs::remove_file(&path).await {
                tracing::warn!(
                    "Failed to clean up partial photo {:?}: {}",
                    path,
                    cleanup_err
                );
            }
            return Err(e.into());
        }

        Ok(())
    }

    pub async fn read(&self, id: &str) -> Result<Vec<u8>, PhotoStoreError> {
        let path = self.path_for(id)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(PhotoStoreError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_all_synced(file: &mut fs::File, data: &[u8]) -> std::io::Result<()> {
    file.write_all(data).await?;
    file.sync_all().await
}

/// Hex-encoded SHA-256 of photo bytes
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;
    use uuid::Uuid;

    fn temp_store() -> PhotoStore {
        let root = std::env::temp_dir().join(format!("civic-lens-photos-{}", Uuid::new_v4()));
        let store = PhotoStore::new(root);
        block_on(store.ensure_root()).unwrap();
        store
    }

    #[test]
    fn test_write_then_read() {
        let store = temp_store();
        block_on(store.write("before_1", b"jpeg-bytes")).unwrap();
        assert_eq!(block_on(store.read("before_1")).unwrap(), b"jpeg-bytes");
        std::fs::remove_dir_all(store.root()).ok();
    }

    #[test]
    fn test_photos_are_write_once() {
        let store = temp_store();
        block_on(store.write("before_1", b"first")).unwrap();
        let second = block_on(store.write("before_1", b"second"));
        assert!(matches!(second, Err(PhotoStoreError::AlreadyExists(_))));
        assert_eq!(block_on(store.read("before_1")).unwrap(), b"first");
        std::fs::remove_dir_all(store.root()).ok();
    }

    #[test]
    fn test_missing_photo() {
        let store = temp_store();
        assert!(matches!(
            block_on(store.read("nope")),
            Err(PhotoStoreError::NotFound(_))
        ));
        std::fs::remove_dir_all(store.root()).ok();
    }

    #[test]
    fn test_rejects_path_escapes() {
        let store = PhotoStore::new("/tmp/civic-lens-unused");
        for id in ["../secret", "a/b", "..", ".hidden", ""] {
            assert!(matches!(
                block_on(store.read(id)),
                Err(PhotoStoreError::InvalidPath(_))
            ));
        }
    }

    #[test]
    fn test_content_hash() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
