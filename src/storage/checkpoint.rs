// src/storage/checkpoint.rs

//! JSON file checkpoint.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::Checkpoint;
use crate::storage::CheckpointStore;

/// Checkpoint kept in a single JSON file, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> Result<Option<Checkpoint>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Io(e)),
        };
        let checkpoint: Checkpoint = serde_json::from_slice(&bytes)?;
        Ok(Some(Checkpoint::new(checkpoint.page, checkpoint.row_index)))
    }

    /// Write to a temp file, then rename over the checkpoint.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec(checkpoint)?;
        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(tmp.path().join("checkpoint.json"));
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_load_clear() {
        let tmp = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(tmp.path().join("state/checkpoint.json"));

        store.save(&Checkpoint::new(3, 7)).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(Checkpoint::new(3, 7)));

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, r#"{"page":3,"row_index":7}"#);

        store.save(&Checkpoint::new(4, 0)).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(Checkpoint::new(4, 0)));
        assert!(!store.path().with_extension("tmp").exists());

        store.clear().await.unwrap();
        assert!(!store.path().exists());
        // clearing twice is fine
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("checkpoint.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = FileCheckpointStore::new(path);
        assert!(matches!(store.load().await, Err(AppError::Json(_))));
    }

    #[tokio::test]
    async fn test_zero_page_is_clamped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("checkpoint.json");
        std::fs::write(&path, r#"{"page":0,"row_index":2}"#).unwrap();

        let store = FileCheckpointStore::new(path);
        assert_eq!(store.load().await.unwrap(), Some(Checkpoint::new(1, 2)));
    }
}
