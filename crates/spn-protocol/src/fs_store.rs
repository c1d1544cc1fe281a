//! Piece store backed by a directory, one file per piece.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use spn_core::SpError;

use crate::collaborator::PieceStore;

/// Writes each piece to `<root>/<piece key>`.
///
/// Each write goes to its own temporary file in the same directory and is
/// renamed into place, so a reader never observes a partially written piece
/// and concurrent writers of one key never share a temporary path.
#[derive(Debug, Clone)]
pub struct FsPieceStore {
    root: PathBuf,
}

impl FsPieceStore {
    /// Use `root` as the piece directory, creating it if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, SpError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, SpError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(SpError::Validation(format!("invalid piece key {key:?}")));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl PieceStore for FsPieceStore {
    async fn put_piece(&self, key: &str, data: Vec<u8>) -> Result<(), SpError> {
        let path = self.path_for(key)?;
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || -> Result<(), SpError> {
            let mut tmp = tempfile::Builder::new()
                .prefix(".partial-")
                .tempfile_in(&root)?;
            tmp.write_all(&data)?;
            tmp.as_file().sync_data()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| SpError::Internal(format!("piece write task failed: {e}")))?
    }

    async fn get_piece(&self, key: &str) -> Result<Vec<u8>, SpError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SpError::NotFound(format!("piece {key}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_piece(&self, key: &str) -> Result<(), SpError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spn_core::ErrorKind;

    #[tokio::test]
    async fn round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPieceStore::open(dir.path().join("pieces")).await.unwrap();
        store.put_piece("7_s0_p1", vec![1, 2, 3]).await.unwrap();
        assert_eq!(store.get_piece("7_s0_p1").await.unwrap(), vec![1, 2, 3]);
        assert!(store.root().join("7_s0_p1").exists());
        assert_eq!(std::fs::read_dir(store.root()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn concurrent_writes_to_one_key_both_land() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPieceStore::open(dir.path()).await.unwrap();
        let writers: Vec<_> = (0u8..8)
            .map(|b| {
                let store = store.clone();
                tokio::spawn(async move { store.put_piece("7_s0_p1", vec![b; 4096]).await })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let data = store.get_piece("7_s0_p1").await.unwrap();
        assert_eq!(data.len(), 4096);
        assert!(data.iter().all(|b| *b == data[0]));
        assert_eq!(std::fs::read_dir(store.root()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn overwrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPieceStore::open(dir.path()).await.unwrap();
        store.put_piece("1_s0", vec![1; 10]).await.unwrap();
        store.put_piece("1_s0", vec![2; 3]).await.unwrap();
        assert_eq!(store.get_piece("1_s0").await.unwrap(), vec![2; 3]);
    }

    #[tokio::test]
    async fn missing_piece_is_not_found_and_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPieceStore::open(dir.path()).await.unwrap();
        let err = store.get_piece("9_s9").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        store.delete_piece("9_s9").await.unwrap();
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPieceStore::open(dir.path()).await.unwrap();
        let err = store.put_piece("../escape", vec![0]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
        assert!(store.get_piece("").await.is_err());
    }
}
