//! File-backed storage: one JSON blob file per key under a root directory

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::StorageBackend;

/// Durable storage writing each key to `<root>/<key>.json`
///
/// Keys are the fixed constants from [`super::keys`], so no escaping is
/// applied to file names.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open storage rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|error| Error::Storage(format!("create {}: {error}", root.display())))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    fn map_io(path: &Path, error: std::io::Error) -> Error {
        Error::Storage(format!("{}: {error}", path.display()))
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(Self::map_io(&path, error)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        tokio::fs::write(&path, value)
            .await
            .map_err(|error| Self::map_io(&path, error))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(Self::map_io(&path, error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("data")).unwrap();

        assert_eq!(storage.get("farmseed_entries").await.unwrap(), None);

        storage.set("farmseed_entries", "[]").await.unwrap();
        assert_eq!(
            storage.get("farmseed_entries").await.unwrap().as_deref(),
            Some("[]")
        );

        storage.remove("farmseed_entries").await.unwrap();
        assert_eq!(storage.get("farmseed_entries").await.unwrap(), None);

        // Second remove is a no-op
        storage.remove("farmseed_entries").await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");

        {
            let storage = FileStorage::open(&root).unwrap();
            storage.set("farmseed_farm_id", "smith-farm").await.unwrap();
        }

        let reopened = FileStorage::open(&root).unwrap();
        assert_eq!(
            reopened.get("farmseed_farm_id").await.unwrap().as_deref(),
            Some("smith-farm")
        );
    }
}
