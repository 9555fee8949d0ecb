//! The file store: a content-addressable key -> bytes mapping shared by the
//! coordinator and workers. Exactly two operations, per the design notes —
//! `put_atomic` and `get` — so a cloud object store could stand in for
//! `LocalFileStore` without touching any coordinator or worker logic.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::error::StoreError;

/// A key-value store with atomic (write-temp, rename-into-place) publish
/// semantics. Keys are slash-delimited strings (`inputs/0`, `inter/0/1`,
/// `out/1`).
#[async_trait]
pub trait FileStore: Send + Sync + 'static {
    /// Write `bytes` under `key`, visible to `get` only once this returns
    /// `Ok`. Implementations must make the publish atomic (no reader ever
    /// observes a partially-written value).
    async fn put_atomic(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Read the bytes currently visible under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;
}

/// A [`FileStore`] backed by a local directory, using write-to-temp then
/// `rename` for atomicity (rename is atomic within the same filesystem on
/// every platform this crate targets).
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.tmp-{}", std::process::id()))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn put_atomic(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let final_path = self.path_for(key);
        let temp_path = self.temp_path_for(key);
        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| io_err(key, source))?;
        }
        {
            let mut file = tokio::fs::File::create(&temp_path)
                .await
                .map_err(|source| io_err(key, source))?;
            file.write_all(&bytes)
                .await
                .map_err(|source| io_err(key, source))?;
            file.flush().await.map_err(|source| io_err(key, source))?;
        }
        tokio::fs::rename(&temp_path, &final_path)
            .await
            .map_err(|source| io_err(key, source))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key);
        tokio::fs::read(&path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(key.to_string())
            } else {
                io_err(key, source)
            }
        })
    }
}

fn io_err(key: &str, source: std::io::Error) -> StoreError {
    StoreError::Io {
        key: key.to_string(),
        source,
    }
}

/// Seeds `inputs/<i>` entries for each configured input file already present
/// on disk at `path`, so a coordinator can be pointed at pre-existing shard
/// files without copying them into the store's key space.
pub async fn seed_input(store: &LocalFileStore, index: u32, source_path: &Path) -> Result<(), StoreError> {
    let bytes = tokio::fs::read(source_path)
        .await
        .map_err(|source| io_err(&source_path.display().to_string(), source))?;
    store.put_atomic(&format!("inputs/{index}"), bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        store.put_atomic("out/0", b"hello".to_vec()).await.unwrap();
        assert_eq!(store.get("out/0").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        let err = store.get("out/0").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn overwriting_a_key_publishes_the_latest_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        store.put_atomic("inter/0/0", b"first".to_vec()).await.unwrap();
        store.put_atomic("inter/0/0", b"second".to_vec()).await.unwrap();
        assert_eq!(store.get("inter/0/0").await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn nested_keys_create_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        store.put_atomic("inter/3/7", b"x".to_vec()).await.unwrap();
        assert_eq!(store.get("inter/3/7").await.unwrap(), b"x");
    }
}
