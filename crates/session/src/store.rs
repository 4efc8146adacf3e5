//! Persisted reading position.
//!
//! A tiny key/value store. The session only ever uses [`CFI_KEY`]: it is
//! read when a view mounts and written on every pagination change.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

/// Key under which the last reading position is kept.
pub const CFI_KEY: &str = "cfi";

pub type StoreHandle = Arc<dyn PositionStore>;

#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, String>>,
}

#[async_trait]
impl PositionStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A JSON object on disk, rewritten in full on every `set`.
///
/// Writes go to a sibling temporary file that is then renamed over the store,
/// so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}
impl FileStore {
    /// Open (or lazily create) the store at `path`. A missing file is an
    /// empty store; an unreadable or malformed one is an error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .or_raise(|| ErrorKind::Store(format!("malformed store: {}", path.display())))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => exn::bail!(ErrorKind::Store(format!("{}: {e}", path.display()))),
        };
        tracing::debug!(path = %path.display(), "Opened position store");
        Ok(Self { path, values: RwLock::new(values) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let io_error = |e: io::Error| exn::Exn::from(ErrorKind::Store(format!("{}: {e}", self.path.display())));
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let bytes = serde_json::to_vec_pretty(values)
            .or_raise(|| ErrorKind::Store("failed to serialize positions".to_string()))?;
        let mut temporary = self.path.clone().into_os_string();
        temporary.push(".tmp");
        fs::write(&temporary, bytes).await.map_err(io_error)?;
        fs::rename(&temporary, &self.path).await.map_err(io_error)?;
        Ok(())
    }
}

#[async_trait]
impl PositionStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        // Held across the write so concurrent sets land on disk in order.
        let mut values = self.values.write().await;
        if values.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        // Memory is committed only after the write lands.
        let mut updated = values.clone();
        updated.insert(key.to_string(), value.to_string());
        self.persist(&updated).await?;
        *values = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::default();
        assert_eq!(store.get(CFI_KEY).await.unwrap(), None);
        store.set(CFI_KEY, "epubcfi(/6/2)").await.unwrap();
        assert_eq!(store.get(CFI_KEY).await.unwrap().as_deref(), Some("epubcfi(/6/2)"));
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/positions.json");
        let store = FileStore::open(&path).await.unwrap();
        assert_eq!(store.get(CFI_KEY).await.unwrap(), None);
        store.set(CFI_KEY, "epubcfi(/6/8)").await.unwrap();
        drop(store);

        let store = FileStore::open(&path).await.unwrap();
        assert_eq!(store.get(CFI_KEY).await.unwrap().as_deref(), Some("epubcfi(/6/8)"));
        assert!(!dir.path().join("nested/positions.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_retries_failed_write() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        let path = blocker.join("positions.json");
        let store = FileStore::open(&path).await.unwrap();
        // A plain file where the parent directory should be.
        std::fs::write(&blocker, b"").unwrap();

        let err = store.set(CFI_KEY, "epubcfi(/6/4)").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Store(_)));
        assert_eq!(store.get(CFI_KEY).await.unwrap(), None);

        std::fs::remove_file(&blocker).unwrap();
        store.set(CFI_KEY, "epubcfi(/6/4)").await.unwrap();
        drop(store);

        let store = FileStore::open(&path).await.unwrap();
        assert_eq!(store.get(CFI_KEY).await.unwrap().as_deref(), Some("epubcfi(/6/4)"));
    }

    #[tokio::test]
    async fn test_file_store_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("positions.json");
        std::fs::write(&path, b"not json").unwrap();
        let err = FileStore::open(&path).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Store(_)));
    }
}
