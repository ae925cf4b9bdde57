//! File-backed storage: one file per key under a root directory.
//!
//! Values are written to a temporary sibling and renamed over the target, so a
//! reader never observes a half-written value.

use async_trait::async_trait;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, error};

use crate::backend::{
    check_capacity, validate_key, DurableStorage, StorageEvent, EVENT_CHANNEL_CAPACITY,
};
use crate::error::{IoOperation, StorageError, StorageResult};

const VALUE_EXTENSION: &str = "json";

/// File-based implementation of [`DurableStorage`]
pub struct FileStorage {
    root: PathBuf,
    capacity: Option<u64>,
    events: broadcast::Sender<StorageEvent>,
    temp_counter: AtomicU64,
}

/// Keeps an installed file watcher alive; dropping it stops watching.
pub struct StorageWatcher {
    _watcher: RecommendedWatcher,
}

impl FileStorage {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.exists() {
            std::fs::create_dir_all(&root)
                .map_err(|e| StorageError::directory_creation_failed(root.clone(), e))?;
            debug!("Created storage directory: {}", root.display());
        }
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            root,
            capacity: None,
            events,
            temp_counter: AtomicU64::new(0),
        })
    }

    /// Enforce a capacity ceiling on subsequent writes
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Root directory of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", key, VALUE_EXTENSION))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(format!(".{}.{}.{}.tmp", key, std::process::id(), n))
    }

    /// Map a path inside the root back to its key
    fn path_key(path: &Path) -> Option<String> {
        if path.extension().and_then(|e| e.to_str()) != Some(VALUE_EXTENSION) {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        validate_key(stem).ok()?;
        Some(stem.to_string())
    }

    async fn sizes(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut sizes = Vec::new();
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|e| StorageError::io_error(self.root.clone(), IoOperation::Read, e))?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StorageError::io_error(self.root.clone(), IoOperation::Read, e))?
        {
            let path = entry.path();
            let Some(key) = Self::path_key(&path) else {
                continue;
            };
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| StorageError::io_error(path.clone(), IoOperation::Read, e))?;
            if metadata.is_file() {
                sizes.push((key, metadata.len()));
            }
        }
        sizes.sort();
        Ok(sizes)
    }

    /// Install a watcher that turns external modifications of stored files
    /// into [`StorageEvent`]s on this store's channel.
    pub fn watch(&self) -> StorageResult<StorageWatcher> {
        let tx = self.events.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    let removed = matches!(event.kind, EventKind::Remove(_));
                    let changed = removed
                        || matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_));
                    if !changed {
                        return;
                    }
                    for path in &event.paths {
                        if let Some(key) = FileStorage::path_key(path) {
                            let event = if removed {
                                StorageEvent::removed(key)
                            } else {
                                StorageEvent::updated(key)
                            };
                            let _ = tx.send(event);
                        }
                    }
                }
                Err(e) => {
                    error!("Storage watch error: {}", e);
                }
            },
            notify::Config::default(),
        )?;
        watcher.watch(&self.root, RecursiveMode::NonRecursive)?;
        debug!("Watching storage directory: {}", self.root.display());
        Ok(StorageWatcher { _watcher: watcher })
    }
}

#[async_trait]
impl DurableStorage for FileStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        validate_key(key)?;
        let path = self.key_path(key);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io_error(path, IoOperation::Read, e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        validate_key(key)?;

        if self.capacity.is_some() {
            let sizes = self.sizes().await?;
            let total: u64 = sizes.iter().map(|(k, len)| k.len() as u64 + len).sum();
            let replaced = sizes
                .iter()
                .find(|(k, _)| k == key)
                .map(|(k, len)| k.len() as u64 + len)
                .unwrap_or(0);
            check_capacity(key, value, total, replaced, self.capacity)?;
        }

        let path = self.key_path(key);
        let temp_path = self.temp_path(key);
        fs::write(&temp_path, value)
            .await
            .map_err(|e| StorageError::io_error(temp_path.clone(), IoOperation::Write, e))?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::io_error(path, IoOperation::Move, e));
        }

        debug!(key = key, bytes = value.len(), "Stored value");
        let _ = self.events.send(StorageEvent::updated(key));
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let path = self.key_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => {
                let _ = self.events.send(StorageEvent::removed(key));
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io_error(path, IoOperation::Delete, e)),
        }
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.sizes().await?.into_iter().map(|(k, _)| k).collect())
    }

    async fn entries(&self) -> StorageResult<Vec<(String, String)>> {
        let mut entries = Vec::new();
        for key in self.keys().await? {
            // A key may vanish between listing and reading
            if let Some(value) = self.get(&key).await? {
                entries.push((key, value));
            }
        }
        Ok(entries)
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }

    fn capacity(&self) -> Option<u64> {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::total_size;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_read_remove() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let storage = FileStorage::open(temp_dir.path()).expect("Failed to open storage");

        storage.set("asset-manifest", "{\"a\":1}").await.unwrap();
        assert_eq!(
            storage.get("asset-manifest").await.unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        assert!(temp_dir.path().join("asset-manifest.json").exists());

        storage.remove("asset-manifest").await.unwrap();
        assert_eq!(storage.get("asset-manifest").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let storage = FileStorage::open(temp_dir.path()).unwrap();

        storage.set("k", "one").await.unwrap();
        storage.set("k", "two").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["k.json".to_string()]);
    }

    #[tokio::test]
    async fn test_capacity_enforced() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let storage = FileStorage::open(temp_dir.path()).unwrap().with_capacity(16);

        storage.set("k", "0123456789").await.unwrap();
        // Replacing with a value of equal size still fits
        storage.set("k", "9876543210").await.unwrap();

        let err = storage.set("other", "0123456789").await.unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(storage.keys().await.unwrap(), vec!["k".to_string()]);
    }

    #[tokio::test]
    async fn test_unrelated_files_ignored() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(temp_dir.path().join("notes.txt"), "hello").unwrap();
        let storage = FileStorage::open(temp_dir.path()).unwrap();
        storage.set("section-image-map", "{}").await.unwrap();

        let entries = storage.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(total_size(&entries), ("section-image-map".len() + 2) as u64);
    }

    #[test]
    fn test_path_key() {
        assert_eq!(
            FileStorage::path_key(Path::new("/x/asset-manifest.json")),
            Some("asset-manifest".to_string())
        );
        assert_eq!(FileStorage::path_key(Path::new("/x/.k.1.0.tmp")), None);
        assert_eq!(FileStorage::path_key(Path::new("/x/notes.txt")), None);
    }
}
