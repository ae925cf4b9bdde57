//! In-memory storage backend.
//!
//! Several contexts can share one instance through `Arc`, which makes it the
//! stand-in for a browser's storage area in tests and embedded use.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tokio::sync::broadcast;
use tracing::debug;

use crate::backend::{
    check_capacity, entry_size, validate_key, DurableStorage, StorageEvent,
    EVENT_CHANNEL_CAPACITY,
};
use crate::error::StorageResult;

/// Thread-safe in-memory implementation of [`DurableStorage`]
#[derive(Debug)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, String>>,
    capacity: Option<u64>,
    events: broadcast::Sender<StorageEvent>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Create an unbounded store
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            entries: RwLock::new(BTreeMap::new()),
            capacity: None,
            events,
        }
    }

    /// Create a store that rejects writes beyond `capacity` bytes
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new()
        }
    }

    /// Write a raw value without capacity checks or notifications (for tests
    /// that need to plant corrupt data)
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.write().insert(key.into(), value.into());
    }

    /// Current aggregate size in bytes
    pub fn used_bytes(&self) -> u64 {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| entry_size(k, v))
            .sum()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn notify(&self, event: StorageEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl DurableStorage for MemoryStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        validate_key(key)?;
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        validate_key(key)?;
        {
            let mut entries = self.entries.write();
            let total: u64 = entries.iter().map(|(k, v)| entry_size(k, v)).sum();
            let replaced = entries.get(key).map(|v| entry_size(key, v)).unwrap_or(0);
            check_capacity(key, value, total, replaced, self.capacity)?;
            entries.insert(key.to_string(), value.to_string());
        }
        debug!(key = key, bytes = value.len(), "Stored value");
        self.notify(StorageEvent::updated(key));
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let existed = self.entries.write().remove(key).is_some();
        if existed {
            self.notify(StorageEvent::removed(key));
        }
        Ok(())
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    async fn entries(&self) -> StorageResult<Vec<(String, String)>> {
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }

    fn capacity(&self) -> Option<u64> {
        self.capacity
    }
}
