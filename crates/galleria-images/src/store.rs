//! Asset store: the manifest manager.
//!
//! The whole manifest is rewritten on every mutation with a single storage
//! write. Each store instance is one execution context: it caches the manifest
//! it last read or wrote and serialises its own mutations, while other
//! contexts on the same storage are only observed after a change notification.

use galleria_storage::{DurableStorage, StorageEvent};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ImageError, ImageResult, ValidationError};
use crate::manifest::{Manifest, MANIFEST_KEY};
use crate::models::{AssetMetadata, AssetRecord};

/// Persists asset records keyed by id.
pub struct AssetStore {
    storage: Arc<dyn DurableStorage>,
    cache: RwLock<Option<Arc<Manifest>>>,
    write_lock: Mutex<()>,
}

impl AssetStore {
    /// Create a store over `storage`. Nothing is read until first use.
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self {
        Self {
            storage,
            cache: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    /// Read and parse the manifest from durable storage, bypassing the cache.
    ///
    /// A missing key is an empty manifest. Unreadable or unparsable data is
    /// reported as an error so the caller can decide what to do with it.
    pub async fn read_manifest(&self) -> ImageResult<Manifest> {
        let Some(raw) = self.storage.get(MANIFEST_KEY).await? else {
            return Ok(Manifest::new());
        };
        let mut manifest = Manifest::parse(&raw)?;
        let dropped = manifest.discard_malformed();
        if !dropped.is_empty() {
            warn!(dropped = ?dropped, "Discarded malformed manifest entries");
        }
        Ok(manifest)
    }

    /// Reload from durable storage; corrupt or missing data yields an empty
    /// manifest.
    async fn load(&self) -> Arc<Manifest> {
        let manifest = match self.read_manifest().await {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!("Failed to load asset manifest, starting empty: {}", e);
                Manifest::new()
            }
        };
        debug!(records = manifest.len(), "Loaded asset manifest");
        let manifest = Arc::new(manifest);
        *self.cache.write() = Some(manifest.clone());
        manifest
    }

    /// Current manifest of this context.
    pub async fn manifest(&self) -> Arc<Manifest> {
        let cached = self.cache.read().clone();
        match cached {
            Some(manifest) => manifest,
            None => self.load().await,
        }
    }

    /// Discard the cached manifest and reconstruct it from durable storage.
    pub async fn reload(&self) -> Arc<Manifest> {
        self.invalidate();
        self.load().await
    }

    /// Drop the cached manifest; the next read reloads it.
    pub fn invalidate(&self) {
        *self.cache.write() = None;
    }

    /// React to a storage change notification. Returns whether the event
    /// concerned the manifest.
    pub fn handle_storage_event(&self, event: &StorageEvent) -> bool {
        if event.concerns(MANIFEST_KEY) {
            debug!("Asset manifest changed in storage, invalidating cache");
            self.invalidate();
            true
        } else {
            false
        }
    }

    /// Follow change notifications until the storage is dropped.
    pub fn spawn_change_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let mut events = self.storage.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        store.handle_storage_event(&event);
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        debug!(missed = missed, "Change listener lagged, invalidating");
                        store.invalidate();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn persist(&self, manifest: &Manifest) -> ImageResult<()> {
        let json = manifest.to_json()?;
        self.storage.set(MANIFEST_KEY, &json).await?;
        Ok(())
    }

    /// Register a new record. An id already in the manifest is refused.
    ///
    /// When the write fails because storage is full, the existing manifest is
    /// discarded and a manifest holding only the new record is written in its
    /// place. If even that does not fit, the quota error is returned and the
    /// durable manifest is left as it was.
    pub async fn ingest(&self, payload: String, metadata: AssetMetadata) -> ImageResult<AssetRecord> {
        if payload.is_empty() {
            return Err(ValidationError::MissingPayload.into());
        }

        let _guard = self.write_lock.lock().await;
        let mut manifest = Manifest::clone(&*self.manifest().await);
        if manifest.contains(&metadata.id) {
            return Err(ImageError::DuplicateId { id: metadata.id });
        }
        let record = AssetRecord::new(payload, metadata);
        manifest.insert(record.clone());

        match self.persist(&manifest).await {
            Ok(()) => {}
            Err(ImageError::QuotaExceeded(e)) => {
                warn!(
                    id = %record.id,
                    discarded = manifest.len() - 1,
                    "Storage full ({}), replacing manifest with the new record only",
                    e
                );
                manifest = std::iter::once(record.clone()).collect();
                self.persist(&manifest).await?;
            }
            Err(e) => return Err(e),
        }

        info!(id = %record.id, bytes = record.payload_len(), "Stored asset");
        *self.cache.write() = Some(Arc::new(manifest));
        Ok(record)
    }

    /// Look up a record by id.
    pub async fn get(&self, id: &str) -> Option<AssetRecord> {
        self.manifest().await.get(id).cloned()
    }

    /// All records, ordered by id.
    pub async fn list(&self) -> Vec<AssetRecord> {
        self.manifest().await.records().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.manifest().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.manifest().await.is_empty()
    }

    /// Delete a record. Returns the removed record, if any.
    pub async fn remove(&self, id: &str) -> ImageResult<Option<AssetRecord>> {
        let _guard = self.write_lock.lock().await;
        let mut manifest = Manifest::clone(&*self.manifest().await);
        let Some(removed) = manifest.remove(id) else {
            return Ok(None);
        };
        self.persist(&manifest).await?;
        info!(id = id, "Removed asset");
        *self.cache.write() = Some(Arc::new(manifest));
        Ok(Some(removed))
    }

    /// Keep only records matching `keep`, persisting only when something was
    /// removed. Returns the removed records.
    pub async fn retain<F>(&self, keep: F) -> ImageResult<Vec<AssetRecord>>
    where
        F: FnMut(&AssetRecord) -> bool,
    {
        let _guard = self.write_lock.lock().await;
        let mut manifest = Manifest::clone(&*self.manifest().await);
        let removed = manifest.retain(keep);
        if !removed.is_empty() {
            self.persist(&manifest).await?;
            *self.cache.write() = Some(Arc::new(manifest));
        }
        Ok(removed)
    }
}
