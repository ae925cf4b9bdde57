//! Section index: section id to ordered image references.
//!
//! All sections share a single durable blob under [`SECTION_MAP_KEY`]. When a
//! write that targets one section runs out of capacity, the blob is replaced
//! by one holding only that section, which drops every other section at once.

use galleria_storage::{DurableStorage, StorageEvent};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ephemeral::SlotKey;
use crate::error::{ImageError, ImageResult};
use crate::models::ImageReference;

/// Durable key of the section map.
pub const SECTION_MAP_KEY: &str = "section-image-map";

/// Section id to references in display order.
pub type SectionMap = BTreeMap<String, Vec<ImageReference>>;

/// Entries dropped by [`SectionIndex::retain_entries`], per section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetainOutcome {
    pub removed: BTreeMap<String, Vec<ImageReference>>,
}

impl RetainOutcome {
    pub fn removed_count(&self) -> usize {
        self.removed.values().map(Vec::len).sum()
    }

    pub fn sections_affected(&self) -> usize {
        self.removed.len()
    }
}

pub struct SectionIndex {
    storage: Arc<dyn DurableStorage>,
    cache: RwLock<Option<Arc<SectionMap>>>,
    write_lock: Mutex<()>,
}

fn not_found(slot: &SlotKey) -> ImageError {
    ImageError::EntryNotFound {
        section: slot.section.clone(),
        index: slot.index,
    }
}

impl SectionIndex {
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self {
        Self {
            storage,
            cache: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    /// Read and parse the section map, bypassing the cache.
    pub async fn read_map(&self) -> ImageResult<SectionMap> {
        match self.storage.get(SECTION_MAP_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(SectionMap::new()),
        }
    }

    async fn load(&self) -> Arc<SectionMap> {
        let map = match self.read_map().await {
            Ok(map) => map,
            Err(e) => {
                warn!("Failed to load section map, starting empty: {}", e);
                SectionMap::new()
            }
        };
        debug!(sections = map.len(), "Loaded section map");
        let map = Arc::new(map);
        *self.cache.write() = Some(map.clone());
        map
    }

    /// Current section map of this context.
    pub async fn map(&self) -> Arc<SectionMap> {
        let cached = self.cache.read().clone();
        match cached {
            Some(map) => map,
            None => self.load().await,
        }
    }

    pub async fn reload(&self) -> Arc<SectionMap> {
        self.invalidate();
        self.load().await
    }

    pub fn invalidate(&self) {
        *self.cache.write() = None;
    }

    /// React to a storage change notification. Returns whether the event
    /// concerned the section map.
    pub fn handle_storage_event(&self, event: &StorageEvent) -> bool {
        if event.concerns(SECTION_MAP_KEY) {
            debug!("Section map changed in storage, invalidating cache");
            self.invalidate();
            true
        } else {
            false
        }
    }

    /// Follow change notifications until the storage is dropped.
    pub fn spawn_change_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let index = Arc::clone(self);
        let mut events = self.storage.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        index.handle_storage_event(&event);
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => index.invalidate(),
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Persist `map` and make it the cached state.
    ///
    /// If storage is full and the write targets `focus`, a map holding only
    /// that section is written instead. When nothing can be written the error
    /// is returned and the cache keeps the previous state.
    async fn commit(&self, map: SectionMap, focus: Option<&str>) -> ImageResult<()> {
        let json = serde_json::to_string(&map)?;
        let map = match self.storage.set(SECTION_MAP_KEY, &json).await.map_err(ImageError::from) {
            Ok(()) => map,
            Err(ImageError::QuotaExceeded(e)) => {
                let Some(section) = focus else {
                    return Err(ImageError::QuotaExceeded(e));
                };
                let kept: SectionMap = map
                    .get(section)
                    .map(|entries| (section.to_string(), entries.clone()))
                    .into_iter()
                    .collect();
                warn!(
                    section = section,
                    discarded = map.len().saturating_sub(kept.len()),
                    "Storage full ({}), replacing section map with the written section only",
                    e
                );
                let json = serde_json::to_string(&kept)?;
                self.storage.set(SECTION_MAP_KEY, &json).await?;
                kept
            }
            Err(e) => return Err(e),
        };
        *self.cache.write() = Some(Arc::new(map));
        Ok(())
    }

    /// Known section ids, sorted.
    pub async fn sections(&self) -> Vec<String> {
        self.map().await.keys().cloned().collect()
    }

    /// Raw references of `section`; empty when the section is unknown.
    pub async fn entries(&self, section: &str) -> Vec<ImageReference> {
        self.map().await.get(section).cloned().unwrap_or_default()
    }

    /// References of `section` ready for rendering: anything that cannot be
    /// displayed is shown as the placeholder.
    pub async fn display_entries(&self, section: &str) -> Vec<ImageReference> {
        self.map()
            .await
            .get(section)
            .map(|entries| entries.iter().map(ImageReference::for_display).collect())
            .unwrap_or_default()
    }

    /// Replace the whole list of `section`.
    pub async fn set_entries(&self, section: &str, entries: Vec<ImageReference>) -> ImageResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut map = SectionMap::clone(&*self.map().await);
        map.insert(section.to_string(), entries);
        self.commit(map, Some(section)).await
    }

    /// Append to `section`, creating it if needed. Returns the new slot.
    pub async fn push_entry(&self, section: &str, reference: ImageReference) -> ImageResult<SlotKey> {
        let _guard = self.write_lock.lock().await;
        let mut map = SectionMap::clone(&*self.map().await);
        let entries = map.entry(section.to_string()).or_default();
        entries.push(reference);
        let slot = SlotKey::new(section, entries.len() - 1);
        self.commit(map, Some(section)).await?;
        Ok(slot)
    }

    /// Overwrite an existing entry, returning the previous one.
    pub async fn replace_entry(&self, slot: &SlotKey, reference: ImageReference) -> ImageResult<ImageReference> {
        let _guard = self.write_lock.lock().await;
        let mut map = SectionMap::clone(&*self.map().await);
        let entry = map
            .get_mut(&slot.section)
            .and_then(|entries| entries.get_mut(slot.index))
            .ok_or_else(|| not_found(slot))?;
        let previous = std::mem::replace(entry, reference);
        self.commit(map, Some(slot.section.as_str())).await?;
        Ok(previous)
    }

    /// Remove one entry; later entries shift down by one.
    pub async fn remove_entry(&self, slot: &SlotKey) -> ImageResult<ImageReference> {
        let _guard = self.write_lock.lock().await;
        let mut map = SectionMap::clone(&*self.map().await);
        let entries = map
            .get_mut(&slot.section)
            .filter(|entries| slot.index < entries.len())
            .ok_or_else(|| not_found(slot))?;
        let removed = entries.remove(slot.index);
        self.commit(map, Some(slot.section.as_str())).await?;
        Ok(removed)
    }

    /// Drop a whole section.
    pub async fn remove_section(&self, section: &str) -> ImageResult<Option<Vec<ImageReference>>> {
        let _guard = self.write_lock.lock().await;
        let mut map = SectionMap::clone(&*self.map().await);
        let Some(removed) = map.remove(section) else {
            return Ok(None);
        };
        self.commit(map, None).await?;
        info!(section = section, entries = removed.len(), "Removed section");
        Ok(Some(removed))
    }

    /// Keep only entries matching `keep`, persisting only when something was
    /// dropped.
    pub async fn retain_entries<F>(&self, mut keep: F) -> ImageResult<RetainOutcome>
    where
        F: FnMut(&str, &ImageReference) -> bool,
    {
        let _guard = self.write_lock.lock().await;
        let mut map = SectionMap::clone(&*self.map().await);
        let mut outcome = RetainOutcome::default();

        for (section, entries) in map.iter_mut() {
            let (kept, dropped): (Vec<_>, Vec<_>) = std::mem::take(entries)
                .into_iter()
                .partition(|reference| keep(section, reference));
            *entries = kept;
            if !dropped.is_empty() {
                outcome.removed.insert(section.clone(), dropped);
            }
        }

        if outcome.removed_count() > 0 {
            self.commit(map, None).await?;
        }
        Ok(outcome)
    }
}
