//! Short-lived preview handles for uploads that are still being ingested.
//!
//! A handle is created as soon as a file is picked and must be released
//! explicitly: when the durable reference replaces it, when the ingest fails,
//! or when its section slot is overwritten or removed. Dropping the handle
//! value does not free the preview data.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ImageResult;
use crate::lifecycle::EntryState;
use crate::reference::EPHEMERAL_PREFIX;

/// Position of an entry within a section.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub section: String,
    pub index: usize,
}

impl SlotKey {
    pub fn new(section: impl Into<String>, index: usize) -> Self {
        Self {
            section: section.into(),
            index,
        }
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.section, self.index)
    }
}

/// Single-owner reference to preview data held by an [`EphemeralTracker`].
#[must_use = "ephemeral handles must be released through the tracker"]
#[derive(Debug, PartialEq, Eq)]
pub struct EphemeralHandle {
    id: Uuid,
    url: String,
    owner: SlotKey,
}

impl EphemeralHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Reference usable as an image `src` for the preview.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Slot the handle was created for. The tracker may have moved it since.
    pub fn owner(&self) -> &SlotKey {
        &self.owner
    }
}

/// Preview data behind a live handle.
#[derive(Debug, Clone)]
pub struct PreviewData {
    pub content_type: String,
    pub bytes: Arc<Vec<u8>>,
}

#[derive(Debug)]
struct LiveHandle {
    owner: SlotKey,
    preview: PreviewData,
}

#[derive(Debug, Default)]
struct TrackerState {
    handles: HashMap<Uuid, LiveHandle>,
    owners: HashMap<SlotKey, Uuid>,
}

impl TrackerState {
    fn release_id(&mut self, id: &Uuid) -> bool {
        match self.handles.remove(id) {
            Some(live) => {
                if self.owners.get(&live.owner) == Some(id) {
                    self.owners.remove(&live.owner);
                }
                true
            }
            None => false,
        }
    }
}

/// Tracks live preview handles for one session.
#[derive(Debug, Default)]
pub struct EphemeralTracker {
    state: Mutex<TrackerState>,
}

fn handle_url(id: &Uuid) -> String {
    format!("{}galleria/{}", EPHEMERAL_PREFIX, id)
}

impl EphemeralTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a preview handle owned by `owner`. A handle the slot already
    /// owned is released first, since its entry is being overwritten.
    pub fn create(
        &self,
        owner: SlotKey,
        bytes: Vec<u8>,
        content_type: impl Into<String>,
    ) -> EphemeralHandle {
        let id = Uuid::new_v4();
        let mut state = self.state.lock();

        if let Some(previous) = state.owners.get(&owner).copied() {
            debug!(slot = %owner, "Releasing superseded preview handle");
            state.release_id(&previous);
        }

        state.owners.insert(owner.clone(), id);
        state.handles.insert(
            id,
            LiveHandle {
                owner: owner.clone(),
                preview: PreviewData {
                    content_type: content_type.into(),
                    bytes: Arc::new(bytes),
                },
            },
        );
        debug!(slot = %owner, live = state.handles.len(), "Created preview handle");

        EphemeralHandle {
            url: handle_url(&id),
            id,
            owner,
        }
    }

    /// Release a handle. Returns `false` if it had already been released
    /// (for example because its slot was overwritten meanwhile).
    pub fn release(&self, handle: EphemeralHandle) -> bool {
        let released = self.state.lock().release_id(&handle.id);
        if released {
            debug!(slot = %handle.owner, "Released preview handle");
        }
        released
    }

    /// Release a handle at the end of its upload and move its entry from
    /// `Pending` to `next`. Returns the slot the handle owned at that moment.
    ///
    /// A handle already released through its slot is `Removed`, and moving
    /// it anywhere is rejected.
    pub fn settle(&self, handle: EphemeralHandle, next: EntryState) -> ImageResult<SlotKey> {
        let mut state = self.state.lock();
        let Some(owner) = state.handles.get(&handle.id).map(|live| live.owner.clone()) else {
            EntryState::Removed.transition(next)?;
            return Ok(handle.owner);
        };
        EntryState::Pending.transition(next)?;
        state.release_id(&handle.id);
        debug!(slot = %owner, state = ?next, "Settled preview handle");
        Ok(owner)
    }

    /// Account for the removal of the entry at `removed`: its handle is
    /// released and handles of later entries in the same section move down
    /// by one. Returns whether the removed slot held a handle.
    pub fn shift_after_removal(&self, removed: &SlotKey) -> bool {
        let mut state = self.state.lock();
        let released = match state.owners.get(removed).copied() {
            Some(id) => state.release_id(&id),
            None => false,
        };

        let mut moved = Vec::new();
        for (id, live) in state.handles.iter_mut() {
            if live.owner.section == removed.section && live.owner.index > removed.index {
                let from = live.owner.clone();
                live.owner.index -= 1;
                moved.push((from, live.owner.clone(), *id));
            }
        }
        for (from, _, id) in &moved {
            if state.owners.get(from) == Some(id) {
                state.owners.remove(from);
            }
        }
        for (_, to, id) in moved {
            debug!(slot = %to, "Moved preview handle after removal");
            state.owners.insert(to, id);
        }
        released
    }

    /// Release whatever handle `owner` currently holds.
    pub fn release_owner(&self, owner: &SlotKey) -> bool {
        let mut state = self.state.lock();
        match state.owners.get(owner).copied() {
            Some(id) => state.release_id(&id),
            None => false,
        }
    }

    /// Release every handle; returns how many were still live.
    pub fn release_all(&self) -> usize {
        let mut state = self.state.lock();
        let count = state.handles.len();
        if count > 0 {
            warn!(count = count, "Releasing preview handles left open");
        }
        state.handles.clear();
        state.owners.clear();
        count
    }

    /// Preview data for a handle URL, while the handle is live.
    pub fn resolve(&self, url: &str) -> Option<PreviewData> {
        let id = url
            .strip_prefix(EPHEMERAL_PREFIX)?
            .strip_prefix("galleria/")?
            .parse::<Uuid>()
            .ok()?;
        self.state
            .lock()
            .handles
            .get(&id)
            .map(|live| live.preview.clone())
    }

    /// URL of the preview currently shown in `owner`, if any.
    pub fn preview_url(&self, owner: &SlotKey) -> Option<String> {
        self.state.lock().owners.get(owner).map(handle_url)
    }

    /// Number of live handles.
    pub fn live_count(&self) -> usize {
        self.state.lock().handles.len()
    }
}
