//! Admin-flow coordinator tying uploads to section slots.
//!
//! Owns the preview handle of each slot while its upload is in flight and
//! releases it at every transition out of `Pending`. Removals made through
//! the editor move pending uploads along with the entries they target.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::ephemeral::{EphemeralTracker, SlotKey};
use crate::error::{ImageError, ImageResult};
use crate::ingest::{IngestPipeline, Upload};
use crate::lifecycle::EntryState;
use crate::models::{ImageReference, IngestReceipt};
use crate::sections::SectionIndex;

/// Result of a successful slot upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub receipt: IngestReceipt,
    pub slot: SlotKey,
    pub state: EntryState,
}

pub struct SectionEditor {
    sections: Arc<SectionIndex>,
    pipeline: Arc<IngestPipeline>,
    tracker: Arc<EphemeralTracker>,
    // Held while slot positions are read or changed
    slots: Mutex<()>,
}

impl SectionEditor {
    pub fn new(
        sections: Arc<SectionIndex>,
        pipeline: Arc<IngestPipeline>,
        tracker: Arc<EphemeralTracker>,
    ) -> Self {
        Self {
            sections,
            pipeline,
            tracker,
            slots: Mutex::new(()),
        }
    }

    pub fn tracker(&self) -> &Arc<EphemeralTracker> {
        &self.tracker
    }

    /// Preview URL shown for `slot` while its upload is pending.
    pub fn preview(&self, slot: &SlotKey) -> Option<String> {
        self.tracker.preview_url(slot)
    }

    /// Upload into `slot`, overwriting an existing entry or appending when
    /// the index is one past the end of the section.
    ///
    /// If the slot is removed or cancelled before the ingest finishes, the
    /// stored record is deleted again and the section is left alone.
    pub async fn upload(
        &self,
        slot: SlotKey,
        upload: Upload,
        alt: impl Into<String>,
        caption: Option<String>,
    ) -> ImageResult<UploadOutcome> {
        let format = self.pipeline.validate(&upload)?;

        let handle = {
            let _slots = self.slots.lock().await;
            let len = self.sections.entries(&slot.section).await.len();
            if slot.index > len {
                return Err(ImageError::EntryNotFound {
                    section: slot.section,
                    index: slot.index,
                });
            }
            let preview = upload.payload.clone().unwrap_or_default();
            self.tracker.create(slot.clone(), preview, format.mime())
        };
        debug!(slot = %slot, preview = %handle.url(), "Upload pending");

        let result = self.pipeline.ingest(upload).await;

        let _slots = self.slots.lock().await;
        let receipt = match result {
            Ok(receipt) => receipt,
            Err(e) => {
                if let Err(settle) = self.tracker.settle(handle, EntryState::Removed) {
                    debug!(slot = %slot, "Slot already released: {}", settle);
                }
                warn!(slot = %slot, "Upload failed, slot left unchanged: {}", e);
                return Err(e);
            }
        };

        let slot = match self.tracker.settle(handle, EntryState::Stored) {
            Ok(current) => current,
            Err(e) => {
                warn!(slot = %slot, id = %receipt.id, "Slot released during upload, discarding record");
                self.pipeline.store().remove(&receipt.id).await?;
                return Err(e);
            }
        };

        let reference = ImageReference {
            src: receipt.url.clone(),
            alt: alt.into(),
            caption,
        };
        let slot = if slot.index < self.sections.entries(&slot.section).await.len() {
            self.sections.replace_entry(&slot, reference).await?;
            slot
        } else {
            self.sections.push_entry(&slot.section, reference).await?
        };

        Ok(UploadOutcome {
            receipt,
            slot,
            state: EntryState::Stored,
        })
    }

    /// Remove the entry in `slot`. Its preview is released and pending
    /// uploads into later entries of the section follow their entry.
    pub async fn remove(&self, slot: &SlotKey) -> ImageResult<ImageReference> {
        let _slots = self.slots.lock().await;
        let removed = self.sections.remove_entry(slot).await?;
        if self.tracker.shift_after_removal(slot) {
            debug!(slot = %slot, "Released preview of removed entry");
        }
        Ok(removed)
    }

    /// Drop a pending preview without touching the section. The upload
    /// behind it will not be written into the slot.
    pub fn cancel(&self, slot: &SlotKey) -> bool {
        self.tracker.release_owner(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{ImageConfig, QuotaConfig};
    use crate::quota::QuotaMonitor;
    use crate::reference::{ReferenceKind, PLACEHOLDER};
    use crate::store::AssetStore;
    use chrono::Utc;
    use galleria_storage::MemoryStorage;

    fn editor(storage: Arc<MemoryStorage>) -> (SectionEditor, Arc<SectionIndex>) {
        let config = ImageConfig::without_latency();
        let store = Arc::new(AssetStore::new(storage.clone()));
        let quota = Arc::new(QuotaMonitor::new(storage.clone(), QuotaConfig::default()));
        let pipeline = Arc::new(IngestPipeline::new(
            store,
            quota,
            Arc::new(ManualClock::new(Utc::now())),
            config.ingest,
            config.resize,
        ));
        let sections = Arc::new(SectionIndex::new(storage));
        (
            SectionEditor::new(sections.clone(), pipeline, Arc::new(EphemeralTracker::new())),
            sections,
        )
    }

    fn png() -> Upload {
        Upload::new(vec![0x89, b'P', b'N', b'G'], "image/png", "logo.png")
    }

    #[tokio::test]
    async fn test_upload_appends_and_releases_handle() {
        let (editor, sections) = editor(Arc::new(MemoryStorage::new()));

        let outcome = editor
            .upload(SlotKey::new("hero", 0), png(), "Logo", Some("Ours".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome.state, EntryState::Stored);
        assert_eq!(outcome.slot, SlotKey::new("hero", 0));
        assert_eq!(editor.tracker().live_count(), 0);

        let entries = sections.entries("hero").await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind(), ReferenceKind::SelfContainedData);
        assert_eq!(entries[0].src, outcome.receipt.url);
        assert_eq!(entries[0].caption.as_deref(), Some("Ours"));
    }

    #[tokio::test]
    async fn test_upload_overwrites_existing_slot() {
        let (editor, sections) = editor(Arc::new(MemoryStorage::new()));
        sections
            .set_entries("team", vec![ImageReference::new(PLACEHOLDER, "a")])
            .await
            .unwrap();

        editor
            .upload(SlotKey::new("team", 0), png(), "b", None)
            .await
            .unwrap();
        let entries = sections.entries("team").await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].alt, "b");
    }

    #[tokio::test]
    async fn test_rejected_upload_creates_no_handle() {
        let (editor, sections) = editor(Arc::new(MemoryStorage::new()));
        let upload = Upload::new(b"hello".to_vec(), "text/plain", "notes.txt");

        let err = editor
            .upload(SlotKey::new("hero", 0), upload, "", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::Validation(_)));
        assert_eq!(editor.tracker().live_count(), 0);
        assert!(sections.sections().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_ingest_releases_handle() {
        let (editor, sections) = editor(Arc::new(MemoryStorage::with_capacity(16)));

        let err = editor
            .upload(SlotKey::new("hero", 0), png(), "", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::QuotaExceeded(_)));
        assert_eq!(editor.tracker().live_count(), 0);
        assert!(sections.entries("hero").await.is_empty());
    }

    #[tokio::test]
    async fn test_slot_past_end_is_rejected() {
        let (editor, _) = editor(Arc::new(MemoryStorage::new()));
        let err = editor
            .upload(SlotKey::new("hero", 3), png(), "", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::EntryNotFound { index: 3, .. }));
    }

    fn editor_with_latency(storage: Arc<MemoryStorage>, latency_ms: u64) -> (SectionEditor, Arc<SectionIndex>, Arc<AssetStore>) {
        let mut config = ImageConfig::without_latency();
        config.ingest.simulated_latency_ms = latency_ms;
        let store = Arc::new(AssetStore::new(storage.clone()));
        let quota = Arc::new(QuotaMonitor::new(storage.clone(), QuotaConfig::default()));
        let pipeline = Arc::new(IngestPipeline::new(
            store.clone(),
            quota,
            Arc::new(ManualClock::new(Utc::now())),
            config.ingest,
            config.resize,
        ));
        let sections = Arc::new(SectionIndex::new(storage));
        (
            SectionEditor::new(sections.clone(), pipeline, Arc::new(EphemeralTracker::new())),
            sections,
            store,
        )
    }

    fn alts(entries: Vec<ImageReference>) -> Vec<String> {
        entries.into_iter().map(|e| e.alt).collect()
    }

    #[tokio::test]
    async fn test_upload_follows_entry_moved_by_removal() {
        let (editor, sections, _) = editor_with_latency(Arc::new(MemoryStorage::new()), 50);
        sections
            .set_entries(
                "s",
                vec![
                    ImageReference::new(PLACEHOLDER, "A"),
                    ImageReference::new(PLACEHOLDER, "B"),
                    ImageReference::new(PLACEHOLDER, "C"),
                ],
            )
            .await
            .unwrap();

        let (uploaded, removed) = tokio::join!(
            editor.upload(SlotKey::new("s", 1), png(), "B2", None),
            async {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                editor.remove(&SlotKey::new("s", 0)).await
            }
        );
        assert_eq!(removed.unwrap().alt, "A");
        assert_eq!(uploaded.unwrap().slot, SlotKey::new("s", 0));
        assert_eq!(alts(sections.entries("s").await), vec!["B2", "C"]);
        assert_eq!(editor.tracker().live_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_into_removed_slot_is_discarded() {
        let (editor, sections, store) = editor_with_latency(Arc::new(MemoryStorage::new()), 50);
        sections
            .set_entries(
                "s",
                vec![
                    ImageReference::new(PLACEHOLDER, "A"),
                    ImageReference::new(PLACEHOLDER, "B"),
                ],
            )
            .await
            .unwrap();

        let (uploaded, removed) = tokio::join!(
            editor.upload(SlotKey::new("s", 0), png(), "A2", None),
            async {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                editor.remove(&SlotKey::new("s", 0)).await
            }
        );
        removed.unwrap();
        let err = uploaded.unwrap_err();
        assert!(matches!(
            err,
            ImageError::InvalidTransition {
                from: EntryState::Removed,
                to: EntryState::Stored
            }
        ));
        assert_eq!(alts(sections.entries("s").await), vec!["B"]);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_cancelled_upload_is_not_written() {
        let (editor, sections, store) = editor_with_latency(Arc::new(MemoryStorage::new()), 50);
        let slot = SlotKey::new("hero", 0);

        let (uploaded, cancelled) = tokio::join!(
            editor.upload(slot.clone(), png(), "", None),
            async {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                editor.cancel(&slot)
            }
        );
        assert!(cancelled);
        assert!(uploaded.is_err());
        assert!(sections.entries("hero").await.is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_and_cancel_release_previews() {
        let (editor, sections) = editor(Arc::new(MemoryStorage::new()));
        sections
            .set_entries("gallery", vec![ImageReference::new(PLACEHOLDER, "")])
            .await
            .unwrap();

        let slot = SlotKey::new("gallery", 0);
        let _pending = editor.tracker().create(slot.clone(), vec![1], "image/png");
        assert!(editor.preview(&slot).is_some());
        editor.remove(&slot).await.unwrap();
        assert_eq!(editor.tracker().live_count(), 0);
        assert!(sections.entries("gallery").await.is_empty());

        let other = SlotKey::new("gallery", 1);
        let _pending = editor.tracker().create(other.clone(), vec![1], "image/png");
        assert!(editor.cancel(&other));
        assert!(!editor.cancel(&other));
        assert!(editor.preview(&other).is_none());
    }
}
