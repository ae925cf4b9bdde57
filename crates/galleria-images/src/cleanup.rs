//! Startup sweep that purges references the display policy cannot keep.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::ephemeral::SlotKey;
use crate::error::ImageResult;
use crate::lifecycle::EntryState;
use crate::models::ImageReference;
use crate::reference::ReferenceKind;
use crate::sections::SectionIndex;
use crate::store::AssetStore;

/// Section entry flagged by a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlaggedEntry {
    pub section: String,
    pub index: usize,
    pub src: String,
    pub kind: ReferenceKind,
    pub state: EntryState,
}

impl FlaggedEntry {
    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.section.clone(), self.index)
    }
}

/// What a sweep would remove, computed without writing anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupPlan {
    pub entries: Vec<FlaggedEntry>,
    pub asset_ids: Vec<String>,
}

impl CleanupPlan {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.asset_ids.is_empty()
    }

    pub fn sections_affected(&self) -> usize {
        let mut sections: Vec<&str> = self.entries.iter().map(|e| e.section.as_str()).collect();
        sections.dedup();
        sections.len()
    }
}

/// Diagnostics of one sweep. Not persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub removed_count: usize,
    pub sections_affected_count: usize,
    pub assets_removed_count: usize,
}

/// Flags stored entries that fail the retention policy.
fn flag(section: &str, index: usize, reference: &ImageReference) -> Option<FlaggedEntry> {
    let kind = reference.kind();
    if kind.is_retained() {
        return None;
    }
    Some(FlaggedEntry {
        section: section.to_string(),
        index,
        src: reference.src.clone(),
        kind,
        state: EntryState::Invalid,
    })
}

pub struct CleanupEngine {
    sections: Arc<SectionIndex>,
    store: Arc<AssetStore>,
}

impl CleanupEngine {
    pub fn new(sections: Arc<SectionIndex>, store: Arc<AssetStore>) -> Self {
        Self { sections, store }
    }

    /// Classify every entry and record without changing anything.
    pub async fn scan(&self) -> ImageResult<CleanupPlan> {
        let map = self.sections.map().await;
        let mut plan = CleanupPlan::default();

        for (section, entries) in map.iter() {
            for (index, reference) in entries.iter().enumerate() {
                if let Some(flagged) = flag(section, index, reference) {
                    plan.entries.push(flagged);
                }
            }
        }

        plan.asset_ids = self
            .store
            .list()
            .await
            .into_iter()
            .filter(|record| !record.payload_kind().is_retained())
            .map(|record| record.id)
            .collect();

        debug!(
            entries = plan.entries.len(),
            assets = plan.asset_ids.len(),
            "Scanned for invalid references"
        );
        Ok(plan)
    }

    /// Purge flagged entries and records. Each store is written only when
    /// something was removed from it, so a second run is a no-op.
    pub async fn run(&self) -> ImageResult<CleanupReport> {
        let outcome = self
            .sections
            .retain_entries(|_, reference| reference.kind().is_retained())
            .await?;
        for (section, dropped) in &outcome.removed {
            for reference in dropped {
                debug!(section = %section, src = %reference.src, kind = %reference.kind(), "Purged entry");
            }
        }

        let assets = self
            .store
            .retain(|record| record.payload_kind().is_retained())
            .await?;

        let report = CleanupReport {
            removed_count: outcome.removed_count(),
            sections_affected_count: outcome.sections_affected(),
            assets_removed_count: assets.len(),
        };
        info!(
            removed = report.removed_count,
            sections = report.sections_affected_count,
            assets = report.assets_removed_count,
            "Cleanup sweep finished"
        );
        Ok(report)
    }
}
