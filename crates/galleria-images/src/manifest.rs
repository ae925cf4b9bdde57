//! The manifest: every asset record, persisted as one JSON object.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::AssetRecord;

/// Storage key of the serialized manifest.
pub const MANIFEST_KEY: &str = "asset-manifest";

/// Mapping id → record.
///
/// Ordered by id so that serializing an unchanged manifest always produces the
/// same bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    records: BTreeMap<String, AssetRecord>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a serialized manifest.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Serialize the whole manifest.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.records)
    }

    /// Drop entries that break the manifest invariants (key differs from the
    /// record id, or empty payload). Returns the ids that were dropped.
    pub fn discard_malformed(&mut self) -> Vec<String> {
        let malformed: Vec<String> = self
            .records
            .iter()
            .filter(|(key, record)| **key != record.id || record.payload.is_empty())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &malformed {
            self.records.remove(key);
        }
        malformed
    }

    pub fn get(&self, id: &str) -> Option<&AssetRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Insert a record, returning any record it superseded. Callers that
    /// must not replace check `contains` first.
    pub fn insert(&mut self, record: AssetRecord) -> Option<AssetRecord> {
        self.records.insert(record.id.clone(), record)
    }

    pub fn remove(&mut self, id: &str) -> Option<AssetRecord> {
        self.records.remove(id)
    }

    /// Keep only records matching `keep`; returns the removed records.
    pub fn retain<F>(&mut self, mut keep: F) -> Vec<AssetRecord>
    where
        F: FnMut(&AssetRecord) -> bool,
    {
        let removed_ids: Vec<String> = self
            .records
            .values()
            .filter(|record| !keep(record))
            .map(|record| record.id.clone())
            .collect();
        removed_ids
            .iter()
            .filter_map(|id| self.records.remove(id))
            .collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &AssetRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<AssetRecord> for Manifest {
    fn from_iter<I: IntoIterator<Item = AssetRecord>>(iter: I) -> Self {
        let mut manifest = Manifest::new();
        for record in iter {
            manifest.insert(record);
        }
        manifest
    }
}
