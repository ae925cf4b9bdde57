//! Durable storage usage estimation.
//!
//! Advisory only: nothing is blocked when storage is reported unavailable.

use galleria_storage::{total_size, DurableStorage};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::config::QuotaConfig;
use crate::error::ImageResult;

/// Snapshot of storage usage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuotaEstimate {
    pub used_bytes: u64,
    pub capacity_bytes: u64,
    pub warning_ratio: f64,
}

impl QuotaEstimate {
    pub fn usage_ratio(&self) -> f64 {
        if self.capacity_bytes == 0 {
            return 1.0;
        }
        self.used_bytes as f64 / self.capacity_bytes as f64
    }

    /// True while usage stays below the warning ratio of the capacity.
    pub fn available(&self) -> bool {
        self.usage_ratio() < self.warning_ratio
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.capacity_bytes.saturating_sub(self.used_bytes)
    }
}

/// Estimates aggregate usage against a fixed capacity ceiling.
pub struct QuotaMonitor {
    storage: Arc<dyn DurableStorage>,
    config: QuotaConfig,
}

impl QuotaMonitor {
    pub fn new(storage: Arc<dyn DurableStorage>, config: QuotaConfig) -> Self {
        Self { storage, config }
    }

    /// Sum every durable entry.
    pub async fn estimate(&self) -> ImageResult<QuotaEstimate> {
        let entries = self.storage.entries().await?;
        let estimate = QuotaEstimate {
            used_bytes: total_size(&entries),
            capacity_bytes: self.config.capacity_bytes,
            warning_ratio: self.config.warning_ratio,
        };
        debug!(
            used = estimate.used_bytes,
            capacity = estimate.capacity_bytes,
            "Estimated storage usage"
        );
        Ok(estimate)
    }

    /// Whether usage is below the warning ratio. An unreadable storage is
    /// reported as unavailable.
    pub async fn available(&self) -> bool {
        self.estimate()
            .await
            .map(|estimate| estimate.available())
            .unwrap_or(false)
    }

    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galleria_storage::MemoryStorage;

    fn monitor(storage: Arc<MemoryStorage>, capacity: u64) -> QuotaMonitor {
        QuotaMonitor::new(
            storage,
            QuotaConfig {
                capacity_bytes: capacity,
                warning_ratio: 0.85,
            },
        )
    }

    #[tokio::test]
    async fn test_empty_storage_available() {
        let quota = monitor(Arc::new(MemoryStorage::new()), 100);
        let estimate = quota.estimate().await.unwrap();
        assert_eq!(estimate.used_bytes, 0);
        assert!(quota.available().await);
    }

    #[tokio::test]
    async fn test_threshold_at_85_percent() {
        let storage = Arc::new(MemoryStorage::new());
        let quota = monitor(storage.clone(), 100);

        // key (1 byte) + 83 bytes = 84%
        storage.set("k", &"x".repeat(83)).await.unwrap();
        assert!(quota.available().await);

        // 85% exactly is no longer available
        storage.set("k", &"x".repeat(84)).await.unwrap();
        assert!(!quota.available().await);
        assert_eq!(quota.estimate().await.unwrap().remaining_bytes(), 15);
    }

    #[tokio::test]
    async fn test_counts_all_keys() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set("asset-manifest", "{}").await.unwrap();
        storage.set("section-image-map", "{}").await.unwrap();
        storage.set("unrelated", "value").await.unwrap();

        let estimate = monitor(storage, 1000).estimate().await.unwrap();
        assert_eq!(estimate.used_bytes, (14 + 2 + 17 + 2 + 9 + 5) as u64);
    }

    #[test]
    fn test_zero_capacity_is_full() {
        let estimate = QuotaEstimate {
            used_bytes: 0,
            capacity_bytes: 0,
            warning_ratio: 0.85,
        };
        assert!(!estimate.available());
    }
}
