//! The durable storage contract shared by every backend.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::{StorageError, StorageResult};

/// Capacity of the change-notification channel before slow receivers lag.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Kind of mutation that produced a [`StorageEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageEventKind {
    /// A value was written (created or replaced)
    Updated,
    /// A value was removed
    Removed,
}

/// "Storage changed" notification.
///
/// Receivers are expected to match on `key` only and reload whatever they
/// derived from it; the new value is deliberately not carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub kind: StorageEventKind,
}

impl StorageEvent {
    pub fn updated(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: StorageEventKind::Updated,
        }
    }

    pub fn removed(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: StorageEventKind::Removed,
        }
    }

    /// Exact key match.
    pub fn concerns(&self, key: &str) -> bool {
        self.key == key
    }
}

/// Shared, process-wide key/value storage.
///
/// Writers are last-writer-wins: there is no transaction or version check.
/// Each `set` replaces the whole value in one step.
#[async_trait]
pub trait DurableStorage: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Replace the value stored under `key`.
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// All keys currently present, sorted.
    async fn keys(&self) -> StorageResult<Vec<String>>;

    /// All key/value pairs currently present, sorted by key.
    async fn entries(&self) -> StorageResult<Vec<(String, String)>>;

    /// Subscribe to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;

    /// Configured capacity in bytes, if the backend enforces one.
    fn capacity(&self) -> Option<u64>;
}

/// Validate a storage key.
pub fn validate_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Size an entry contributes to aggregate usage.
pub fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

/// Aggregate size of a set of entries, as used for capacity accounting.
pub fn total_size(entries: &[(String, String)]) -> u64 {
    entries.iter().map(|(k, v)| entry_size(k, v)).sum()
}

/// Check that writing `value` under `key` fits into `capacity`.
///
/// `current_total` is the aggregate size of all entries and `replaced` the
/// size of the entry being overwritten (zero when the key is new).
pub fn check_capacity(
    key: &str,
    value: &str,
    current_total: u64,
    replaced: u64,
    capacity: Option<u64>,
) -> StorageResult<()> {
    let Some(capacity) = capacity else {
        return Ok(());
    };
    let required = current_total.saturating_sub(replaced) + entry_size(key, value);
    if required > capacity {
        return Err(StorageError::quota_exceeded(key, required, capacity));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("asset-manifest").is_ok());
        assert!(validate_key("section_image.map-2").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("with space").is_err());
    }

    #[test]
    fn test_check_capacity_excludes_replaced_entry() {
        // 10 bytes used, all by the entry being replaced
        assert!(check_capacity("k", "123456789", 10, 10, Some(10)).is_ok());
        assert!(check_capacity("k", "1234567890", 10, 10, Some(10)).is_err());
        assert!(check_capacity("k", "anything", 1_000, 0, None).is_ok());
    }

    #[test]
    fn test_event_concerns_exact_key() {
        let event = StorageEvent::updated("asset-manifest");
        assert!(event.concerns("asset-manifest"));
        assert!(!event.concerns("asset-manifest-backup"));
        assert!(!event.concerns("asset"));
    }
}
