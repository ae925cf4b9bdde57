//! Durable key/value storage for galleria.
//!
//! Every component that persists state goes through the [`DurableStorage`]
//! trait: a flat namespace of string keys holding whole serialized values.
//!
//! - [`MemoryStorage`]: shared in-memory storage, used by tests and embedders
//! - [`FileStorage`]: one file per key with atomic replace and an optional
//!   `notify` watcher for cross-process change notification
//!
//! Mutations are broadcast as [`StorageEvent`]s so that independent contexts
//! sharing the same storage can discard and reload derived state.

pub mod backend;
pub mod error;
pub mod file;
pub mod memory;

pub use backend::{
    entry_size, total_size, validate_key, DurableStorage, StorageEvent, StorageEventKind,
};
pub use error::{IoOperation, StorageError, StorageResult};
pub use file::{FileStorage, StorageWatcher};
pub use memory::MemoryStorage;
