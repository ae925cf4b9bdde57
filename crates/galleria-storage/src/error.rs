//! Storage error types for galleria

use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// Writing the value would push aggregate usage past the configured capacity
    #[error("Quota exceeded writing '{key}': {required} bytes required, capacity is {capacity} bytes")]
    QuotaExceeded {
        key: String,
        required: u64,
        capacity: u64,
    },

    /// Key contains characters outside `[A-Za-z0-9._-]` or is empty
    #[error("Invalid storage key: '{0}'")]
    InvalidKey(String),

    /// File read/write failed
    #[error("IO error on {path} ({operation}): {source}")]
    IoError {
        path: PathBuf,
        operation: IoOperation,
        source: std::io::Error,
    },

    /// Directory creation failed
    #[error("Directory creation failed for {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// File watcher could not be installed
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// IO operation type for error context
#[derive(Debug, Clone, Copy)]
pub enum IoOperation {
    Read,
    Write,
    Delete,
    Move,
}

impl std::fmt::Display for IoOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoOperation::Read => write!(f, "read"),
            IoOperation::Write => write!(f, "write"),
            IoOperation::Delete => write!(f, "delete"),
            IoOperation::Move => write!(f, "move"),
        }
    }
}

impl StorageError {
    /// Create a quota exceeded error
    pub fn quota_exceeded(key: impl Into<String>, required: u64, capacity: u64) -> Self {
        StorageError::QuotaExceeded {
            key: key.into(),
            required,
            capacity,
        }
    }

    /// Create an IO error
    pub fn io_error(path: PathBuf, operation: IoOperation, source: std::io::Error) -> Self {
        StorageError::IoError {
            path,
            operation,
            source,
        }
    }

    /// Create a directory creation failed error
    pub fn directory_creation_failed(path: PathBuf, source: std::io::Error) -> Self {
        StorageError::DirectoryCreationFailed { path, source }
    }

    /// Whether this failure is attributable to exhausted capacity
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}
