//! Error types for image asset operations.

use galleria_storage::StorageError;
use thiserror::Error;

use crate::lifecycle::EntryState;

/// Result type for image asset operations.
pub type ImageResult<T> = Result<T, ImageError>;

/// Rejected upload. Raised before any side effect takes place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No payload, or an empty one.
    #[error("No file provided")]
    MissingPayload,

    /// Declared size is over the upload limit.
    #[error("File size exceeds {limit_mb}MB limit")]
    TooLarge { size_bytes: u64, limit_mb: u64 },

    /// Content type is not one of the accepted raster types.
    #[error("Invalid file type: {content_type}. Only JPEG, PNG, GIF and WebP images are allowed")]
    UnsupportedType { content_type: String },
}

/// Errors that can occur during image asset operations.
#[derive(Debug, Error)]
pub enum ImageError {
    /// Upload rejected by validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Payload could not be converted to its self-contained representation.
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// Durable storage is out of capacity.
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(#[source] StorageError),

    /// Any other durable write or read failure.
    #[error("Persistence failed: {0}")]
    Persistence(#[source] StorageError),

    /// Durable value could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A record with this id is already stored. Records are never replaced.
    #[error("Asset id already in use: {id}")]
    DuplicateId { id: String },

    /// Section entry lifecycle violation.
    #[error("Invalid entry transition: {from:?} -> {to:?}")]
    InvalidTransition { from: EntryState, to: EntryState },

    /// Section or slot does not exist.
    #[error("Section entry not found: {section}[{index}]")]
    EntryNotFound { section: String, index: usize },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<StorageError> for ImageError {
    fn from(err: StorageError) -> Self {
        if err.is_quota_exceeded() {
            ImageError::QuotaExceeded(err)
        } else {
            ImageError::Persistence(err)
        }
    }
}

impl From<serde_json::Error> for ImageError {
    fn from(err: serde_json::Error) -> Self {
        ImageError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for ImageError {
    fn from(err: serde_yaml::Error) -> Self {
        ImageError::ConfigError(err.to_string())
    }
}

impl ImageError {
    /// Whether the failure lies with the caller's input (client error) rather
    /// than with the store (server error).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ImageError::Validation(_) | ImageError::EntryNotFound { .. }
        )
    }
}
