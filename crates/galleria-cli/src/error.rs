// CLI errors and the messages shown for them

use galleria_images::{ImageError, StatusClass};
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Ingest failed ({status}): {message}")]
    Ingest { status: u16, message: String },

    #[error(transparent)]
    Images(#[from] ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            CliError::InvalidArgument { message } => {
                format!(
                    "Invalid argument: {}\n\nRun 'galleria --help' for usage information.",
                    message
                )
            }
            CliError::NotFound { what } => {
                format!("{} not found.\n\nRun 'galleria list' or 'galleria sections' to see what is stored.", what)
            }
            CliError::Ingest { status, message } if *status == StatusClass::ClientError.code() => {
                format!("Upload rejected: {}", message)
            }
            CliError::Ingest { message, .. } => {
                format!("Upload could not be stored: {}\n\nRun 'galleria quota' to check storage usage.", message)
            }
            CliError::Images(ImageError::QuotaExceeded(e)) => {
                format!(
                    "Storage is full: {}\n\nRun 'galleria quota' to check usage or remove assets with 'galleria delete-asset'.",
                    e
                )
            }
            CliError::Images(ImageError::EntryNotFound { section, index }) => {
                format!(
                    "Section '{}' has no entry at index {}.\n\nRun 'galleria sections {}' to list its entries.",
                    section, index, section
                )
            }
            CliError::Images(e) => format!("Storage error: {}", e),
            CliError::Io(e) => format!("File operation failed: {}", e),
            CliError::Config(msg) => {
                format!(
                    "Configuration error: {}\n\nCheck ~/.galleria/config/images.yaml or the file passed with --config.",
                    msg
                )
            }
            CliError::Serialization(e) => format!("Could not format output: {}", e),
        }
    }

    /// Get technical details for verbose mode
    pub fn technical_details(&self) -> String {
        format!("{:?}", self)
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use galleria_images::ValidationError;

    #[test]
    fn test_ingest_messages_follow_status() {
        let rejected = CliError::Ingest {
            status: 400,
            message: "File size exceeds 5MB limit".to_string(),
        };
        assert!(rejected.user_message().starts_with("Upload rejected"));

        let failed = CliError::Ingest {
            status: 500,
            message: "Persistence failed".to_string(),
        };
        assert!(failed.user_message().contains("galleria quota"));
    }

    #[test]
    fn test_image_errors_convert() {
        let err: CliError = ImageError::from(ValidationError::MissingPayload).into();
        assert!(err.user_message().contains("No file provided"));

        let err: CliError = ImageError::EntryNotFound {
            section: "hero".to_string(),
            index: 4,
        }
        .into();
        assert!(err.user_message().contains("galleria sections hero"));
    }
}
