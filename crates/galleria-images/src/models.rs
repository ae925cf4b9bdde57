//! Data models for stored assets and section references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reference::{classify, normalize_for_display, ReferenceKind};

/// Durable record of one stored image.
///
/// Serialized as `{id, filename, originalName, url, uploadDate}`; records are
/// never edited after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    /// Unique id within the manifest (`img-<millis>-<suffix>`)
    pub id: String,
    /// Stored file name derived from the id
    pub filename: String,
    /// Name of the file as uploaded
    pub original_name: String,
    /// Self-contained representation or external reference
    #[serde(rename = "url")]
    pub payload: String,
    /// Declared content type, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Upload time
    #[serde(rename = "uploadDate")]
    pub uploaded_at: DateTime<Utc>,
}

/// Everything about a record except its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMetadata {
    pub id: String,
    pub filename: String,
    pub original_name: String,
    pub content_type: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl AssetRecord {
    /// Assemble a record from its payload and metadata.
    pub fn new(payload: String, metadata: AssetMetadata) -> Self {
        Self {
            id: metadata.id,
            filename: metadata.filename,
            original_name: metadata.original_name,
            payload,
            content_type: metadata.content_type,
            uploaded_at: metadata.uploaded_at,
        }
    }

    /// Classification of the stored payload.
    pub fn payload_kind(&self) -> ReferenceKind {
        classify(&self.payload)
    }

    /// Approximate payload size in bytes.
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

/// One image in a section, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl ImageReference {
    pub fn new(src: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            alt: alt.into(),
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn kind(&self) -> ReferenceKind {
        classify(&self.src)
    }

    /// Copy of this reference with `src` normalised for rendering.
    pub fn for_display(&self) -> Self {
        Self {
            src: normalize_for_display(&self.src).into_owned(),
            alt: self.alt.clone(),
            caption: self.caption.clone(),
        }
    }
}

/// Successful ingest result handed back across the ingest boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReceipt {
    pub url: String,
    pub id: String,
}
