//! Durable image asset store for a content-display application.
//!
//! This crate provides:
//! - Upload validation and ingest into self-contained `data:` payloads
//! - A manifest of asset records persisted as one blob
//! - Storage quota estimation
//! - Reference classification and display normalisation
//! - Ephemeral preview handles for in-flight uploads
//! - The section index and its startup cleanup sweep

pub mod cleanup;
pub mod clock;
pub mod config;
pub mod editor;
pub mod encoding;
pub mod ephemeral;
pub mod error;
pub mod formats;
pub mod ingest;
pub mod lifecycle;
pub mod manifest;
pub mod models;
pub mod quota;
pub mod reference;
pub mod sections;
pub mod services;
pub mod store;

pub use cleanup::{CleanupEngine, CleanupPlan, CleanupReport, FlaggedEntry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ImageConfig, IngestConfig, QuotaConfig, ResizeConfig, StorageConfig, MB};
pub use editor::{SectionEditor, UploadOutcome};
pub use ephemeral::{EphemeralHandle, EphemeralTracker, PreviewData, SlotKey};
pub use error::{ImageError, ImageResult, ValidationError};
pub use formats::ImageFormat;
pub use ingest::{is_asset_id, IngestPipeline, IngestReply, IngestResponse, StatusClass, Upload};
pub use lifecycle::EntryState;
pub use manifest::{Manifest, MANIFEST_KEY};
pub use models::{AssetMetadata, AssetRecord, ImageReference, IngestReceipt};
pub use quota::{QuotaEstimate, QuotaMonitor};
pub use reference::{classify, normalize_for_display, ReferenceKind, PLACEHOLDER};
pub use sections::{RetainOutcome, SectionIndex, SectionMap, SECTION_MAP_KEY};
pub use services::Galleria;
pub use store::AssetStore;
