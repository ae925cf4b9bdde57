//! Upload validation and conversion into durable asset records.

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{IngestConfig, ResizeConfig};
use crate::encoding::encode_payload;
use crate::error::{ImageError, ImageResult, ValidationError};
use crate::formats::ImageFormat;
use crate::models::{AssetMetadata, IngestReceipt};
use crate::quota::QuotaMonitor;
use crate::store::AssetStore;

const ID_PREFIX: &str = "img-";
const SUFFIX_LEN: usize = 7;
const SUFFIX_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A raw upload as received from a form.
#[derive(Debug, Clone)]
pub struct Upload {
    /// File contents; `None` when the form carried no file
    pub payload: Option<Vec<u8>>,
    /// Size claimed by the client
    pub declared_size: u64,
    /// Claimed content type
    pub content_type: String,
    /// Display file name
    pub filename: String,
}

impl Upload {
    pub fn new(payload: Vec<u8>, content_type: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            declared_size: payload.len() as u64,
            payload: Some(payload),
            content_type: content_type.into(),
            filename: filename.into(),
        }
    }

    /// A form submission without a file.
    pub fn missing(filename: impl Into<String>) -> Self {
        Self {
            payload: None,
            declared_size: 0,
            content_type: String::new(),
            filename: filename.into(),
        }
    }

    /// Size used for the limit check: the larger of claimed and actual size.
    pub fn size(&self) -> u64 {
        let actual = self.payload.as_ref().map(|p| p.len() as u64).unwrap_or(0);
        actual.max(self.declared_size)
    }
}

/// Generates `img-<millis>-<suffix>` ids with strictly increasing timestamps.
pub struct IdGenerator {
    clock: Arc<dyn Clock>,
    last_millis: Mutex<i64>,
}

impl IdGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last_millis: Mutex::new(i64::MIN),
        }
    }

    /// Next id. Two ids issued within the same millisecond get consecutive
    /// timestamps.
    pub fn next_id(&self) -> String {
        let millis = {
            let mut last = self.last_millis.lock();
            let now = self.clock.now().timestamp_millis();
            let millis = if now > *last { now } else { *last + 1 };
            *last = millis;
            millis
        };

        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
            .collect();
        format!("{}{}-{}", ID_PREFIX, millis, suffix)
    }
}

/// Whether `id` has the `img-<millis>-<7 lowercase alphanumerics>` shape.
pub fn is_asset_id(id: &str) -> bool {
    let Some(rest) = id.strip_prefix(ID_PREFIX) else {
        return false;
    };
    let Some((millis, suffix)) = rest.split_once('-') else {
        return false;
    };
    !millis.is_empty()
        && millis.bytes().all(|b| b.is_ascii_digit())
        && suffix.len() == SUFFIX_LEN
        && suffix.bytes().all(|b| SUFFIX_CHARSET.contains(&b))
}

/// Response classification at the ingest boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusClass {
    Success,
    ClientError,
    ServerError,
}

impl StatusClass {
    /// Equivalent HTTP status code.
    pub fn code(&self) -> u16 {
        match self {
            StatusClass::Success => 200,
            StatusClass::ClientError => 400,
            StatusClass::ServerError => 500,
        }
    }
}

/// Body returned across the ingest boundary: `{url, id}` or `{error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IngestResponse {
    Success { url: String, id: String },
    Failure { error: String },
}

/// Classified response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReply {
    pub status: StatusClass,
    pub body: IngestResponse,
}

impl IngestReply {
    pub fn from_result(result: ImageResult<IngestReceipt>) -> Self {
        match result {
            Ok(receipt) => Self {
                status: StatusClass::Success,
                body: IngestResponse::Success {
                    url: receipt.url,
                    id: receipt.id,
                },
            },
            Err(e) => Self {
                status: StatusClass::from(&e),
                body: IngestResponse::Failure {
                    error: e.to_string(),
                },
            },
        }
    }
}

/// Validates uploads and turns them into stored asset records.
pub struct IngestPipeline {
    store: Arc<AssetStore>,
    quota: Arc<QuotaMonitor>,
    clock: Arc<dyn Clock>,
    ids: IdGenerator,
    config: IngestConfig,
    resize: ResizeConfig,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<AssetStore>,
        quota: Arc<QuotaMonitor>,
        clock: Arc<dyn Clock>,
        config: IngestConfig,
        resize: ResizeConfig,
    ) -> Self {
        Self {
            store,
            quota,
            ids: IdGenerator::new(clock.clone()),
            clock,
            config,
            resize,
        }
    }

    /// Validate an upload: presence, then size, then content type. The first
    /// failing check wins.
    pub fn validate(&self, upload: &Upload) -> Result<ImageFormat, ValidationError> {
        match &upload.payload {
            Some(payload) if !payload.is_empty() => {}
            _ => return Err(ValidationError::MissingPayload),
        }

        let size = upload.size();
        if size > self.config.max_upload_bytes {
            return Err(ValidationError::TooLarge {
                size_bytes: size,
                limit_mb: self.config.max_upload_mb(),
            });
        }

        let unsupported = || ValidationError::UnsupportedType {
            content_type: upload.content_type.clone(),
        };
        if !self.config.is_type_allowed(&upload.content_type) {
            return Err(unsupported());
        }
        ImageFormat::from_mime(&upload.content_type).ok_or_else(unsupported)
    }

    /// Ingest an upload and return its durable reference.
    ///
    /// Once past validation the write runs to completion even if the caller
    /// stops waiting for it.
    pub async fn ingest(&self, upload: Upload) -> ImageResult<IngestReceipt> {
        let format = match self.validate(&upload) {
            Ok(format) => format,
            Err(e) => {
                debug!(filename = %upload.filename, "Upload rejected: {}", e);
                return Err(e.into());
            }
        };

        if !self.quota.available().await {
            warn!("Storage usage is above the warning threshold; ingest continues");
        }

        let id = self.ids.next_id();
        let bytes = upload.payload.unwrap_or_default();
        let size = bytes.len();
        let original_name = upload.filename;
        let latency = self.config.simulated_latency();
        let max_dimension = self.resize.enabled.then_some(self.resize.max_dimension);
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);

        // Detached so that a caller dropping this future does not abort the write
        let task = tokio::spawn(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            let payload = encode_payload(bytes, format, max_dimension).await?;
            let metadata = AssetMetadata {
                filename: format!("{}.{}", id, format.extension()),
                id,
                original_name,
                content_type: Some(format.mime().to_string()),
                uploaded_at: clock.now(),
            };
            store.ingest(payload, metadata).await
        });
        let record = task
            .await
            .map_err(|e| ImageError::Encoding(format!("Ingest task failed: {}", e)))??;

        info!(
            id = %record.id,
            original_name = %record.original_name,
            bytes = size,
            "Ingested image"
        );
        Ok(IngestReceipt {
            url: record.payload,
            id: record.id,
        })
    }

    /// Ingest and classify the outcome for the boundary.
    pub async fn handle(&self, upload: Upload) -> IngestReply {
        IngestReply::from_result(self.ingest(upload).await)
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<AssetStore> {
        &self.store
    }
}

impl From<&ImageError> for StatusClass {
    fn from(err: &ImageError) -> Self {
        if err.is_client_error() {
            StatusClass::ClientError
        } else {
            StatusClass::ServerError
        }
    }
}
