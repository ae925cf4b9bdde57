//! Property-based tests for the ingest pipeline.
//!
//! Accepted uploads are stored verbatim as their self-contained encoding,
//! and rejected uploads leave the manifest untouched.

use chrono::Utc;
use galleria_images::encoding::to_data_url;
use galleria_images::{
    is_asset_id, AssetStore, ImageConfig, ImageError, ImageFormat, IngestPipeline, ManualClock,
    QuotaMonitor, Upload,
};
use galleria_storage::MemoryStorage;
use proptest::prelude::*;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

fn pipeline(config: &ImageConfig) -> (IngestPipeline, Arc<AssetStore>) {
    let storage = Arc::new(MemoryStorage::new());
    let store = Arc::new(AssetStore::new(storage.clone()));
    let quota = Arc::new(QuotaMonitor::new(storage, config.quota.clone()));
    let pipeline = IngestPipeline::new(
        store.clone(),
        quota,
        Arc::new(ManualClock::new(Utc::now())),
        config.ingest.clone(),
        config.resize.clone(),
    );
    (pipeline, store)
}

fn format_strategy() -> impl Strategy<Value = ImageFormat> {
    prop::sample::select(ImageFormat::ALL.to_vec())
}

#[test]
fn prop_ingest_then_get_returns_encoded_payload() {
    proptest!(|(
        bytes in prop::collection::vec(any::<u8>(), 1..2048),
        format in format_strategy(),
    )| {
        let rt = runtime();
        let config = ImageConfig::without_latency();
        let (pipeline, store) = pipeline(&config);

        let (receipt, record) = rt.block_on(async {
            let receipt = pipeline
                .ingest(Upload::new(bytes.clone(), format.mime(), "upload.bin"))
                .await
                .unwrap();
            let record = store.get(&receipt.id).await;
            (receipt, record)
        });

        prop_assert!(is_asset_id(&receipt.id));
        let record = record.expect("Record stored");
        prop_assert_eq!(&record.payload, &to_data_url(&bytes, format));
        prop_assert_eq!(record.payload, receipt.url);
    });
}

#[test]
fn prop_rejected_upload_leaves_manifest_unchanged() {
    proptest!(|(
        content_type in r"(text|application|video)/[a-z]{1,8}",
        len in 1usize..64,
    )| {
        let rt = runtime();
        let config = ImageConfig::without_latency();
        let (pipeline, store) = pipeline(&config);

        let (err, empty) = rt.block_on(async {
            let err = pipeline
                .ingest(Upload::new(vec![0u8; len], content_type.as_str(), "upload.bin"))
                .await
                .unwrap_err();
            (err, store.is_empty().await)
        });

        prop_assert!(matches!(err, ImageError::Validation(_)));
        prop_assert!(empty);
    });
}
