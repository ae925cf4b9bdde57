//! Composition root: builds every service once over shared storage.

use galleria_storage::{DurableStorage, FileStorage};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cleanup::{CleanupEngine, CleanupReport};
use crate::clock::{Clock, SystemClock};
use crate::config::ImageConfig;
use crate::editor::SectionEditor;
use crate::ephemeral::EphemeralTracker;
use crate::error::ImageResult;
use crate::ingest::IngestPipeline;
use crate::quota::QuotaMonitor;
use crate::sections::SectionIndex;
use crate::store::AssetStore;

/// The image services of one execution context.
pub struct Galleria {
    config: ImageConfig,
    storage: Arc<dyn DurableStorage>,
    store: Arc<AssetStore>,
    quota: Arc<QuotaMonitor>,
    pipeline: Arc<IngestPipeline>,
    sections: Arc<SectionIndex>,
    editor: SectionEditor,
    cleanup: CleanupEngine,
    startup_report: CleanupReport,
}

impl Galleria {
    /// Open file-backed storage under the configured root and start up.
    pub async fn open(config: ImageConfig) -> ImageResult<Self> {
        let storage = Self::open_storage(&config)?;
        Self::with_storage(storage, Arc::new(SystemClock), config).await
    }

    /// Open file-backed storage without running the startup sweep, for
    /// inspecting what a sweep would do.
    pub fn open_without_sweep(config: ImageConfig) -> ImageResult<Self> {
        let storage = Self::open_storage(&config)?;
        Ok(Self::assemble(storage, Arc::new(SystemClock), config))
    }

    fn open_storage(config: &ImageConfig) -> ImageResult<Arc<dyn DurableStorage>> {
        let root = config.storage_root();
        let mut storage = FileStorage::open(&root)?;
        if config.storage.enforce_capacity {
            storage = storage.with_capacity(config.quota.capacity_bytes);
        }
        info!(root = %root.display(), "Opened durable storage");
        Ok(Arc::new(storage))
    }

    /// Build the services over `storage` and run the startup cleanup sweep.
    pub async fn with_storage(
        storage: Arc<dyn DurableStorage>,
        clock: Arc<dyn Clock>,
        config: ImageConfig,
    ) -> ImageResult<Self> {
        let mut galleria = Self::assemble(storage, clock, config);
        galleria.startup_report = galleria.cleanup.run().await?;
        debug!(report = ?galleria.startup_report, "Startup sweep complete");
        Ok(galleria)
    }

    /// Build the services over `storage` without touching it.
    pub fn assemble(storage: Arc<dyn DurableStorage>, clock: Arc<dyn Clock>, config: ImageConfig) -> Self {
        let store = Arc::new(AssetStore::new(storage.clone()));
        let quota = Arc::new(QuotaMonitor::new(storage.clone(), config.quota.clone()));
        let pipeline = Arc::new(IngestPipeline::new(
            store.clone(),
            quota.clone(),
            clock,
            config.ingest.clone(),
            config.resize.clone(),
        ));
        let sections = Arc::new(SectionIndex::new(storage.clone()));
        let editor = SectionEditor::new(
            sections.clone(),
            pipeline.clone(),
            Arc::new(EphemeralTracker::new()),
        );
        let cleanup = CleanupEngine::new(sections.clone(), store.clone());

        Self {
            config,
            storage,
            store,
            quota,
            pipeline,
            sections,
            editor,
            cleanup,
            startup_report: CleanupReport::default(),
        }
    }

    /// Follow change notifications from other contexts sharing the storage.
    pub fn spawn_change_listeners(&self) -> Vec<JoinHandle<()>> {
        vec![
            self.store.spawn_change_listener(),
            self.sections.spawn_change_listener(),
        ]
    }

    /// Release previews still open at the end of the session.
    pub fn close(&self) -> usize {
        self.editor.tracker().release_all()
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn DurableStorage> {
        &self.storage
    }

    pub fn store(&self) -> &Arc<AssetStore> {
        &self.store
    }

    pub fn quota(&self) -> &Arc<QuotaMonitor> {
        &self.quota
    }

    pub fn pipeline(&self) -> &Arc<IngestPipeline> {
        &self.pipeline
    }

    pub fn sections(&self) -> &Arc<SectionIndex> {
        &self.sections
    }

    pub fn editor(&self) -> &SectionEditor {
        &self.editor
    }

    pub fn cleanup(&self) -> &CleanupEngine {
        &self.cleanup
    }

    /// Report of the sweep run while opening; empty when no sweep ran.
    pub fn startup_report(&self) -> CleanupReport {
        self.startup_report
    }
}
