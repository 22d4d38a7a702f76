//! The enqueue boundary between the watcher and C8 (§4.9). Kept as a trait,
//! the same seam `thoth-ingestion`'s own `NoteRenderer`/`ChunkIndexer` sit
//! behind, so `PdfMonitor` never needs to know which `CacheStore` backend
//! the pipeline it feeds was built with.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thoth_common::cache::CacheStore;
use thoth_config::DataClassification;
use thoth_ingestion::{DocumentPipeline, IngestOutcome};
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Where a ready, stable PDF path goes next. `enqueue` is expected to block
/// (not drop) when the sink is at capacity (§4.9 backpressure).
#[async_trait]
pub trait IngestionSink: Send + Sync {
    async fn enqueue(&self, path: PathBuf) -> anyhow::Result<()>;
}

/// Feeds a `DocumentPipeline` directly, bounding in-flight documents with a
/// semaphore so a burst of filesystem events can't spawn unbounded
/// concurrent ingestions — the same worker-bounding judgment call
/// `DocumentPipeline::ingest_many` already makes for its own batch API.
pub struct PipelineSink<S: CacheStore> {
    pipeline: Arc<DocumentPipeline<S>>,
    permits: Arc<Semaphore>,
    class: DataClassification,
}

impl<S: CacheStore + Send + Sync + 'static> PipelineSink<S> {
    pub fn new(pipeline: Arc<DocumentPipeline<S>>, max_concurrent: usize, class: DataClassification) -> Self {
        Self { pipeline, permits: Arc::new(Semaphore::new(max_concurrent.max(1))), class }
    }
}

#[async_trait]
impl<S: CacheStore + Send + Sync + 'static> IngestionSink for PipelineSink<S> {
    async fn enqueue(&self, path: PathBuf) -> anyhow::Result<()> {
        // Blocks here, not drops, when every permit is taken (§4.9).
        let _permit = self.permits.clone().acquire_owned().await?;

        match self.pipeline.ingest_one(&path, self.class).await {
            IngestOutcome::Activated { paper_id, version, .. } => {
                info!(path = %path.display(), paper_id, version, "ingested from watched directory");
            }
            IngestOutcome::AlreadyCurrent { paper_id } => {
                info!(path = %path.display(), paper_id, "already ingested, skipping");
            }
            IngestOutcome::Failed { reason } => {
                warn!(path = %path.display(), reason, "ingestion failed, will retry on next modify event");
            }
        }
        Ok(())
    }
}
