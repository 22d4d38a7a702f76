//! thoth-watch — PDFMonitor (C9): watches configured intake directories
//! for new or changed PDFs and enqueues ingestion jobs.

pub mod sink;
pub mod watcher;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{info, warn};

pub use sink::{IngestionSink, PipelineSink};
pub use watcher::DEFAULT_DEBOUNCE;
use watcher::{scan_existing, DebouncedWatcher};

/// How often the watcher is polled for settled (debounced, stable) paths.
/// Well under `MonitorConfig::debounce` so the debounce window itself,
/// not the poll cadence, determines enqueue latency.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub roots: Vec<PathBuf>,
    pub debounce: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { roots: Vec::new(), debounce: DEFAULT_DEBOUNCE }
    }
}

/// Observability event mirroring the shape of `thoth_ingestion::IngestionProgress`
/// (§4.9 is silent on an event stream, but every other long-running component
/// in this workspace exposes one via `subscribe()`).
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Enqueued { path: PathBuf },
    EnqueueFailed { path: PathBuf, error: String },
}

/// PDFMonitor (C9): drives a `DebouncedWatcher` and hands settled paths to
/// an `IngestionSink`, tracking an in-flight set so a path already being
/// enqueued isn't re-enqueued by a stray event that arrives mid-flight.
pub struct PdfMonitor {
    config: MonitorConfig,
    sink: Arc<dyn IngestionSink>,
    in_flight: Arc<Mutex<HashSet<PathBuf>>>,
    events_tx: broadcast::Sender<WatchEvent>,
}

impl PdfMonitor {
    pub fn new(config: MonitorConfig, sink: Arc<dyn IngestionSink>) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self { config, sink, in_flight: Arc::new(Mutex::new(HashSet::new())), events_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events_tx.subscribe()
    }

    /// Runs until `shutdown` resolves. Performs the startup scan first, then
    /// polls the filesystem watcher on `POLL_INTERVAL` until told to stop.
    pub async fn run(&self, mut shutdown: tokio::sync::oneshot::Receiver<()>) -> anyhow::Result<()> {
        let mut watcher = DebouncedWatcher::new(self.config.debounce)?;
        for root in &self.config.roots {
            watcher.watch(root)?;
        }

        for root in &self.config.roots {
            for path in scan_existing(root) {
                self.dispatch(path);
            }
        }

        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for path in watcher.poll_ready() {
                        self.dispatch(path);
                    }
                }
                _ = &mut shutdown => {
                    info!("pdf monitor shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Dispatches one settled path to the sink on its own task, guarded by
    /// the in-flight set so a re-triggered event for the same path while the
    /// first enqueue is still running is silently dropped rather than
    /// double-processed (§4.9 dedup).
    fn dispatch(&self, path: PathBuf) {
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if !in_flight.insert(path.clone()) {
                return;
            }
        }

        let sink = self.sink.clone();
        let in_flight = self.in_flight.clone();
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = sink.enqueue(path.clone()).await;
            in_flight.lock().unwrap().remove(&path);
            match result {
                Ok(()) => {
                    let _ = events_tx.send(WatchEvent::Enqueued { path });
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "enqueue failed, will retry on next modify event");
                    let _ = events_tx.send(WatchEvent::EnqueueFailed { path, error: err.to_string() });
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingSink {
        calls: Arc<Mutex<Vec<PathBuf>>>,
        gate: Arc<tokio::sync::Barrier>,
    }

    #[async_trait::async_trait]
    impl IngestionSink for RecordingSink {
        async fn enqueue(&self, path: PathBuf) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(path);
            self.gate.wait().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatch_skips_a_path_already_in_flight() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let gate = Arc::new(tokio::sync::Barrier::new(2));
        let sink = Arc::new(RecordingSink { calls: calls.clone(), gate: gate.clone() });
        let monitor = PdfMonitor::new(MonitorConfig::default(), sink);

        let path = PathBuf::from("/tmp/paper.pdf");
        monitor.dispatch(path.clone());
        monitor.dispatch(path.clone());

        // Release the in-flight call; the second dispatch should never have
        // been recorded since the path was already in the in-flight set.
        gate.wait().await;
        tokio::task::yield_now().await;

        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dispatch_allows_reprocessing_once_prior_call_completes() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let gate = Arc::new(tokio::sync::Barrier::new(2));
        let sink = Arc::new(RecordingSink { calls: calls.clone(), gate: gate.clone() });
        let monitor = PdfMonitor::new(MonitorConfig::default(), sink);

        let path = PathBuf::from("/tmp/paper.pdf");
        monitor.dispatch(path.clone());
        gate.wait().await;
        tokio::task::yield_now().await;

        monitor.dispatch(path.clone());
        gate.wait().await;
        tokio::task::yield_now().await;

        assert_eq!(calls.lock().unwrap().len(), 2);
    }
}
