//! Debounced filesystem watching (§4.9): a `notify` watcher plus a per-path
//! pending map, polled on an interval rather than blocking a dedicated
//! thread on the notify channel, so it composes with the async runtime the
//! rest of the workspace uses.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{error, warn};

/// Default per-path debounce window (§4.9: "e.g. 500 ms").
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// A pending filesystem change waiting out the debounce window.
struct Pending {
    last_seen: Instant,
    last_size: Option<u64>,
}

/// Wraps a `notify` recommended watcher with the debounce/stability state
/// machine §4.9 requires. Not `Send`-bridged across an await point on
/// purpose — callers drive it from one task via `poll_ready`.
pub struct DebouncedWatcher {
    watcher: RecommendedWatcher,
    rx: mpsc::Receiver<notify::Result<Event>>,
    roots: Vec<PathBuf>,
    pending: HashMap<PathBuf, Pending>,
    debounce: Duration,
}

impl DebouncedWatcher {
    pub fn new(debounce: Duration) -> anyhow::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let watcher = notify::recommended_watcher(tx)?;
        Ok(Self { watcher, rx, roots: Vec::new(), pending: HashMap::new(), debounce })
    }

    pub fn watch(&mut self, root: &Path) -> anyhow::Result<()> {
        self.watcher.watch(root, RecursiveMode::Recursive)?;
        self.roots.push(root.to_path_buf());
        Ok(())
    }

    /// Tear down and recreate the underlying watcher against the same
    /// roots (§4.9: "watcher errors are logged and the watcher is
    /// re-established").
    pub fn reestablish(&mut self) -> anyhow::Result<()> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(tx)?;
        for root in &self.roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
        }
        self.watcher = watcher;
        self.rx = rx;
        Ok(())
    }

    /// Drain raw notify events into the pending map, then return the paths
    /// whose debounce window has elapsed and whose size has stopped
    /// changing since the last check. Paths still settling, or that
    /// changed size again, stay pending.
    pub fn poll_ready(&mut self) -> Vec<PathBuf> {
        self.drain_raw_events();

        let now = Instant::now();
        let mut ready = Vec::new();
        let mut still_pending = HashMap::new();

        for (path, pending) in self.pending.drain() {
            if now.duration_since(pending.last_seen) < self.debounce {
                still_pending.insert(path, pending);
                continue;
            }

            match std::fs::metadata(&path) {
                Ok(meta) if meta.is_file() => {
                    let size = meta.len();
                    if pending.last_size == Some(size) {
                        ready.push(path);
                    } else {
                        still_pending.insert(path, Pending { last_seen: now, last_size: Some(size) });
                    }
                }
                Ok(_) => {
                    // Became a directory or disappeared mid-debounce; drop it.
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "file unreadable after debounce window, will retry on next event");
                }
            }
        }

        self.pending = still_pending;
        ready
    }

    fn drain_raw_events(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(Ok(event)) => self.record_event(event),
                Ok(Err(err)) => {
                    error!(error = %err, "filesystem watcher error, re-establishing watch");
                    if let Err(err) = self.reestablish() {
                        error!(error = %err, "failed to re-establish filesystem watcher");
                    }
                    break;
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    error!("filesystem watcher channel disconnected, re-establishing watch");
                    if let Err(err) = self.reestablish() {
                        error!(error = %err, "failed to re-establish filesystem watcher");
                    }
                    break;
                }
            }
        }
    }

    fn record_event(&mut self, event: Event) {
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return;
        }

        let now = Instant::now();
        for path in event.paths {
            if !is_pdf(&path) {
                continue;
            }
            let size = std::fs::metadata(&path).ok().map(|m| m.len());
            self.pending.insert(path, Pending { last_seen: now, last_size: size });
        }
    }
}

pub fn is_pdf(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()).map(|ext| ext.eq_ignore_ascii_case("pdf")).unwrap_or(false)
}

/// Recursively list every PDF already present under `root`, for the
/// startup scan (§4.9: "on start: scan the directory").
pub fn scan_existing(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "could not read directory during startup scan");
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if is_pdf(&path) {
                found.push(path);
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_pdf_matches_case_insensitively() {
        assert!(is_pdf(Path::new("/tmp/paper.pdf")));
        assert!(is_pdf(Path::new("/tmp/paper.PDF")));
        assert!(!is_pdf(Path::new("/tmp/paper.txt")));
        assert!(!is_pdf(Path::new("/tmp/paper")));
    }

    #[test]
    fn scan_existing_finds_nested_pdfs() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("sub");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF-1.4").unwrap();
        std::fs::write(nested.join("b.pdf"), b"%PDF-1.4").unwrap();
        std::fs::write(nested.join("notes.txt"), b"not a pdf").unwrap();

        let mut found = scan_existing(dir.path());
        found.sort();
        assert_eq!(found.len(), 2);
    }
}
