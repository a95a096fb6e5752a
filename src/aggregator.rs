use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::types::PortResult;

/// Thread-safe sink for the results produced by scan workers.
///
/// Clones share the same underlying collection, so one handle can be given to
/// every worker while the caller keeps another to read progress or the final
/// snapshot.
#[derive(Clone, Debug, Default)]
pub struct ResultAggregator {
    results: Arc<Mutex<Vec<PortResult>>>,
    submitted: Arc<AtomicU64>,
    open_count: Arc<AtomicU64>,
    notify_open: Option<mpsc::UnboundedSender<PortResult>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also forward every open result to `tx` as soon as it is submitted.
    pub fn with_open_notifier(tx: mpsc::UnboundedSender<PortResult>) -> Self {
        Self {
            notify_open: Some(tx),
            ..Self::default()
        }
    }

    /// Append one result. Safe to call from many tasks at once.
    pub async fn submit(&self, result: PortResult) {
        if result.is_open() {
            self.open_count.fetch_add(1, Ordering::Relaxed);
            if let Some(tx) = &self.notify_open {
                // A dropped receiver only means nobody is watching progress.
                let _ = tx.send(result.clone());
            }
        }
        let mut guard = self.results.lock().await;
        guard.push(result);
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of results submitted so far.
    pub fn len(&self) -> usize {
        self.submitted.load(Ordering::Relaxed) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn open_count(&self) -> u64 {
        self.open_count.load(Ordering::Relaxed)
    }

    /// Every submitted result sorted by ascending port.
    ///
    /// Only meaningful once the scan feeding this aggregator has completed.
    pub async fn snapshot(&self) -> Vec<PortResult> {
        self.snapshot_since(0).await
    }

    /// Position of the next submission. Pass it to [`Self::snapshot_since`] to
    /// read back only what was submitted afterwards.
    pub async fn mark(&self) -> usize {
        self.results.lock().await.len()
    }

    /// Results submitted after `mark`, sorted by ascending port.
    pub async fn snapshot_since(&self, mark: usize) -> Vec<PortResult> {
        let guard = self.results.lock().await;
        let mut out = guard.get(mark..).unwrap_or_default().to_vec();
        drop(guard);
        out.sort_by_key(|r| r.port);
        out
    }

    /// Consume this handle and return every result sorted by port. Takes the
    /// collection without copying when no other handle is alive.
    pub async fn into_results(self) -> Vec<PortResult> {
        let mut out = match Arc::try_unwrap(self.results) {
            Ok(mutex) => mutex.into_inner(),
            Err(shared) => shared.lock().await.clone(),
        };
        out.sort_by_key(|r| r.port);
        out
    }
}
