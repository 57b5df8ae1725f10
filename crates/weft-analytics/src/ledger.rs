use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::debug;

use weft_core::types::LedgerEntry;

/// Fixed-capacity FIFO of per-run cost records, shared process-wide.
///
/// Append + trim happens under one lock acquisition so concurrent runs
/// cannot double-trim.
pub struct CostLedger {
    inner: Mutex<VecDeque<LedgerEntry>>,
    capacity: usize,
}

impl CostLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Append one entry, dropping the oldest beyond capacity.
    pub fn record(&self, entry: LedgerEntry) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if inner.len() >= self.capacity {
            inner.pop_front();
        }
        debug!(cost = entry.cost, cache_hit = entry.cache_hit, "ledger entry recorded");
        inner.push_back(entry);
    }

    /// Snapshot of all entries, oldest first.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.inner
            .lock()
            .map(|i| i.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
