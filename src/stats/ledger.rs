//! Cumulative byte totals keyed by request path.

use dashmap::DashMap;

use crate::observability::metrics;

/// A thread-safe map of request path -> bytes served.
///
/// Updates for one path are serialized by the map's shard lock, so concurrent
/// `record` calls never lose an increment.
#[derive(Debug, Default)]
pub struct StatsLedger {
    totals: DashMap<String, u64>,
}

impl StatsLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `bytes` to the total for `path` and return the new total.
    pub fn record(&self, path: &str, bytes: u64) -> u64 {
        // `get_mut` first so the common case does not allocate a key.
        let total = match self.totals.get_mut(path) {
            Some(mut entry) => {
                *entry = entry.saturating_add(bytes);
                *entry
            }
            None => {
                let mut entry = self.totals.entry(path.to_owned()).or_insert(0);
                *entry = entry.saturating_add(bytes);
                *entry
            }
        };

        metrics::record_bytes_tallied(bytes);
        tracing::trace!(path = %path, bytes, total, "Stats updated");
        total
    }

    /// Current total for `path`, if anything was ever recorded for it.
    pub fn get(&self, path: &str) -> Option<u64> {
        self.totals.get(path).map(|r| *r.value())
    }

    /// All totals, sorted by path.
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let mut entries: Vec<_> = self
            .totals
            .iter()
            .map(|r| (r.key().clone(), *r.value()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Number of distinct paths seen.
    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}
