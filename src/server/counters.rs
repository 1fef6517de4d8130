//! Per-route request counters.
//!
//! Every dispatched request increments exactly one `(path, method,
//! status)` counter, including 404s and 405s. The table is ordered so
//! the metrics exposition is stable between scrapes.

use crate::http::types::Method;
use std::collections::BTreeMap;

/// Counts served requests, keyed by request path, then method and
/// response status.
///
/// The registry holds this behind a mutex; handlers never see it
/// directly.
#[derive(Debug, Default)]
pub struct RequestCounters {
    by_path: BTreeMap<String, BTreeMap<(Method, u16), u64>>,
}

impl RequestCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one served request.
    pub fn increment(&mut self, path: &str, method: Method, status: u16) {
        // Avoids allocating the path key on the hot path.
        if !self.by_path.contains_key(path) {
            self.by_path.insert(path.to_string(), BTreeMap::new());
        }

        if let Some(by_status) = self.by_path.get_mut(path) {
            *by_status.entry((method, status)).or_insert(0) += 1;
        }
    }

    /// Number of distinct `(path, method, status)` entries.
    pub fn entry_count(&self) -> usize {
        self.by_path.values().map(BTreeMap::len).sum()
    }

    /// Sum of path byte lengths over all entries, for exposition size
    /// estimates.
    pub fn path_bytes(&self) -> usize {
        self.by_path
            .iter()
            .map(|(path, by_status)| path.len() * by_status.len())
            .sum()
    }

    /// Iterates all counters in stable order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Method, u16, u64)> {
        self.by_path.iter().flat_map(|(path, by_status)| {
            by_status
                .iter()
                .map(move |(&(method, status), &count)| (path.as_str(), method, status, count))
        })
    }
}
