//! Component G: a best-effort counter of symbol lookups that found nothing.
//!
//! Keys are prefixed by the calendar date so retention is just a TTL per
//! entry (two days, letting yesterday's CSV export run any time today).
//! Counting is advisory: under contention an increment may be lost, which
//! is an acceptable tradeoff for a best-effort diagnostic counter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::{Cache, CacheBuilder};
use serde::{Deserialize, Serialize};

const RETENTION: Duration = Duration::from_secs(2 * 24 * 60 * 60);

/// One miss, identified the way the download facade's query string names it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MissingSymbolKey {
    pub date: String,
    pub debug_file: String,
    pub debug_id: String,
    pub symbol_filename: String,
    pub code_file: String,
    pub code_id: String,
}

/// A snapshot row suitable for the CSV exporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingSymbolRow {
    pub debug_file: String,
    pub debug_id: String,
    pub code_file: String,
    pub code_id: String,
    pub count: u64,
}

pub struct MissingLogSink {
    inner: Cache<MissingSymbolKey, Arc<AtomicU64>>,
}

impl MissingLogSink {
    pub fn new() -> Self {
        let inner = CacheBuilder::new(100_000).time_to_live(RETENTION).build();
        MissingLogSink { inner }
    }

    /// Records one miss for `date` (the caller supplies today's date so the
    /// sink stays independent of wall-clock access).
    pub fn record(
        &self,
        date: &str,
        debug_file: &str,
        debug_id: &str,
        symbol_filename: &str,
        code_file: &str,
        code_id: &str,
    ) {
        let key = MissingSymbolKey {
            date: date.to_string(),
            debug_file: debug_file.to_string(),
            debug_id: debug_id.to_string(),
            symbol_filename: symbol_filename.to_string(),
            code_file: code_file.to_string(),
            code_id: code_id.to_string(),
        };
        let counter = self.inner.get_with(key, || Arc::new(AtomicU64::new(0)));
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// All rows recorded for `date`, for the CSV exporter.
    pub fn rows_for_date(&self, date: &str) -> Vec<MissingSymbolRow> {
        self.inner
            .iter()
            .filter(|(key, _)| key.date == date)
            .map(|(key, counter)| MissingSymbolRow {
                debug_file: key.debug_file.clone(),
                debug_id: key.debug_id.clone(),
                code_file: key.code_file.clone(),
                code_id: key.code_id.clone(),
                count: counter.load(Ordering::Relaxed),
            })
            .collect()
    }
}

impl Default for MissingLogSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_reports_a_miss() {
        let sink = MissingLogSink::new();
        sink.record("2024-01-01", "foo.pdb", "ABCD", "foo.sym", "foo.dll", "123");
        let rows = sink.rows_for_date("2024-01-01");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 1);
    }

    #[test]
    fn repeated_misses_increment_the_same_row() {
        let sink = MissingLogSink::new();
        for _ in 0..3 {
            sink.record("2024-01-01", "foo.pdb", "ABCD", "foo.sym", "", "");
        }
        let rows = sink.rows_for_date("2024-01-01");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 3);
    }

    #[test]
    fn rows_are_scoped_by_date() {
        let sink = MissingLogSink::new();
        sink.record("2024-01-01", "foo.pdb", "ABCD", "foo.sym", "", "");
        sink.record("2024-01-02", "foo.pdb", "ABCD", "foo.sym", "", "");
        assert_eq!(sink.rows_for_date("2024-01-01").len(), 1);
        assert_eq!(sink.rows_for_date("2024-01-02").len(), 1);
        assert_eq!(sink.rows_for_date("2024-01-03").len(), 0);
    }

    #[test]
    fn distinct_code_file_ids_are_distinct_rows() {
        let sink = MissingLogSink::new();
        sink.record("2024-01-01", "foo.pdb", "ABCD", "foo.sym", "a.dll", "1");
        sink.record("2024-01-01", "foo.pdb", "ABCD", "foo.sym", "b.dll", "2");
        assert_eq!(sink.rows_for_date("2024-01-01").len(), 2);
    }
}
