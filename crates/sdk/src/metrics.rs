//! Registry metrics for observability.
//!
//! This module provides a pluggable metrics trait (`RegistryMetrics`) that callers
//! can implement to collect telemetry from the registry client. Two implementations
//! are included:
//!
//! - [`NoopRegistryMetrics`]: Zero-overhead default that discards all metrics.
//! - [`MetricsRegistryMetrics`]: Integration with the [`metrics`](https://docs.rs/metrics) crate
//!   facade, forwarding to whatever recorder is installed (Prometheus, StatsD, etc.).
//!
//! # Metric Names
//!
//! All metrics follow the `committee_ledger_` prefix convention:
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `committee_ledger_joins_total` | Counter | `status` | Join attempts by outcome |
//! | `committee_ledger_index_conflicts_total` | Counter | | Index writes rejected by a moved version |
//! | `committee_ledger_skipped_entries_total` | Counter | `reason` | Index entries skipped while loading |
//! | `committee_ledger_load_duration_seconds` | Histogram | | Full committee load latency |

use std::{fmt, sync::Arc, time::Duration};

/// Why the reader dropped an index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The record key is absent or empty.
    Missing,
    /// The record bytes did not decode.
    Undecodable,
    /// Reading the record failed even after retries.
    ReadFailed,
    /// The id already appeared earlier in the index.
    Duplicate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::Undecodable => write!(f, "undecodable"),
            Self::ReadFailed => write!(f, "read_failed"),
            Self::Duplicate => write!(f, "duplicate"),
        }
    }
}

/// Trait for registry metrics collection.
///
/// All methods have default no-op implementations, so you only need to
/// override the metrics you care about.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` since a single instance is shared by the
/// reader, the writer and the session.
pub trait RegistryMetrics: Send + Sync + fmt::Debug {
    /// Records the outcome of a join.
    ///
    /// - `status`: `"success"` or the [`error_type`](crate::SdkError::error_type) of the failure.
    fn record_join(&self, status: &str) {
        let _ = status;
    }

    /// Records an index write rejected because another writer moved the version.
    fn record_index_conflict(&self) {}

    /// Records an index entry skipped by the reader.
    fn record_skipped_entry(&self, reason: SkipReason) {
        let _ = reason;
    }

    /// Records the wall-clock time of a full committee load.
    fn record_load(&self, duration: Duration) {
        let _ = duration;
    }
}

/// No-op metrics implementation with zero overhead.
#[derive(Debug, Clone, Copy)]
pub struct NoopRegistryMetrics;

impl RegistryMetrics for NoopRegistryMetrics {}

/// Metrics implementation using the [`metrics`](https://docs.rs/metrics) crate facade.
#[derive(Debug, Clone, Copy)]
pub struct MetricsRegistryMetrics;

/// Metric name constants for the `metrics` crate facade.
mod metric_names {
    /// Join attempts by outcome.
    pub const JOINS_TOTAL: &str = "committee_ledger_joins_total";
    /// Index writes rejected by a moved version.
    pub const INDEX_CONFLICTS_TOTAL: &str = "committee_ledger_index_conflicts_total";
    /// Index entries skipped while loading.
    pub const SKIPPED_ENTRIES_TOTAL: &str = "committee_ledger_skipped_entries_total";
    /// Committee load duration distribution.
    pub const LOAD_DURATION: &str = "committee_ledger_load_duration_seconds";
}

impl RegistryMetrics for MetricsRegistryMetrics {
    fn record_join(&self, status: &str) {
        metrics::counter!(metric_names::JOINS_TOTAL, "status" => status.to_owned()).increment(1);
    }

    fn record_index_conflict(&self) {
        metrics::counter!(metric_names::INDEX_CONFLICTS_TOTAL).increment(1);
    }

    fn record_skipped_entry(&self, reason: SkipReason) {
        metrics::counter!(metric_names::SKIPPED_ENTRIES_TOTAL, "reason" => reason.to_string())
            .increment(1);
    }

    fn record_load(&self, duration: Duration) {
        metrics::histogram!(metric_names::LOAD_DURATION).record(duration.as_secs_f64());
    }
}

/// Creates the default metrics instance (no-op).
pub(crate) fn default_metrics() -> Arc<dyn RegistryMetrics> {
    Arc::new(NoopRegistryMetrics)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    #[derive(Debug, Default)]
    struct CountingMetrics {
        joins: AtomicU64,
        conflicts: AtomicU64,
        skipped: AtomicU64,
        loads: AtomicU64,
    }

    impl RegistryMetrics for CountingMetrics {
        fn record_join(&self, _status: &str) {
            self.joins.fetch_add(1, Ordering::Relaxed);
        }
        fn record_index_conflict(&self) {
            self.conflicts.fetch_add(1, Ordering::Relaxed);
        }
        fn record_skipped_entry(&self, _reason: SkipReason) {
            self.skipped.fetch_add(1, Ordering::Relaxed);
        }
        fn record_load(&self, _duration: Duration) {
            self.loads.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn noop_is_default() {
        let metrics = default_metrics();
        metrics.record_join("success");
        metrics.record_load(Duration::from_millis(1));
    }

    #[test]
    fn trait_object_via_arc() {
        let counting = Arc::new(CountingMetrics::default());
        let metrics: Arc<dyn RegistryMetrics> = counting.clone();

        metrics.record_join("success");
        metrics.record_index_conflict();
        metrics.record_skipped_entry(SkipReason::Undecodable);
        metrics.record_load(Duration::from_millis(5));

        assert_eq!(counting.joins.load(Ordering::Relaxed), 1);
        assert_eq!(counting.conflicts.load(Ordering::Relaxed), 1);
        assert_eq!(counting.skipped.load(Ordering::Relaxed), 1);
        assert_eq!(counting.loads.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn metrics_facade_does_not_panic_without_recorder() {
        let metrics = MetricsRegistryMetrics;
        metrics.record_join("user_rejected");
        metrics.record_index_conflict();
        metrics.record_skipped_entry(SkipReason::Missing);
        metrics.record_load(Duration::from_millis(10));
    }

    #[test]
    fn skip_reason_labels() {
        assert_eq!(SkipReason::Missing.to_string(), "missing");
        assert_eq!(SkipReason::Undecodable.to_string(), "undecodable");
        assert_eq!(SkipReason::ReadFailed.to_string(), "read_failed");
        assert_eq!(SkipReason::Duplicate.to_string(), "duplicate");
    }
}
