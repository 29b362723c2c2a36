//! Process-wide execution counters and a rolling one-minute throughput window.
//!
//! Grounded on `cache/workflow_cache.rs`'s `Arc<RwLock<...>>` shared-state shape
//! and its `cleanup_expired` pattern of pruning timestamped entries — here the
//! window prunes entries older than `now - 60s` on every record instead of on
//! a periodic sweep, since records are frequent enough that a dedicated
//! cleanup task would add little.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::models::MetricsSnapshot;

#[derive(Default)]
struct Inner {
    total: u64,
    successes: u64,
    failures: u64,
    cumulative_duration_ms: u128,
    recent_runs: VecDeque<DateTime<Utc>>,
}

/// Shared metrics sink. Cheap to clone — wraps an `Arc`.
#[derive(Clone)]
pub struct MetricsSink {
    inner: Arc<RwLock<Inner>>,
}

impl Default for MetricsSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Records the outcome of one firing attempt.
    pub async fn record(&self, success: bool, duration_ms: i64) {
        let now = Utc::now();
        let mut inner = self.inner.write().await;

        inner.total += 1;
        if success {
            inner.successes += 1;
        } else {
            inner.failures += 1;
        }
        inner.cumulative_duration_ms += duration_ms.max(0) as u128;
        inner.recent_runs.push_back(now);

        let cutoff = now - Duration::seconds(60);
        while matches!(inner.recent_runs.front(), Some(ts) if *ts < cutoff) {
            inner.recent_runs.pop_front();
        }
    }

    /// A point-in-time snapshot, safe to expose directly on the metrics endpoint.
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.read().await;

        let success_rate_percent = if inner.total == 0 {
            0.0
        } else {
            (inner.successes as f64 / inner.total as f64) * 100.0
        };

        let average_execution_ms = if inner.total == 0 {
            0.0
        } else {
            inner.cumulative_duration_ms as f64 / inner.total as f64
        };

        MetricsSnapshot {
            total_tasks_executed: inner.total,
            successful_tasks: inner.successes,
            failed_tasks: inner.failures,
            success_rate_percent,
            average_execution_ms,
            tasks_per_minute: inner.recent_runs.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_computes_rate_and_average() {
        let sink = MetricsSink::new();
        sink.record(true, 100).await;
        sink.record(false, 300).await;

        let snap = sink.snapshot().await;
        assert_eq!(snap.total_tasks_executed, 2);
        assert_eq!(snap.successful_tasks, 1);
        assert_eq!(snap.failed_tasks, 1);
        assert_eq!(snap.success_rate_percent, 50.0);
        assert_eq!(snap.average_execution_ms, 200.0);
        assert_eq!(snap.tasks_per_minute, 2);
    }

    #[tokio::test]
    async fn empty_sink_reports_zeroed_snapshot() {
        let sink = MetricsSink::new();
        let snap = sink.snapshot().await;
        assert_eq!(snap.total_tasks_executed, 0);
        assert_eq!(snap.success_rate_percent, 0.0);
        assert_eq!(snap.average_execution_ms, 0.0);
    }
}
