use chrono::{DateTime, Utc};
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};
use tracing::info;

#[derive(Debug)]
struct InnerStats {
    rows_ingested: AtomicU64,
    batches_appended: AtomicU64,
    bytes_appended: AtomicU64,
    local_nanos: AtomicU64,
    remote_nanos: AtomicU64,
    started: Instant,
    started_at: DateTime<Utc>,
}

/// Run-wide counters shared by every worker. Clones share the counters; all
/// updates are commutative so worker completion order does not matter.
#[derive(Debug, Clone)]
pub struct IngestStats {
    inner: Arc<InnerStats>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub rows_ingested: u64,
    pub batches_appended: u64,
    pub bytes_appended: u64,
    /// Summed over workers, so it may exceed `elapsed`.
    pub local_duration: Duration,
    pub remote_duration: Duration,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// `local_duration / elapsed`, the effective parallelism of processing.
    pub local_ratio: f64,
    pub remote_ratio: f64,
}

impl StatsSnapshot {
    pub fn rows_per_second(&self) -> f64 {
        if self.elapsed.is_zero() {
            0.0
        } else {
            self.rows_ingested as f64 / self.elapsed.as_secs_f64()
        }
    }
}

impl IngestStats {
    pub fn new() -> Self {
        IngestStats {
            inner: Arc::new(InnerStats {
                rows_ingested: AtomicU64::new(0),
                batches_appended: AtomicU64::new(0),
                bytes_appended: AtomicU64::new(0),
                local_nanos: AtomicU64::new(0),
                remote_nanos: AtomicU64::new(0),
                started: Instant::now(),
                started_at: Utc::now(),
            }),
        }
    }

    pub fn add_rows(&self, count: u64) {
        self.inner.rows_ingested.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_batch(&self, bytes: u64) {
        self.inner.batches_appended.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_appended.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_local(&self, elapsed: Duration) {
        self.inner
            .local_nanos
            .fetch_add(as_nanos(elapsed), Ordering::Relaxed);
    }

    pub fn record_remote(&self, elapsed: Duration) {
        self.inner
            .remote_nanos
            .fetch_add(as_nanos(elapsed), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let elapsed = self.inner.started.elapsed();
        let local_duration = Duration::from_nanos(self.inner.local_nanos.load(Ordering::Relaxed));
        let remote_duration =
            Duration::from_nanos(self.inner.remote_nanos.load(Ordering::Relaxed));

        StatsSnapshot {
            rows_ingested: self.inner.rows_ingested.load(Ordering::Relaxed),
            batches_appended: self.inner.batches_appended.load(Ordering::Relaxed),
            bytes_appended: self.inner.bytes_appended.load(Ordering::Relaxed),
            local_duration,
            remote_duration,
            started_at: self.inner.started_at,
            elapsed,
            local_ratio: ratio(local_duration, elapsed),
            remote_ratio: ratio(remote_duration, elapsed),
        }
    }

    /// Logs the current totals and returns them.
    pub fn report(&self) -> StatsSnapshot {
        let snap = self.snapshot();
        info!(
            rows = snap.rows_ingested,
            batches = snap.batches_appended,
            bytes = snap.bytes_appended,
            elapsed = ?snap.elapsed,
            rows_per_sec = format!("{:.1}", snap.rows_per_second()),
            "Ingested {} rows in {:?}",
            snap.rows_ingested,
            snap.elapsed
        );
        info!(
            duration = ?snap.local_duration,
            parallelization = format!("{:.2}", snap.local_ratio),
            "Process duration"
        );
        info!(
            duration = ?snap.remote_duration,
            parallelization = format!("{:.2}", snap.remote_ratio),
            "Request duration"
        );
        snap
    }
}

impl Default for IngestStats {
    fn default() -> Self {
        Self::new()
    }
}

fn as_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

fn ratio(part: Duration, whole: Duration) -> f64 {
    if whole.is_zero() {
        0.0
    } else {
        part.as_secs_f64() / whole.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_shared_by_clones() {
        let stats = IngestStats::new();
        let worker = stats.clone();

        worker.add_rows(2);
        stats.add_rows(1);
        worker.add_batch(10);
        worker.add_batch(5);

        let snap = stats.snapshot();
        assert_eq!(snap.rows_ingested, 3);
        assert_eq!(snap.batches_appended, 2);
        assert_eq!(snap.bytes_appended, 15);
    }

    #[test]
    fn test_durations_accumulate() {
        let stats = IngestStats::new();
        stats.record_local(Duration::from_millis(30));
        stats.record_local(Duration::from_millis(20));
        stats.record_remote(Duration::from_millis(7));

        let snap = stats.snapshot();
        assert_eq!(snap.local_duration, Duration::from_millis(50));
        assert_eq!(snap.remote_duration, Duration::from_millis(7));
        assert!(snap.local_ratio >= 0.0);
    }

    #[test]
    fn test_ratio_of_zero_elapsed() {
        assert_eq!(ratio(Duration::from_secs(1), Duration::ZERO), 0.0);
        assert_eq!(
            ratio(Duration::from_secs(3), Duration::from_secs(2)),
            1.5
        );
    }

    #[test]
    fn test_snapshots_are_monotonic() {
        let stats = IngestStats::new();
        stats.add_rows(5);
        let first = stats.report();
        stats.add_rows(1);
        let second = stats.snapshot();
        assert!(second.rows_ingested >= first.rows_ingested);
        assert!(second.elapsed >= first.elapsed);
        assert_eq!(first.started_at, second.started_at);
    }
}
