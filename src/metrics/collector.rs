use crate::metrics::snapshot::MetricsSnapshot;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, RwLock,
};
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct MetricsCollector {
    addresses_queued: Arc<AtomicU64>,
    fetches_succeeded: Arc<AtomicU64>,
    fetches_failed: Arc<AtomicU64>,
    active_tasks: Arc<AtomicU64>,
    bytes_received: Arc<AtomicU64>,
    total_response_time_ms: Arc<AtomicU64>,
    start_time: Arc<RwLock<Instant>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            addresses_queued: Arc::new(AtomicU64::new(0)),
            fetches_succeeded: Arc::new(AtomicU64::new(0)),
            fetches_failed: Arc::new(AtomicU64::new(0)),
            active_tasks: Arc::new(AtomicU64::new(0)),
            bytes_received: Arc::new(AtomicU64::new(0)),
            total_response_time_ms: Arc::new(AtomicU64::new(0)),
            start_time: Arc::new(RwLock::new(Instant::now())),
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restarts the clock behind `elapsed_seconds` and `requests_per_second`.
    pub fn mark_started(&self) {
        let mut start = self.start_time.write().unwrap_or_else(|e| e.into_inner());
        *start = Instant::now();
    }

    pub fn increment_addresses_queued(&self) {
        self.addresses_queued.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_active_tasks(&self) {
        self.active_tasks.fetch_add(1, Ordering::SeqCst);
    }

    pub fn decrement_active_tasks(&self) {
        self.active_tasks.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn record_success(&self, duration: Duration, bytes: usize) {
        self.fetches_succeeded.fetch_add(1, Ordering::SeqCst);
        self.bytes_received.fetch_add(bytes as u64, Ordering::SeqCst);
        self.total_response_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn record_failure(&self, duration: Duration) {
        self.fetches_failed.fetch_add(1, Ordering::SeqCst);
        self.total_response_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let success = self.fetches_succeeded.load(Ordering::SeqCst);
        let failed = self.fetches_failed.load(Ordering::SeqCst);
        let finished = success + failed;
        let total_time = self.total_response_time_ms.load(Ordering::SeqCst);

        let success_rate = if finished > 0 {
            (success as f64 / finished as f64) * 100.0
        } else {
            0.0
        };

        let avg_response_time_ms = if finished > 0 { total_time / finished } else { 0 };

        let elapsed = self
            .start_time
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
            .as_secs_f64();

        MetricsSnapshot {
            addresses_queued: self.addresses_queued.load(Ordering::SeqCst),
            fetches_finished: finished,
            fetches_succeeded: success,
            fetches_failed: failed,
            active_tasks: self.active_tasks.load(Ordering::SeqCst),
            bytes_received: self.bytes_received.load(Ordering::SeqCst),
            success_rate,
            avg_response_time_ms,
            requests_per_second: if elapsed > 0.0 {
                finished as f64 / elapsed
            } else {
                0.0
            },
            elapsed_seconds: elapsed,
        }
    }
}
