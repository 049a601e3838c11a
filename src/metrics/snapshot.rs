use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub addresses_queued: u64,
    pub fetches_finished: u64,
    pub fetches_succeeded: u64,
    pub fetches_failed: u64,
    pub active_tasks: u64,
    pub bytes_received: u64,
    pub success_rate: f64,
    pub avg_response_time_ms: u64,
    pub requests_per_second: f64,
    pub elapsed_seconds: f64,
}
