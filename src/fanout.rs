use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::metrics::collector::MetricsCollector;
use crate::metrics::snapshot::MetricsSnapshot;
use crate::output::SharedOutput;
use crate::source::{Address, AddressSource, AddressStream};
use futures::future::join_all;
use futures::stream::StreamExt;
use serde::Serialize;
use std::fmt;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch};
use tokio::time::sleep;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Idle,
    FanningOut,
    Completed,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every fetch task finished before the deadline.
    Completed,
    /// The deadline fired first. Tasks still in flight were abandoned, not cancelled.
    TimedOut,
}

impl From<BatchOutcome> for BatchStatus {
    fn from(outcome: BatchOutcome) -> Self {
        match outcome {
            BatchOutcome::Completed => BatchStatus::Completed,
            BatchOutcome::TimedOut => BatchStatus::TimedOut,
        }
    }
}

/// Shared counters of one batch. Only fetch tasks spawned by the engine write to it.
#[derive(Debug, Default)]
pub struct BatchState {
    successes: AtomicU64,
    launched: AtomicU64,
}

impl BatchState {
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn launched(&self) -> u64 {
        self.launched.load(Ordering::SeqCst)
    }

    fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn record_launch(&self) {
        self.launched.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub outcome: BatchOutcome,
    /// Success count at the moment the report was taken.
    pub successes: u64,
    pub launched: u64,
    pub elapsed_ms: u64,
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.outcome {
            BatchOutcome::Completed => "completed",
            BatchOutcome::TimedOut => "timed out",
        };
        write!(
            f,
            "{}: {} of {} fetches succeeded in {}ms",
            state, self.successes, self.launched, self.elapsed_ms
        )
    }
}

/// Drives a single batch: one task per address, raced against a fixed deadline.
pub struct FanOutEngine {
    deadline: Duration,
    metrics: Arc<MetricsCollector>,
    batch: Arc<BatchState>,
    state_watcher: watch::Sender<BatchStatus>,
}

impl FanOutEngine {
    pub fn new(deadline: Duration, metrics: Option<Arc<MetricsCollector>>) -> Self {
        let (state_tx, _) = watch::channel(BatchStatus::Idle);

        Self {
            deadline,
            metrics: metrics.unwrap_or_else(|| Arc::new(MetricsCollector::new())),
            batch: Arc::new(BatchState::default()),
            state_watcher: state_tx,
        }
    }

    /// Opens `source` and fans out over its addresses.
    ///
    /// A source that cannot be opened aborts the batch before any task is launched.
    pub async fn run(
        &self,
        source: &dyn AddressSource,
        fetcher: Arc<dyn Fetcher>,
        output: SharedOutput,
    ) -> Result<BatchReport> {
        let addresses = source.open().await?;
        self.run_addresses(addresses, fetcher, output).await
    }

    pub async fn run_addresses(
        &self,
        mut addresses: AddressStream,
        fetcher: Arc<dyn Fetcher>,
        output: SharedOutput,
    ) -> Result<BatchReport> {
        let started = self.state_watcher.send_if_modified(|state| {
            if *state == BatchStatus::Idle {
                *state = BatchStatus::FanningOut;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(Error::Internal(
                "engine has already run a batch".to_string(),
            ));
        }

        self.metrics.mark_started();
        let start_time = Instant::now();
        let mut handles = Vec::new();

        while let Some(address) = addresses.next().await {
            self.metrics.increment_addresses_queued();
            self.batch.record_launch();
            handles.push(tokio::spawn(fetch_one(
                address,
                fetcher.clone(),
                output.clone(),
                self.batch.clone(),
                self.metrics.clone(),
            )));
        }
        log::debug!("Launched {} fetch tasks", handles.len());

        let outcome = if handles.is_empty() {
            log::info!("Got all results");
            BatchOutcome::Completed
        } else {
            let (done_tx, done_rx) = oneshot::channel();
            tokio::spawn(async move {
                for result in join_all(handles).await {
                    if let Err(e) = result {
                        log::error!("Fetch task failed to finish: {}", e);
                    }
                }
                let _ = done_tx.send(());
            });

            tokio::select! {
                biased;
                _ = done_rx => {
                    log::info!("Got all results");
                    BatchOutcome::Completed
                }
                _ = sleep(self.deadline) => {
                    log::info!("Timed out");
                    BatchOutcome::TimedOut
                }
            }
        };

        let report = BatchReport {
            outcome,
            successes: self.batch.successes(),
            launched: self.batch.launched(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        };
        log::info!("Got {} results", report.successes);

        self.state_watcher.send_replace(outcome.into());
        Ok(report)
    }

    /// Live success count. Keeps growing after a timed-out report while abandoned tasks finish.
    pub fn successes(&self) -> u64 {
        self.batch.successes()
    }

    pub fn status(&self) -> BatchStatus {
        *self.state_watcher.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<BatchStatus> {
        self.state_watcher.subscribe()
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn watch_metrics(&self) -> watch::Receiver<MetricsSnapshot> {
        let (tx, rx) = watch::channel(self.metrics.snapshot());
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(500));
            loop {
                interval.tick().await;
                if tx.send(metrics.snapshot()).is_err() {
                    break;
                }
            }
        });
        rx
    }
}

async fn fetch_one(
    address: Address,
    fetcher: Arc<dyn Fetcher>,
    output: SharedOutput,
    batch: Arc<BatchState>,
    metrics: Arc<MetricsCollector>,
) {
    metrics.increment_active_tasks();
    let start_time = Instant::now();

    match fetcher.fetch(&address).await {
        Ok(fetched) => {
            let duration = start_time.elapsed();
            if let Err(e) = output.lock().await.write(&fetched).await {
                log::warn!("Failed to write body of {}: {}", address, e);
            }
            metrics.record_success(duration, fetched.body.len());
            batch.record_success();
        }
        Err(e) => {
            metrics.record_failure(start_time.elapsed());
            log::warn!("{}", e);
        }
    }

    metrics.decrement_active_tasks();
}
