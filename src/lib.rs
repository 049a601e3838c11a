pub mod config;
pub mod error;
pub mod fanout;
pub mod fetcher;
pub mod metrics;
pub mod output;
pub mod source;

pub use error::{Error, Result};
pub use fanout::{BatchOutcome, BatchReport, BatchState, BatchStatus, FanOutEngine};
pub use fetcher::{FetchedBody, Fetcher, HttpFetcher, build_client};
pub use metrics::collector::MetricsCollector;
pub use metrics::snapshot::MetricsSnapshot;
pub use source::{Address, AddressSource, AddressStream, HttpSource, StaticSource};
