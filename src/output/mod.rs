use crate::error::Result;
use crate::fetcher::FetchedBody;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

pub mod console;
pub mod csv;
pub mod discard;
pub mod file;
pub mod jsonl;

/// Destination for drained bodies. One `write` per successful fetch.
#[async_trait]
pub trait OutputHandler: Send + Sync {
    async fn write(&mut self, fetched: &FetchedBody) -> Result<()>;
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Sink shared by every fetch task of a batch.
pub type SharedOutput = Arc<Mutex<Box<dyn OutputHandler>>>;

pub fn shared(handler: Box<dyn OutputHandler>) -> SharedOutput {
    Arc::new(Mutex::new(handler))
}
