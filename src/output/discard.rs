use super::OutputHandler;
use crate::error::Result;
use crate::fetcher::FetchedBody;
use async_trait::async_trait;

pub struct DiscardOutput;

#[async_trait]
impl OutputHandler for DiscardOutput {
    async fn write(&mut self, _fetched: &FetchedBody) -> Result<()> {
        Ok(())
    }
}
