use super::OutputHandler;
use crate::error::Result;
use crate::fetcher::FetchedBody;
use async_trait::async_trait;
use std::path::PathBuf;

/// `address,status,bytes` rows, header first.
pub struct CsvOutput {
    writer: csv::Writer<std::fs::File>,
}

impl CsvOutput {
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["address", "status", "bytes"])?;
        writer.flush()?;
        Ok(Self { writer })
    }
}

#[async_trait]
impl OutputHandler for CsvOutput {
    async fn write(&mut self, fetched: &FetchedBody) -> Result<()> {
        let status = fetched.status.to_string();
        let bytes = fetched.body.len().to_string();
        self.writer
            .write_record([fetched.address.as_str(), status.as_str(), bytes.as_str()])?;
        // Rows from abandoned tasks must land even if close is never reached.
        self.writer.flush()?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
