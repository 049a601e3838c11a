use super::OutputHandler;
use crate::error::Result;
use crate::fetcher::FetchedBody;
use async_trait::async_trait;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct Record<'a> {
    address: &'a str,
    status: u16,
    bytes: usize,
    body: String,
    fetched_at: String,
}

/// One JSON object per line. Lines written by tasks that outlive the report stay valid.
pub struct JsonlOutput {
    file: File,
}

impl JsonlOutput {
    pub fn new(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self { file })
    }
}

#[async_trait]
impl OutputHandler for JsonlOutput {
    async fn write(&mut self, fetched: &FetchedBody) -> Result<()> {
        let record = Record {
            address: &fetched.address,
            status: fetched.status,
            bytes: fetched.body.len(),
            body: fetched.text(),
            fetched_at: chrono::Utc::now().to_rfc3339(),
        };
        serde_json::to_writer(&mut self.file, &record)?;
        writeln!(self.file)?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}
