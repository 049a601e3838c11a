use super::OutputHandler;
use crate::error::Result;
use crate::fetcher::FetchedBody;
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Appends raw bodies to a file, one newline after each.
pub struct FileOutput {
    file: File,
}

impl FileOutput {
    pub fn new(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }
}

#[async_trait]
impl OutputHandler for FileOutput {
    async fn write(&mut self, fetched: &FetchedBody) -> Result<()> {
        self.file.write_all(&fetched.body)?;
        writeln!(self.file)?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}
