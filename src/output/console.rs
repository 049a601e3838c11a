use super::OutputHandler;
use crate::error::{Error, Result};
use crate::fetcher::FetchedBody;
use async_trait::async_trait;
use indicatif::MultiProgress;
use std::io::Write;
use std::sync::Arc;

/// Writes each body to stdout followed by a newline.
pub struct ConsoleOutput {
    multi: Option<Arc<MultiProgress>>,
}

impl ConsoleOutput {
    pub fn new(multi: Option<Arc<MultiProgress>>) -> Self {
        Self { multi }
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl OutputHandler for ConsoleOutput {
    async fn write(&mut self, fetched: &FetchedBody) -> Result<()> {
        if let Some(multi) = &self.multi {
            multi
                .println(fetched.text())
                .map_err(|e| Error::Internal(e.to_string()))?;
        } else {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&fetched.body)?;
            writeln!(stdout)?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        std::io::stdout().flush()?;
        Ok(())
    }
}
