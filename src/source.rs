use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, Response};
use url::Url;

/// A single fetch target. Opaque to the engine; duplicates are fetched independently.
pub type Address = String;

/// Lazy, finite, forward-only sequence of addresses.
pub type AddressStream = BoxStream<'static, Address>;

#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Opens the source. An error here is fatal: no fetch may be launched.
    async fn open(&self) -> Result<AddressStream>;
}

/// Fixed, in-memory list of addresses.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    addresses: Vec<Address>,
}

impl StaticSource {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Address>,
    {
        Self {
            addresses: addresses.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl AddressSource for StaticSource {
    async fn open(&self) -> Result<AddressStream> {
        Ok(stream::iter(self.addresses.clone()).boxed())
    }
}

/// Reads addresses from a lister endpoint, one per line of the response body.
pub struct HttpSource {
    client: Client,
    url: Url,
}

impl HttpSource {
    pub fn new(client: Client, url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::Source(format!("{}: {}", url, e)))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl AddressSource for HttpSource {
    async fn open(&self) -> Result<AddressStream> {
        log::info!("Fetching address list from {}", self.url);

        // Status is not inspected; any body is read as lines.
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| Error::Source(format!("{}: {}", self.url, e)))?;

        log::debug!("Address list responded with {}", response.status());
        Ok(line_stream(response, self.url.to_string()))
    }
}

struct LineReader {
    response: Option<Response>,
    buffer: LineBuffer,
    url: String,
}

fn line_stream(response: Response, url: String) -> AddressStream {
    let reader = LineReader {
        response: Some(response),
        buffer: LineBuffer::default(),
        url,
    };

    stream::unfold(reader, |mut reader| async move {
        loop {
            if let Some(line) = reader.buffer.next_line() {
                return Some((line, reader));
            }
            if reader.buffer.is_overflowing() {
                log::warn!(
                    "Address list from {} has a line longer than {} bytes; stopping",
                    reader.url,
                    MAX_LINE_LEN
                );
                return None;
            }

            let response = reader.response.as_mut()?;
            match response.chunk().await {
                Ok(Some(chunk)) => reader.buffer.push(&chunk),
                Ok(None) => {
                    reader.response = None;
                    let rest = reader.buffer.finish()?;
                    return Some((rest, reader));
                }
                Err(e) => {
                    // The unterminated tail read before the error is still an address.
                    log::warn!("Address list from {} ended early: {}", reader.url, e);
                    reader.response = None;
                    let rest = reader.buffer.finish()?;
                    return Some((rest, reader));
                }
            }
        }
    })
    .boxed()
}

/// Longest line accepted from a lister before the sequence is cut off.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Incremental `\n` splitter. A trailing `\r` is stripped from each line and a
/// final unterminated line is returned by [`LineBuffer::finish`].
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    /// Start of the first unconsumed line.
    start: usize,
    /// Bytes before this offset are known to hold no `\n` past `start`.
    scanned: usize,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) {
        if self.start > 0 {
            self.pending.drain(..self.start);
            self.scanned -= self.start;
            self.start = 0;
        }
        self.pending.extend_from_slice(bytes);
    }

    pub fn next_line(&mut self) -> Option<String> {
        match self.pending[self.scanned..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let end = self.scanned + offset;
                let line = into_line(&self.pending[self.start..end]);
                self.start = end + 1;
                self.scanned = self.start;
                Some(line)
            }
            None => {
                self.scanned = self.pending.len();
                None
            }
        }
    }

    /// True when the unterminated tail exceeds [`MAX_LINE_LEN`].
    pub fn is_overflowing(&self) -> bool {
        self.pending.len() - self.start > MAX_LINE_LEN
    }

    pub fn finish(&mut self) -> Option<String> {
        let line = if self.start < self.pending.len() {
            Some(into_line(&self.pending[self.start..]))
        } else {
            None
        };
        self.pending.clear();
        self.start = 0;
        self.scanned = 0;
        line
    }
}

fn into_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
