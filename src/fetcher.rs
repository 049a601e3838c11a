use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// A fully drained response for one address.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub address: String,
    /// Recorded for output only; it never decides success.
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchedBody {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Performs one request/response exchange and drains the body.
    ///
    /// Only transport failures are errors; every HTTP status is a success.
    async fn fetch(&self, address: &str) -> Result<FetchedBody>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Builds the client shared by the address source and every fetch task.
pub fn build_client(user_agent: &str, request_timeout: Option<Duration>) -> Result<Client> {
    let mut builder = Client::builder().user_agent(user_agent);
    if let Some(timeout) = request_timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, address: &str) -> Result<FetchedBody> {
        log::debug!("Visiting: {}", address);

        let res = self
            .client
            .get(address)
            .send()
            .await
            .map_err(|e| Error::fetch(address, e))?;
        let status = res.status();

        let body = res.bytes().await.map_err(|e| Error::fetch(address, e))?;
        log::debug!("{} answered {} with {} bytes", address, status, body.len());

        Ok(FetchedBody {
            address: address.to_string(),
            status: status.as_u16(),
            body: body.to_vec(),
        })
    }
}
