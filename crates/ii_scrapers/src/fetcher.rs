use std::time::Duration;

use async_trait::async_trait;
use ii_core::{Error, Result};
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = concat!("ii-crawler/", env!("CARGO_PKG_VERSION"));

/// Retrieves one document. Any failure is reported as [`Error::Fetch`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String>;
}

/// Plain HTTP GET with a per-request timeout and 2xx status validation.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::fetch(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(url.as_str(), format!("status {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::fetch(url.as_str(), e))?;
        debug!(bytes = body.len(), "Fetched document");
        Ok(body)
    }
}
