//! Remote asset fetching: the [`AssetFetcher`] seam and its HTTP implementation.

use crate::config::DownloadConfig;
use crate::error::{Error, FetchError, Result};
use crate::types::FetchOutcome;

/// Abstraction over fetching one remote object, enabling testability.
///
/// Implementations map "does not exist" (HTTP 404) to
/// [`FetchOutcome::NotFound`] and every other failure to a [`FetchError`],
/// which the engine retries. Timeouts are applied by the engine, not here.
#[async_trait::async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Fetch the object at `url`
    async fn fetch(&self, url: &str) -> std::result::Result<FetchOutcome, FetchError>;
}

/// Production [`AssetFetcher`] issuing plain GET requests through reqwest.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher from the download configuration
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        let client = builder.build().map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "Failed to create HTTP client: {}",
                e
            )))
        })?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchOutcome, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(FetchOutcome::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        Ok(FetchOutcome::Found(body.to_vec()))
    }
}
