//! Shared HTTP transport

use super::SourceError;
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("commodity-feeds/", env!("CARGO_PKG_VERSION"));

/// GET client with a fixed timeout
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    /// GET `url` with query parameters and return the body
    ///
    /// Any non-success status is an error carrying the response body.
    pub async fn get(&self, url: &str, query: &[(String, String)]) -> Result<Vec<u8>, SourceError> {
        tracing::debug!(url = %url, params = query.len(), "Fetching");

        let response = self.client.get(url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        tracing::debug!(url = %url, bytes = bytes.len(), "Fetched");
        Ok(bytes.to_vec())
    }
}
