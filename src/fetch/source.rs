use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use url::Url;

use super::error::FetchError;

// Some hosts (Buzzsprout among them) reject requests without a browser-ish agent.
pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; podcast-organizer/0.1)";

/// Retrieval seam of the fetcher. One call per feed, one attempt.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<Bytes, FetchError>;
}

pub struct HttpFeedSource {
    http: Client,
}

impl HttpFeedSource {
    pub fn new() -> anyhow::Result<Self> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn get(&self, url: &str, timeout: Duration) -> Result<Bytes, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::Transport(format!("invalid feed url {url}: {e}")))?;
        let resp = self
            .http
            .get(parsed)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, timeout))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }
        resp.bytes().await.map_err(|e| FetchError::from_reqwest(e, timeout))
    }
}
