/// Status endpoint client

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::core::snapshot::ClusterSnapshot;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("invalid status response: {0}")]
    Decode(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Anything that can produce a cluster snapshot
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self) -> Result<ClusterSnapshot, FetchError>;
}

/// Fetches `/api/status` from the dashboard backend
pub struct HttpStatusSource {
    client: Client,
    url: String,
}

impl HttpStatusSource {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: status_url(base_url),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_snapshot(&self) -> Result<ClusterSnapshot, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache")
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        ClusterSnapshot::from_body(&body)
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch(&self) -> Result<ClusterSnapshot, FetchError> {
        self.fetch_snapshot().await
    }
}

fn status_url(base_url: &str) -> String {
    format!("{}/api/status", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_url() {
        assert_eq!(status_url("http://db:5000"), "http://db:5000/api/status");
        assert_eq!(status_url("http://db:5000/"), "http://db:5000/api/status");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        // Port 9 (discard) on localhost is closed on any sane test box
        let source = HttpStatusSource::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let result = source.fetch().await;
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }
}
