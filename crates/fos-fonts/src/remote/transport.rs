//! HTTP transport seam for the remote repository

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

/// Raw HTTP answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Connection-level failure (DNS, TLS, reset, client timeout)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Something that can GET a URL
#[async_trait]
pub trait FontTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError>;
}

/// Transport backed by `reqwest::blocking`, run off the executor thread
#[derive(Debug, Clone)]
pub struct HttpTransport {
    user_agent: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.into(),
            timeout,
        }
    }
}

#[async_trait]
impl FontTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let url = url.to_string();
        let user_agent = self.user_agent.clone();
        let timeout = self.timeout;

        smol::unblock(move || {
            debug!("Fetching from network: {}", url);

            let client = reqwest::blocking::Client::builder()
                .user_agent(user_agent)
                .timeout(timeout)
                .build()
                .map_err(|e| TransportError(e.to_string()))?;

            let response = client
                .get(&url)
                .send()
                .map_err(|e| TransportError(e.to_string()))?;
            let status = response.status().as_u16();
            let body = response
                .bytes()
                .map_err(|e| TransportError(e.to_string()))?
                .to_vec();

            debug!("Fetched {} ({} bytes, HTTP {})", url, body.len(), status);
            Ok(TransportResponse { status, body })
        })
        .await
    }
}
