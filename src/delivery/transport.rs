use std::time::Duration;

use async_trait::async_trait;

const MAX_RESPONSE_BODY_CHARS: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response (connect failure, timeout, ...).
#[derive(Debug, Clone)]
pub struct TransportError {
    pub message: String,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

impl From<String> for TransportError {
    fn from(message: String) -> Self {
        TransportError { message }
    }
}

impl From<&str> for TransportError {
    fn from(s: &str) -> Self {
        TransportError {
            message: s.to_string(),
        }
    }
}

#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError> {
        let resp = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::from(format!("Webhook request failed: {e}")))?;

        let status = resp.status();
        let reason = status.canonical_reason().unwrap_or_default().to_string();
        let body = match resp.text().await {
            Ok(text) => text.chars().take(MAX_RESPONSE_BODY_CHARS).collect::<String>(),
            Err(e) => {
                tracing::warn!("Failed to read webhook response body from {url}: {e}");
                format!("<failed to read response body: {e}>")
            }
        };

        Ok(TransportResponse {
            status: status.as_u16(),
            reason,
            body,
        })
    }
}
