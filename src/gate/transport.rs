//! Transport used by the gate to reach the health boundary.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::health::HEALTH_PATH;

/// Default CLI version (from Cargo.toml)
const DEFAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Raw answer from the health boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// The request never produced a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to fetch: {0}")]
pub struct TransportError(pub String);

#[async_trait]
pub trait HealthTransport: Send + Sync {
    /// Issue one `GET` against the health path.
    async fn fetch(&self) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed transport.
///
/// Carries no request timeout of its own; the gate bounds every attempt.
pub struct HttpTransport {
    client: Client,
    url: Url,
    user_agent: String,
    session_id: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        let url = Self::build_url(base_url)?;
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url,
            user_agent: format!("campus-health/{}", DEFAULT_VERSION),
            session_id: Uuid::new_v4().to_string(),
        })
    }

    fn build_url(base_url: &str) -> Result<Url> {
        let base =
            Url::parse(base_url).with_context(|| format!("Invalid base URL: {}", base_url))?;
        base.join(HEALTH_PATH)
            .with_context(|| format!("Failed to build health URL from: {}", base_url))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl HealthTransport for HttpTransport {
    async fn fetch(&self) -> Result<RawResponse, TransportError> {
        let request_id = Uuid::new_v4().to_string();
        debug!("GET {} (request {})", self.url, request_id);

        let response = self
            .client
            .get(self.url.clone())
            .header("Accept", "application/json")
            .header("User-Agent", &self.user_agent)
            .header("x-request-id", &request_id)
            .header("x-request-session-id", &self.session_id)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(format!("failed to read body: {}", e)))?;

        debug!("Health response: HTTP {}", status);
        Ok(RawResponse { status, body })
    }
}
