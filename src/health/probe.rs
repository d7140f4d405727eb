//! TCP reachability checks built from the configured connection URLs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

use super::aggregator::ServiceProbe;
use crate::config::ConfigSnapshot;
use crate::validate::ServiceKind;

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "postgres" | "postgresql" => Some(5432),
        "redis" | "rediss" => Some(6379),
        _ => None,
    }
}

/// Opens (and immediately drops) a TCP connection to a service's host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpProbe {
    host: String,
    port: u16,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host and port of a connection URL. `None` when either is unknown.
    pub fn from_url(raw: &str) -> Option<Self> {
        let url = Url::parse(raw.trim()).ok()?;
        let host = url.host_str().filter(|h| !h.is_empty())?;
        let port = url
            .port_or_known_default()
            .or_else(|| default_port(url.scheme()))?;
        Some(Self::new(host, port))
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[async_trait]
impl ServiceProbe for TcpProbe {
    async fn probe(&self) -> Result<()> {
        let address = self.address();
        debug!("Connecting to {}", address);
        TcpStream::connect(&address)
            .await
            .with_context(|| format!("connect {}", address))?;
        Ok(())
    }
}

/// TCP checks for every service whose URL is set. Auth has no endpoint.
pub fn tcp_probes(snapshot: &ConfigSnapshot) -> Vec<(ServiceKind, Arc<dyn ServiceProbe>)> {
    [
        (ServiceKind::Database, "DATABASE_URL"),
        (ServiceKind::Cache, "REDIS_URL"),
        (ServiceKind::Storage, "STORAGE_URL"),
    ]
    .into_iter()
    .filter_map(|(kind, key)| {
        let probe = TcpProbe::from_url(snapshot.get(key)?)?;
        Some((kind, Arc::new(probe) as Arc<dyn ServiceProbe>))
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::complete_snapshot;
    use crate::recovery::{classify, ErrorCategory};
    use tokio::net::TcpListener;

    #[test]
    fn test_from_url_fills_default_ports() {
        assert_eq!(
            TcpProbe::from_url("postgres://u:p@db.internal/campus"),
            Some(TcpProbe::new("db.internal", 5432))
        );
        assert_eq!(
            TcpProbe::from_url("redis://cache:6380/0").map(|p| p.address()),
            Some("cache:6380".to_string())
        );
        assert_eq!(
            TcpProbe::from_url("https://s3.example.com"),
            Some(TcpProbe::new("s3.example.com", 443))
        );
        assert_eq!(TcpProbe::from_url("not a url"), None);
    }

    #[test]
    fn test_tcp_probes_skip_unset_urls() {
        let kinds: Vec<ServiceKind> = tcp_probes(&complete_snapshot())
            .into_iter()
            .map(|(kind, _)| kind)
            .collect();
        assert_eq!(
            kinds,
            vec![ServiceKind::Database, ServiceKind::Cache, ServiceKind::Storage]
        );

        let snapshot = complete_snapshot().without("REDIS_URL");
        assert_eq!(tcp_probes(&snapshot).len(), 2);
    }

    #[tokio::test]
    async fn test_connects_to_listening_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        TcpProbe::new("127.0.0.1", port).probe().await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_port_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = TcpProbe::new("127.0.0.1", port).probe().await.unwrap_err();
        assert!(err.to_string().starts_with("connect 127.0.0.1:"));
        assert_eq!(classify(&err).category, ErrorCategory::Network);
    }
}
