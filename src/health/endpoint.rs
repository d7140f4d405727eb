//! The health boundary: maps runtime state and a fresh report to an HTTP
//! status code and JSON body.

use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::aggregator::HealthAggregator;
use super::report::{HealthReport, HealthStatus};
use crate::recovery::{RecoveryExecutor, RetryPolicy};
use crate::runtime::{Phase, RuntimeStateStore};

/// Probe timeout while answering a request. With one attempt per service the
/// whole answer stays under the client's per-attempt timeout.
const REQUEST_PROBE_TIMEOUT_MS: u64 = 1_000;

/// Fixed path the client gate polls.
pub const HEALTH_PATH: &str = "/api/health";

/// Body returned while the process is still booting.
pub const INITIALIZING_STATUS: &str = "initializing";

/// Response produced by [`HealthEndpoint::handle`].
#[derive(Debug, Clone)]
pub struct HealthResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl HealthResponse {
    fn initializing() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: json!({ "status": INITIALIZING_STATUS }),
        }
    }

    fn from_report(report: &HealthReport) -> Self {
        let status = match report.overall {
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = serde_json::to_value(report).unwrap_or_else(|e| {
            warn!("Failed to serialize health report: {}", e);
            json!({ "overall": report.overall, "error": e.to_string() })
        });
        Self { status, body }
    }

    /// The process is `failed`: always 503 and `unhealthy`, whatever the
    /// fresh report says, with the recorded errors attached.
    fn failed(report: &HealthReport, errors: Vec<String>) -> Self {
        let mut served = report.clone();
        served.overall = HealthStatus::Unhealthy;
        let mut response = Self::from_report(&served);
        if let Some(body) = response.body.as_object_mut() {
            body.insert("errors".to_string(), json!(errors));
        }
        response
    }
}

/// Handler behind `GET /api/health`.
#[derive(Clone)]
pub struct HealthEndpoint {
    store: RuntimeStateStore,
    aggregator: Arc<HealthAggregator>,
    executor: RecoveryExecutor,
}

impl HealthEndpoint {
    pub fn new(store: RuntimeStateStore, aggregator: Arc<HealthAggregator>) -> Self {
        Self {
            store,
            aggregator,
            executor: RecoveryExecutor::new(RetryPolicy::single_attempt()),
        }
    }

    /// Answer one health request.
    ///
    /// While the boot sequence owns the state (`starting`/`initializing`) the
    /// endpoint answers 503 `initializing` without running checks. Otherwise
    /// every probe gets a single bounded attempt; retries are the client's job.
    pub async fn handle(&self) -> HealthResponse {
        let summary = self.store.get_summary();
        if matches!(summary.phase, Phase::Starting | Phase::Initializing) {
            debug!("Health requested during {}", summary.phase);
            return HealthResponse::initializing();
        }

        let report = self
            .aggregator
            .run_with(
                &self.executor,
                Duration::from_millis(REQUEST_PROBE_TIMEOUT_MS),
            )
            .await;
        if let Err(e) = self.store.record_health_check_results(report.clone()) {
            warn!("Failed to record health report: {}", e);
        }

        match self.store.get() {
            Some(state) if state.phase == Phase::Failed => {
                debug!("Health requested after failure ({} errors)", state.errors.len());
                HealthResponse::failed(&report, state.errors)
            }
            _ => HealthResponse::from_report(&report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{complete_snapshot, ConfigSnapshot};
    use crate::health::ServiceProbe;
    use crate::validate::ServiceKind;
    use async_trait::async_trait;
    use tokio::time::Instant;

    struct RefusedProbe;

    #[async_trait]
    impl ServiceProbe for RefusedProbe {
        async fn probe(&self) -> anyhow::Result<()> {
            anyhow::bail!("connect ECONNREFUSED 127.0.0.1:5432")
        }
    }

    fn endpoint(store: &RuntimeStateStore, snapshot: ConfigSnapshot) -> HealthEndpoint {
        HealthEndpoint::new(store.clone(), Arc::new(HealthAggregator::new(snapshot)))
    }

    #[tokio::test]
    async fn test_uninitialized_store_answers_initializing() {
        let store = RuntimeStateStore::new();
        let response = endpoint(&store, complete_snapshot()).handle().await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body, json!({ "status": "initializing" }));

        store.initialize();
        let response = endpoint(&store, complete_snapshot()).handle().await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body["status"], "initializing");
    }

    #[tokio::test]
    async fn test_ready_store_answers_report() {
        let store = RuntimeStateStore::new();
        store.initialize();
        store.update_phase(Phase::Ready).unwrap();

        let response = endpoint(&store, complete_snapshot()).handle().await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["overall"], "healthy");
        assert_eq!(store.recent_reports().len(), 1);
    }

    #[tokio::test]
    async fn test_degraded_is_200_and_unhealthy_is_503() {
        let store = RuntimeStateStore::new();
        store.initialize();
        store.update_phase(Phase::Ready).unwrap();

        let degraded = endpoint(&store, complete_snapshot().without("REDIS_URL"))
            .handle()
            .await;
        assert_eq!(degraded.status, StatusCode::OK);
        assert_eq!(degraded.body["overall"], "degraded");
        assert_eq!(degraded.body["warningCount"], 1);

        let unhealthy = endpoint(&store, complete_snapshot().without("DATABASE_URL"))
            .handle()
            .await;
        assert_eq!(unhealthy.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(unhealthy.body["overall"], "unhealthy");
        assert_eq!(store.get_summary().phase, Phase::Failed);
    }

    #[tokio::test]
    async fn test_failed_store_is_503_even_with_healthy_report() {
        let store = RuntimeStateStore::new();
        store.initialize();
        store.add_error("fatal boot error").unwrap();

        let response = endpoint(&store, complete_snapshot()).handle().await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body["overall"], "unhealthy");
        assert_eq!(response.body["errors"], json!(["fatal boot error"]));
        assert_eq!(store.get_summary().phase, Phase::Failed);

        // The body still parses as a report.
        let report: HealthReport = serde_json::from_value(response.body).unwrap();
        assert_eq!(report.overall, HealthStatus::Unhealthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_database_answers_without_backoff() {
        let store = RuntimeStateStore::new();
        store.initialize();
        store.update_phase(Phase::Ready).unwrap();
        let aggregator = HealthAggregator::new(complete_snapshot())
            .with_probe(ServiceKind::Database, Arc::new(RefusedProbe));
        let endpoint = HealthEndpoint::new(store.clone(), Arc::new(aggregator));
        let started = Instant::now();

        let response = endpoint.handle().await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body["overall"], "unhealthy");
        assert_eq!(store.get_summary().phase, Phase::Failed);
    }
}
