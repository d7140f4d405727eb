use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, info};

use super::report::{HealthCheck, HealthReport, HealthStatus};
use crate::config::ConfigSnapshot;
use crate::recovery::RecoveryExecutor;
use crate::validate::{validate_kind, ServiceKind, ALL_SERVICES};

/// Timeout applied to every individual probe attempt.
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Live connectivity check for a backing service.
///
/// Implemented by the data-access, cache, storage and auth clients; this
/// crate only invokes it.
#[async_trait]
pub trait ServiceProbe: Send + Sync {
    async fn probe(&self) -> anyhow::Result<()>;
}

/// Combines configuration validation and optional live probes into a
/// [`HealthReport`].
pub struct HealthAggregator {
    snapshot: ConfigSnapshot,
    probes: BTreeMap<ServiceKind, Arc<dyn ServiceProbe>>,
    executor: RecoveryExecutor,
    probe_timeout: Duration,
}

impl HealthAggregator {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self {
            snapshot,
            probes: BTreeMap::new(),
            executor: RecoveryExecutor::default(),
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
        }
    }

    /// Register a live probe, run only when the service's configuration is valid.
    pub fn with_probe(mut self, kind: ServiceKind, probe: Arc<dyn ServiceProbe>) -> Self {
        self.probes.insert(kind, probe);
        self
    }

    pub fn with_executor(mut self, executor: RecoveryExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn snapshot(&self) -> &ConfigSnapshot {
        &self.snapshot
    }

    /// Check every registered service, in registry order.
    pub async fn run(&self) -> HealthReport {
        self.run_with(&self.executor, self.probe_timeout).await
    }

    /// Like [`run`](Self::run), with a caller-chosen retry schedule and probe
    /// timeout.
    pub async fn run_with(
        &self,
        executor: &RecoveryExecutor,
        probe_timeout: Duration,
    ) -> HealthReport {
        let started = Instant::now();
        let mut checks = Vec::with_capacity(ALL_SERVICES.len());

        for kind in ALL_SERVICES {
            checks.push(self.check(kind, executor, probe_timeout).await);
        }

        let report = HealthReport::from_checks(checks, started.elapsed().as_millis() as u64);
        info!(
            "Health report: {} ({} critical, {} degraded, {}ms)",
            report.overall,
            report.critical_failure_count,
            report.warning_count,
            report.total_duration_ms
        );
        report
    }

    async fn check(
        &self,
        kind: ServiceKind,
        executor: &RecoveryExecutor,
        probe_timeout: Duration,
    ) -> HealthCheck {
        let result = validate_kind(kind, &self.snapshot);

        if !result.is_available {
            return if result.can_degrade {
                let message = result
                    .warnings
                    .first()
                    .cloned()
                    .unwrap_or_else(|| format!("{} unavailable", kind));
                HealthCheck::new(kind.as_str(), HealthStatus::Degraded, message)
            } else {
                HealthCheck::new(
                    kind.as_str(),
                    HealthStatus::Unhealthy,
                    format!(
                        "Missing required configuration: {}",
                        result.missing_config_keys.join(", ")
                    ),
                )
            };
        }

        let Some(probe) = self.probes.get(&kind) else {
            debug!("{} configured, no live probe registered", kind);
            return HealthCheck::new(kind.as_str(), HealthStatus::Healthy, "Configured");
        };

        let label = format!("{} probe", kind);
        let attempt = || {
            let probe = Arc::clone(probe);
            async move {
                match timeout(probe_timeout, probe.probe()).await {
                    Ok(result) => result,
                    Err(_) => {
                        anyhow::bail!("{} probe timed out after {:?}", kind, probe_timeout)
                    }
                }
            }
        };

        match executor.execute(&label, attempt).await {
            Ok(()) => HealthCheck::new(kind.as_str(), HealthStatus::Healthy, "Connected"),
            Err(e) => match kind.descriptor().fallback_warning {
                Some(fallback) => HealthCheck::new(
                    kind.as_str(),
                    HealthStatus::Degraded,
                    format!("{}; {}", e, fallback),
                ),
                None => HealthCheck::new(kind.as_str(), HealthStatus::Unhealthy, e.to_string()),
            },
        }
    }
}
