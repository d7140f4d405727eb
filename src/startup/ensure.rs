//! Boot-time ensure sequence.
//!
//! ```text
//! store.initialize()          // starting -> initializing
//! ensure_configuration()      // critical services must be configured
//! ensure_services()           // aggregate a health report and record it
//! ```
//!
//! A critical service that is missing configuration or reports unhealthy
//! fails the boot: the error is recorded in the runtime store, which then
//! stays `failed`. Degradable services only add warnings.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::health::{HealthAggregator, HealthReport, HealthStatus};
use crate::runtime::{RuntimeStateError, RuntimeStateStore, RuntimeSummary};
use crate::validate::{validate_all, ServiceCheckResult};

/// Why the boot sequence stopped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BootError {
    #[error("Missing environment variable for {service}: {}", .keys.join(", "))]
    MissingConfiguration { service: String, keys: Vec<String> },
    #[error("Critical services unhealthy: {}", .services.join(", "))]
    Unhealthy { services: Vec<String> },
    #[error(transparent)]
    State(#[from] RuntimeStateError),
}

pub type BootResult<T> = std::result::Result<T, BootError>;

/// State of each ensure step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EnsureStatus {
    #[default]
    NotStarted,
    InProgress,
    Success,
    Failed(String),
}

impl EnsureStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, EnsureStatus::Success)
    }
}

/// What a successful boot produced.
#[derive(Debug, Clone)]
pub struct BootOutcome {
    pub report: HealthReport,
    pub summary: RuntimeSummary,
}

/// Orchestrates the boot sequence against a runtime store.
///
/// # Example
/// ```ignore
/// let store = RuntimeStateStore::new();
/// let aggregator = Arc::new(HealthAggregator::new(ConfigSnapshot::from_env()));
/// let mut ctx = StartupContext::new(store.clone(), aggregator);
/// let outcome = ctx.ensure_all().await?;
/// ```
pub struct StartupContext {
    store: RuntimeStateStore,
    aggregator: Arc<HealthAggregator>,
    config_status: EnsureStatus,
    services_status: EnsureStatus,
}

impl StartupContext {
    pub fn new(store: RuntimeStateStore, aggregator: Arc<HealthAggregator>) -> Self {
        Self {
            store,
            aggregator,
            config_status: EnsureStatus::NotStarted,
            services_status: EnsureStatus::NotStarted,
        }
    }

    fn log_result(result: &ServiceCheckResult) {
        if result.is_available {
            info!("   ✅ {}", result.service_name);
        } else if result.can_degrade {
            warn!("   ⚠️  {} (degraded)", result.service_name);
            for warning in &result.warnings {
                warn!("      {}", warning);
            }
        } else {
            error!(
                "   ❌ {} (missing {})",
                result.service_name,
                result.missing_config_keys.join(", ")
            );
        }
    }

    /// Every non-degradable service must have valid configuration.
    fn ensure_configuration(&mut self) -> BootResult<()> {
        info!("🔧 Checking configuration...");
        self.config_status = EnsureStatus::InProgress;

        let results = validate_all(self.aggregator.snapshot());
        results.iter().for_each(Self::log_result);

        let mut first_failure = None;
        for result in results.iter().filter(|r| !r.is_available && !r.can_degrade) {
            let err = BootError::MissingConfiguration {
                service: result.service_name.clone(),
                keys: result.missing_config_keys.clone(),
            };
            self.store.add_error(err.to_string())?;
            first_failure.get_or_insert(err);
        }

        if let Some(err) = first_failure {
            error!("   Set the missing variables and restart");
            self.config_status = EnsureStatus::Failed(err.to_string());
            return Err(err);
        }

        info!("✅ Configuration valid");
        self.config_status = EnsureStatus::Success;
        Ok(())
    }

    /// Aggregate a health report, record it, and surface its problems.
    async fn ensure_services(&mut self) -> BootResult<HealthReport> {
        info!("🩺 Checking services...");
        self.services_status = EnsureStatus::InProgress;

        let report = self.aggregator.run().await;

        for check in report.checks_with_status(HealthStatus::Degraded) {
            self.store
                .add_warning(format!("{}: {}", check.service, check.message))?;
        }

        let unhealthy: Vec<String> = report
            .checks_with_status(HealthStatus::Unhealthy)
            .map(|c| c.service.clone())
            .collect();
        for check in report.checks_with_status(HealthStatus::Unhealthy) {
            self.store
                .add_error(format!("{}: {}", check.service, check.message))?;
        }

        self.store.record_health_check_results(report.clone())?;

        if !unhealthy.is_empty() {
            let err = BootError::Unhealthy {
                services: unhealthy,
            };
            error!("❌ {}", err);
            self.services_status = EnsureStatus::Failed(err.to_string());
            return Err(err);
        }

        if report.overall == HealthStatus::Degraded {
            warn!("⚠️  Running degraded ({} services)", report.warning_count);
        } else {
            info!("✅ All services healthy");
        }
        self.services_status = EnsureStatus::Success;
        Ok(report)
    }

    /// Run every boot step in order.
    pub async fn ensure_all(&mut self) -> BootResult<BootOutcome> {
        self.store.initialize();

        // Step 1: configuration (fail fast on operator mistakes)
        self.ensure_configuration()?;

        // Step 2: services (depends on configuration)
        let report = self.ensure_services().await?;

        let summary = self.store.get_summary();
        debug!(
            "Boot finished: phase={} ready={} can_serve={}",
            summary.phase, summary.ready, summary.can_serve
        );
        if let Some(elapsed) = self.store.initialization_elapsed_ms() {
            info!("Ready for traffic after {}ms", elapsed);
        }

        Ok(BootOutcome { report, summary })
    }

    pub fn config_status(&self) -> &EnsureStatus {
        &self.config_status
    }

    pub fn services_status(&self) -> &EnsureStatus {
        &self.services_status
    }
}
