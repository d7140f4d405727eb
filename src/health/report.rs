use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a single service or of the whole report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of checking one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub service: String,
    pub status: HealthStatus,
    pub message: String,
    pub timestamp_ms: i64,
}

impl HealthCheck {
    pub fn new(
        service: impl Into<String>,
        status: HealthStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            status,
            message: message.into(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Aggregated point-in-time verdict across all checked services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub overall: HealthStatus,
    pub checks: Vec<HealthCheck>,
    #[serde(default)]
    pub total_duration_ms: u64,
    #[serde(default)]
    pub critical_failure_count: u32,
    #[serde(default)]
    pub warning_count: u32,
}

impl HealthReport {
    /// Fold individual checks into a report.
    ///
    /// Any unhealthy check makes the report unhealthy; otherwise any
    /// degraded check makes it degraded.
    pub fn from_checks(checks: Vec<HealthCheck>, total_duration_ms: u64) -> Self {
        let critical_failure_count = checks
            .iter()
            .filter(|c| c.status == HealthStatus::Unhealthy)
            .count() as u32;
        let warning_count = checks
            .iter()
            .filter(|c| c.status == HealthStatus::Degraded)
            .count() as u32;

        let overall = if critical_failure_count > 0 {
            HealthStatus::Unhealthy
        } else if warning_count > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Self {
            overall,
            checks,
            total_duration_ms,
            critical_failure_count,
            warning_count,
        }
    }

    /// No critical failures: the process may take traffic.
    pub fn is_success(&self) -> bool {
        self.overall != HealthStatus::Unhealthy
    }

    pub fn checks_with_status(&self, status: HealthStatus) -> impl Iterator<Item = &HealthCheck> {
        self.checks.iter().filter(move |c| c.status == status)
    }
}
