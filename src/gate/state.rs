use serde::Serialize;

use crate::health::{HealthReport, HealthStatus};

/// Rendering phase of the client gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GatePhase {
    Loading,
    Ready,
    Degraded,
    Critical,
    NetworkError,
    Timeout,
}

impl GatePhase {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GatePhase::Loading)
    }

    /// Whether the application may render its content.
    pub fn renders_children(&self) -> bool {
        matches!(self, GatePhase::Ready | GatePhase::Degraded)
    }
}

/// State exposed to the UI for the duration of one load.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientGateState {
    pub phase: GatePhase,
    pub attempt: u32,
    pub last_error: Option<String>,
    pub report: Option<HealthReport>,
}

impl Default for ClientGateState {
    fn default() -> Self {
        Self {
            phase: GatePhase::Loading,
            attempt: 0,
            last_error: None,
            report: None,
        }
    }
}

/// What the UI should draw for a given state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateView {
    Loading {
        attempt: u32,
    },
    /// Render the application, optionally with a non-blocking banner.
    Render {
        banner: Option<String>,
    },
    /// Block the application and show remediation text.
    Blocked {
        title: &'static str,
        detail: String,
        failing: Vec<(String, String)>,
    },
}

impl ClientGateState {
    pub fn view(&self) -> GateView {
        match self.phase {
            GatePhase::Loading => GateView::Loading {
                attempt: self.attempt,
            },
            GatePhase::Ready => GateView::Render { banner: None },
            GatePhase::Degraded => {
                let services: Vec<&str> = self
                    .report
                    .iter()
                    .flat_map(|r| r.checks_with_status(HealthStatus::Degraded))
                    .map(|c| c.service.as_str())
                    .collect();
                GateView::Render {
                    banner: Some(format!(
                        "Some features are temporarily limited ({}).",
                        services.join(", ")
                    )),
                }
            }
            GatePhase::Critical => GateView::Blocked {
                title: "Service unavailable",
                detail: "Required services are failing and must be restored before the \
                         application can start."
                    .to_string(),
                failing: self
                    .report
                    .iter()
                    .flat_map(|r| r.checks_with_status(HealthStatus::Unhealthy))
                    .map(|c| (c.service.clone(), c.message.clone()))
                    .collect(),
            },
            GatePhase::NetworkError => GateView::Blocked {
                title: "Cannot reach the server",
                detail: format!(
                    "Check your network connection and try again.{}",
                    self.last_error
                        .as_deref()
                        .map(|e| format!(" ({})", e))
                        .unwrap_or_default()
                ),
                failing: Vec::new(),
            },
            GatePhase::Timeout => GateView::Blocked {
                title: "Server is taking too long to start",
                detail: "The server is still starting up. Please try again in a few minutes."
                    .to_string(),
                failing: Vec::new(),
            },
        }
    }
}
