//! Process-wide runtime state.
//!
//! Unlike a first-use global, the store is constructed explicitly at boot and
//! handed to everything that reads or writes it (the boot sequence and the
//! health endpoint). Clones share the same state.
//!
//! ## Lifecycle
//!
//! ```text
//! starting --initialize--> initializing --healthy report--> ready
//!                          initializing --unhealthy report--> failed
//! any phase --add_error--> failed        (terminal until reset)
//! ```
//!
//! The whole record sits behind a single lock, so readers always observe the
//! phase and `ready_for_traffic` together.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

use crate::health::HealthReport;

/// Number of health reports kept in the in-memory history.
pub const HEALTH_HISTORY_CAPACITY: usize = 32;

/// Boot phase of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Starting,
    Initializing,
    Ready,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Starting => "starting",
            Phase::Initializing => "initializing",
            Phase::Ready => "ready",
            Phase::Failed => "failed",
        }
    }

    /// Phases only move forward; `failed` is terminal.
    pub fn can_transition_to(self, next: Phase) -> bool {
        match self {
            Phase::Failed => next == Phase::Failed,
            _ => next == Phase::Failed || next >= self,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mutable runtime record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeState {
    pub phase: Phase,
    pub initialization_start_time_ms: i64,
    pub ready_for_traffic: bool,
    pub health_check_results: Option<HealthReport>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl RuntimeState {
    fn new() -> Self {
        Self {
            phase: Phase::Initializing,
            initialization_start_time_ms: chrono::Utc::now().timestamp_millis(),
            ready_for_traffic: false,
            health_check_results: None,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    // Keeps `ready_for_traffic` tied to the phase.
    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.ready_for_traffic = phase == Phase::Ready;
    }

    fn can_serve_requests(&self) -> bool {
        match self.phase {
            Phase::Ready => true,
            Phase::Initializing => self.errors.is_empty(),
            Phase::Starting | Phase::Failed => false,
        }
    }
}

/// Read-only projection exposed to health endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSummary {
    pub phase: Phase,
    pub ready: bool,
    pub can_serve: bool,
}

impl Default for RuntimeSummary {
    fn default() -> Self {
        Self {
            phase: Phase::Starting,
            ready: false,
            can_serve: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeStateError {
    #[error("Runtime state has not been initialized")]
    NotInitialized,
    #[error("Illegal phase transition from {from} to {to}")]
    IllegalTransition { from: Phase, to: Phase },
}

#[derive(Debug, Default)]
struct Inner {
    state: Option<RuntimeState>,
    history: VecDeque<HealthReport>,
}

/// Shared handle to the runtime state.
#[derive(Debug, Clone, Default)]
pub struct RuntimeStateStore {
    inner: Arc<RwLock<Inner>>,
}

impl RuntimeStateStore {
    /// Create an uninitialized store (phase `starting`).
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enter the `initializing` phase.
    ///
    /// Calling this on an already initialized store keeps the existing state.
    pub fn initialize(&self) -> RuntimeState {
        let mut inner = self.write();
        if let Some(existing) = &inner.state {
            warn!(
                "Runtime state already initialized (phase {}). Keeping existing.",
                existing.phase
            );
            return existing.clone();
        }
        let state = RuntimeState::new();
        info!("Runtime state initialized");
        inner.state = Some(state.clone());
        state
    }

    /// Snapshot of the current state, `None` before [`initialize`](Self::initialize).
    pub fn get(&self) -> Option<RuntimeState> {
        self.read().state.clone()
    }

    pub fn update_phase(&self, phase: Phase) -> Result<(), RuntimeStateError> {
        let mut inner = self.write();
        let state = inner
            .state
            .as_mut()
            .ok_or(RuntimeStateError::NotInitialized)?;

        if !state.phase.can_transition_to(phase) {
            warn!("Rejected phase transition {} -> {}", state.phase, phase);
            return Err(RuntimeStateError::IllegalTransition {
                from: state.phase,
                to: phase,
            });
        }

        if state.phase != phase {
            info!("Runtime phase {} -> {}", state.phase, phase);
        }
        state.set_phase(phase);
        Ok(())
    }

    /// Record a health report and move the phase accordingly.
    ///
    /// A healthy or degraded report makes the process ready unless it has
    /// already failed; an unhealthy report fails it.
    pub fn record_health_check_results(
        &self,
        report: HealthReport,
    ) -> Result<(), RuntimeStateError> {
        let mut inner = self.write();
        let Inner { state, history } = &mut *inner;
        let state = state.as_mut().ok_or(RuntimeStateError::NotInitialized)?;

        if report.is_success() {
            if state.phase != Phase::Failed {
                if state.phase != Phase::Ready {
                    info!("Runtime phase {} -> ready ({})", state.phase, report.overall);
                }
                state.set_phase(Phase::Ready);
            } else {
                debug!("Ignoring {} report, runtime already failed", report.overall);
            }
        } else {
            if state.phase != Phase::Failed {
                error!(
                    "Runtime phase {} -> failed ({} critical failures)",
                    state.phase, report.critical_failure_count
                );
            }
            state.set_phase(Phase::Failed);
        }

        if history.len() == HEALTH_HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(report.clone());
        state.health_check_results = Some(report);
        Ok(())
    }

    /// Record a fatal error. Always moves the phase to `failed`.
    pub fn add_error(&self, message: impl Into<String>) -> Result<(), RuntimeStateError> {
        let message = message.into();
        let mut inner = self.write();
        let state = inner
            .state
            .as_mut()
            .ok_or(RuntimeStateError::NotInitialized)?;
        error!("Runtime error: {}", message);
        state.errors.push(message);
        state.set_phase(Phase::Failed);
        Ok(())
    }

    pub fn add_warning(&self, message: impl Into<String>) -> Result<(), RuntimeStateError> {
        let message = message.into();
        let mut inner = self.write();
        let state = inner
            .state
            .as_mut()
            .ok_or(RuntimeStateError::NotInitialized)?;
        warn!("Runtime warning: {}", message);
        state.warnings.push(message);
        Ok(())
    }

    pub fn is_ready_for_traffic(&self) -> bool {
        self.read()
            .state
            .as_ref()
            .map(|s| s.ready_for_traffic)
            .unwrap_or(false)
    }

    /// Whether requests may be served: ready, or still initializing with no
    /// recorded errors.
    pub fn can_serve_requests(&self) -> bool {
        self.read()
            .state
            .as_ref()
            .map(RuntimeState::can_serve_requests)
            .unwrap_or(false)
    }

    /// Summary for health endpoints. Never fails, even before initialization.
    pub fn get_summary(&self) -> RuntimeSummary {
        let inner = self.read();
        match &inner.state {
            Some(state) => RuntimeSummary {
                phase: state.phase,
                ready: state.ready_for_traffic,
                can_serve: state.can_serve_requests(),
            },
            None => RuntimeSummary::default(),
        }
    }

    /// Most recent reports, oldest first.
    pub fn recent_reports(&self) -> Vec<HealthReport> {
        self.read().history.iter().cloned().collect()
    }

    /// Milliseconds since [`initialize`](Self::initialize), if initialized.
    pub fn initialization_elapsed_ms(&self) -> Option<i64> {
        self.read()
            .state
            .as_ref()
            .map(|s| chrono::Utc::now().timestamp_millis() - s.initialization_start_time_ms)
    }

    /// Drop all state and return to an uninitialized `starting` store.
    pub fn reset(&self) {
        let mut inner = self.write();
        *inner = Inner::default();
        debug!("Runtime state reset");
    }
}
