use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::policy::GatePolicy;
use super::session::SessionFlag;
use super::state::{ClientGateState, GatePhase};
use super::transport::{HealthTransport, RawResponse};
use crate::health::{HealthReport, HealthStatus, INITIALIZING_STATUS};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("Startup gate was cancelled")]
    Cancelled,
}

/// How one attempt ended.
#[derive(Debug)]
enum Attempt {
    /// The server answered with a report.
    Settled(HealthReport),
    /// The server is up but still booting.
    Initializing,
    /// No usable answer. `network` is set when the server could not be
    /// reached or answered with something other than a health response.
    Failed { error: String, network: bool },
}

fn interpret(raw: RawResponse) -> Attempt {
    if raw.status != 200 && raw.status != 503 {
        return Attempt::Failed {
            error: format!("Unexpected status: HTTP {}", raw.status),
            network: true,
        };
    }

    if let Ok(report) = serde_json::from_str::<HealthReport>(&raw.body) {
        return Attempt::Settled(report);
    }

    let initializing = serde_json::from_str::<serde_json::Value>(&raw.body)
        .ok()
        .and_then(|v| v.get("status").and_then(|s| s.as_str()).map(str::to_owned))
        .is_some_and(|s| s == INITIALIZING_STATUS);

    if raw.status == 503 && initializing {
        Attempt::Initializing
    } else {
        Attempt::Failed {
            error: format!("Unrecognized health response (HTTP {})", raw.status),
            network: true,
        }
    }
}

/// Client-side controller that decides whether the application may render.
///
/// Polls the health boundary until it gets a verdict, the attempt budget runs
/// out, or the wall-clock deadline passes. Every state change is published on
/// a `watch` channel; a cancelled gate publishes nothing further.
pub struct ClientStartupGate {
    transport: Arc<dyn HealthTransport>,
    session: Arc<dyn SessionFlag>,
    policy: GatePolicy,
    cancel: CancellationToken,
    state_tx: watch::Sender<ClientGateState>,
}

impl ClientStartupGate {
    pub fn new(transport: Arc<dyn HealthTransport>, session: Arc<dyn SessionFlag>) -> Self {
        let (state_tx, _) = watch::channel(ClientGateState::default());
        Self {
            transport,
            session,
            policy: GatePolicy::default(),
            cancel: CancellationToken::new(),
            state_tx,
        }
    }

    pub fn with_policy(mut self, policy: GatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Token that aborts the in-flight request and any pending backoff.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ClientGateState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> ClientGateState {
        self.state_tx.borrow().clone()
    }

    fn publish(&self, state: ClientGateState) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.state_tx.send_replace(state);
    }

    fn settle(&self, attempt: u32, report: HealthReport) -> ClientGateState {
        let phase = match report.overall {
            HealthStatus::Healthy => GatePhase::Ready,
            HealthStatus::Degraded => GatePhase::Degraded,
            HealthStatus::Unhealthy => GatePhase::Critical,
        };

        if phase.renders_children() {
            if let Err(e) = self.session.mark_complete() {
                warn!("Failed to persist session flag: {:#}", e);
            }
        }

        ClientGateState {
            phase,
            attempt,
            last_error: None,
            report: Some(report),
        }
    }

    /// Drive the gate to a terminal state.
    pub async fn run(&self) -> Result<ClientGateState, GateError> {
        if self.cancel.is_cancelled() {
            return Err(GateError::Cancelled);
        }

        if self.session.is_complete() {
            info!("✅ Health checks already completed this session");
            let state = ClientGateState {
                phase: GatePhase::Ready,
                ..ClientGateState::default()
            };
            self.publish(state.clone());
            return Ok(state);
        }

        let policy = &self.policy;
        let deadline = Instant::now() + policy.total_timeout;
        let mut last_error: Option<String> = None;
        let mut last_was_network = false;
        let mut attempts = 0;

        while attempts < policy.max_attempts {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            attempts += 1;
            self.publish(ClientGateState {
                phase: GatePhase::Loading,
                attempt: attempts,
                last_error: last_error.clone(),
                report: None,
            });

            let attempt_timeout = policy.attempt_timeout.min(remaining);
            debug!(
                "Health check attempt {}/{} (timeout {}ms)",
                attempts,
                policy.max_attempts,
                attempt_timeout.as_millis()
            );

            let result = tokio::select! {
                _ = self.cancel.cancelled() => return Err(GateError::Cancelled),
                result = timeout(attempt_timeout, self.transport.fetch()) => result,
            };
            let outcome = match result {
                Ok(Ok(raw)) => interpret(raw),
                Ok(Err(e)) => Attempt::Failed {
                    error: e.to_string(),
                    network: true,
                },
                Err(_) => Attempt::Failed {
                    error: format!("Request timed out after {}ms", attempt_timeout.as_millis()),
                    network: false,
                },
            };

            match outcome {
                Attempt::Settled(report) => {
                    let state = self.settle(attempts, report);
                    info!(
                        "Startup gate settled: {:?} after {} attempt(s)",
                        state.phase, attempts
                    );
                    self.publish(state.clone());
                    return Ok(state);
                }
                Attempt::Initializing => {
                    debug!("Server is still initializing");
                    last_error = Some("Server is still initializing".to_string());
                    last_was_network = false;
                }
                Attempt::Failed { error, network } => {
                    warn!("Health check attempt {} failed: {}", attempts, error);
                    last_error = Some(error);
                    last_was_network = network;
                }
            }

            if attempts >= policy.max_attempts {
                break;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let delay = policy.delay_for(attempts - 1).min(remaining);
            debug!("Retrying health check in {}ms", delay.as_millis());

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(GateError::Cancelled),
                _ = sleep(delay) => {}
            }
        }

        let exhausted = attempts >= policy.max_attempts;
        let phase = if exhausted && last_was_network {
            GatePhase::NetworkError
        } else {
            GatePhase::Timeout
        };
        warn!(
            "Startup gate gave up after {} attempt(s): {:?} ({})",
            attempts,
            phase,
            last_error.as_deref().unwrap_or("no response")
        );

        let state = ClientGateState {
            phase,
            attempt: attempts,
            last_error,
            report: None,
        };
        self.publish(state.clone());
        Ok(state)
    }
}

impl Drop for ClientStartupGate {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
