//! Tests for the startup gate.

#[cfg(test)]
mod tests {
    use crate::gate::{
        ClientStartupGate, GateError, GatePhase, GatePolicy, HealthTransport, MemorySessionFlag,
        RawResponse, SessionFlag, TransportError,
    };
    use crate::config::complete_snapshot;
    use crate::health::{
        HealthAggregator, HealthCheck, HealthEndpoint, HealthReport, HealthStatus, ServiceProbe,
    };
    use crate::runtime::{Phase, RuntimeStateStore};
    use crate::validate::ServiceKind;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Clone)]
    enum Step {
        Fail(&'static str),
        Respond(u16, String),
        Hang,
    }

    /// Plays back a script of responses; the last step repeats forever.
    struct ScriptedTransport {
        steps: Mutex<VecDeque<Step>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HealthTransport for ScriptedTransport {
        async fn fetch(&self) -> Result<RawResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = {
                let mut steps = self.steps.lock().unwrap();
                if steps.len() > 1 {
                    steps.pop_front().unwrap()
                } else {
                    steps.front().cloned().unwrap()
                }
            };
            match step {
                Step::Fail(message) => Err(TransportError(message.to_string())),
                Step::Respond(status, body) => Ok(RawResponse { status, body }),
                Step::Hang => std::future::pending().await,
            }
        }
    }

    /// Answers in-process from a [`HealthEndpoint`].
    struct EndpointTransport {
        endpoint: HealthEndpoint,
        calls: AtomicU32,
    }

    #[async_trait]
    impl HealthTransport for EndpointTransport {
        async fn fetch(&self) -> Result<RawResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = self.endpoint.handle().await;
            Ok(RawResponse {
                status: response.status.as_u16(),
                body: response.body.to_string(),
            })
        }
    }

    struct RefusedDatabase;

    #[async_trait]
    impl ServiceProbe for RefusedDatabase {
        async fn probe(&self) -> anyhow::Result<()> {
            anyhow::bail!("connect ECONNREFUSED 127.0.0.1:5432")
        }
    }

    fn report_body(statuses: &[(&str, HealthStatus)]) -> String {
        let checks = statuses
            .iter()
            .map(|(service, status)| HealthCheck::new(*service, *status, "checked"))
            .collect();
        serde_json::to_string(&HealthReport::from_checks(checks, 4)).unwrap()
    }

    fn healthy() -> Step {
        Step::Respond(200, report_body(&[("database", HealthStatus::Healthy)]))
    }

    fn initializing() -> Step {
        Step::Respond(503, r#"{"status":"initializing"}"#.to_string())
    }

    fn gate(
        transport: Arc<ScriptedTransport>,
        session: Arc<MemorySessionFlag>,
    ) -> ClientStartupGate {
        ClientStartupGate::new(transport, session)
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_session_skips_requests() {
        let transport = ScriptedTransport::new(vec![Step::Fail("unreachable")]);
        let session = Arc::new(MemorySessionFlag::completed());

        let state = gate(transport.clone(), session).run().await.unwrap();
        assert_eq!(state.phase, GatePhase::Ready);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_two_fetch_failures() {
        let transport = ScriptedTransport::new(vec![
            Step::Fail("Failed to fetch"),
            Step::Fail("Failed to fetch"),
            healthy(),
        ]);
        let session = Arc::new(MemorySessionFlag::new());
        let gate = gate(transport.clone(), session.clone());

        let state = gate.run().await.unwrap();
        assert_eq!(state.phase, GatePhase::Ready);
        assert_eq!(state.attempt, 3);
        assert_eq!(transport.calls(), 3);
        assert!(session.is_complete());
        assert_eq!(gate.state(), state);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_transport_reaches_terminal_state() {
        let transport = ScriptedTransport::new(vec![Step::Fail("Failed to fetch")]);
        let session = Arc::new(MemorySessionFlag::new());
        let start = Instant::now();

        let state = gate(transport.clone(), session.clone()).run().await.unwrap();
        assert!(state.phase.is_terminal());
        assert!(matches!(
            state.phase,
            GatePhase::NetworkError | GatePhase::Timeout
        ));
        assert!(transport.calls() <= GatePolicy::default().max_attempts);
        assert!(start.elapsed() <= Duration::from_millis(30_100));
        assert!(!session.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_with_transport_error_is_network_error() {
        let transport = ScriptedTransport::new(vec![Step::Fail("Failed to fetch")]);
        let state = gate(transport.clone(), Arc::new(MemorySessionFlag::new()))
            .with_policy(GatePolicy::default().with_max_attempts(3))
            .run()
            .await
            .unwrap();

        assert_eq!(state.phase, GatePhase::NetworkError);
        assert_eq!(transport.calls(), 3);
        assert!(state.last_error.unwrap().contains("Failed to fetch"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_status_is_network_error() {
        let transport = ScriptedTransport::new(vec![Step::Respond(502, "Bad Gateway".into())]);
        let state = gate(transport.clone(), Arc::new(MemorySessionFlag::new()))
            .with_policy(GatePolicy::default().with_max_attempts(2))
            .run()
            .await
            .unwrap();

        assert_eq!(state.phase, GatePhase::NetworkError);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initializing_forever_times_out() {
        let transport = ScriptedTransport::new(vec![initializing()]);
        let state = gate(transport.clone(), Arc::new(MemorySessionFlag::new()))
            .run()
            .await
            .unwrap();

        assert_eq!(state.phase, GatePhase::Timeout);
        assert!(transport.calls() > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initializing_then_ready() {
        let transport = ScriptedTransport::new(vec![initializing(), initializing(), healthy()]);
        let state = gate(transport.clone(), Arc::new(MemorySessionFlag::new()))
            .run()
            .await
            .unwrap();

        assert_eq!(state.phase, GatePhase::Ready);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unhealthy_report_is_critical() {
        let body = report_body(&[
            ("database", HealthStatus::Unhealthy),
            ("cache", HealthStatus::Degraded),
        ]);
        let transport = ScriptedTransport::new(vec![Step::Respond(503, body)]);
        let session = Arc::new(MemorySessionFlag::new());

        let state = gate(transport.clone(), session.clone()).run().await.unwrap();
        assert_eq!(state.phase, GatePhase::Critical);
        assert_eq!(transport.calls(), 1);
        assert!(!session.is_complete());
        assert_eq!(state.report.unwrap().critical_failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unhealthy_report_with_200_is_critical() {
        let body = report_body(&[("database", HealthStatus::Unhealthy)]);
        let transport = ScriptedTransport::new(vec![Step::Respond(200, body)]);
        let session = Arc::new(MemorySessionFlag::new());

        let state = gate(transport.clone(), session.clone()).run().await.unwrap();
        assert_eq!(state.phase, GatePhase::Critical);
        assert_eq!(transport.calls(), 1);
        assert!(!session.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_database_behind_endpoint_is_critical() {
        let store = RuntimeStateStore::new();
        store.initialize();
        store.update_phase(Phase::Ready).unwrap();
        let aggregator = HealthAggregator::new(complete_snapshot())
            .with_probe(ServiceKind::Database, Arc::new(RefusedDatabase));
        let transport = Arc::new(EndpointTransport {
            endpoint: HealthEndpoint::new(store, Arc::new(aggregator)),
            calls: AtomicU32::new(0),
        });
        let session = Arc::new(MemorySessionFlag::new());

        let state = ClientStartupGate::new(transport.clone(), session.clone())
            .run()
            .await
            .unwrap();
        assert_eq!(state.phase, GatePhase::Critical);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(!session.is_complete());
        assert!(state.report.unwrap().critical_failure_count >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_report_marks_session() {
        let body = report_body(&[
            ("database", HealthStatus::Healthy),
            ("storage", HealthStatus::Degraded),
        ]);
        let transport = ScriptedTransport::new(vec![Step::Respond(200, body)]);
        let session = Arc::new(MemorySessionFlag::new());

        let state = gate(transport, session.clone()).run().await.unwrap();
        assert_eq!(state.phase, GatePhase::Degraded);
        assert!(state.phase.renders_children());
        assert!(session.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_requests_are_bounded_by_deadline() {
        let transport = ScriptedTransport::new(vec![Step::Hang]);
        let start = Instant::now();

        let state = gate(transport.clone(), Arc::new(MemorySessionFlag::new()))
            .run()
            .await
            .unwrap();

        assert_eq!(state.phase, GatePhase::Timeout);
        assert!(transport.calls() >= 2);
        assert!(start.elapsed() <= Duration::from_millis(30_100));
        assert!(state.last_error.unwrap().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_gate() {
        let transport = ScriptedTransport::new(vec![Step::Hang]);
        let gate = gate(transport.clone(), Arc::new(MemorySessionFlag::new()));
        let token = gate.cancellation_token();
        let mut rx = gate.subscribe();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        assert_eq!(gate.run().await, Err(GateError::Cancelled));
        assert_eq!(transport.calls(), 1);

        // Only the first loading state was published.
        let last = rx.borrow_and_update().clone();
        assert_eq!(last.phase, GatePhase::Loading);
        assert_eq!(last.attempt, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_run() {
        let transport = ScriptedTransport::new(vec![healthy()]);
        let gate = gate(transport.clone(), Arc::new(MemorySessionFlag::new()));
        gate.cancellation_token().cancel();

        assert_eq!(gate.run().await, Err(GateError::Cancelled));
        assert_eq!(transport.calls(), 0);
    }
}
