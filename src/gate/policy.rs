use std::time::Duration;

/// Client-side schedule, tuned independently of the server executor.
const ATTEMPT_TIMEOUT_MS: u64 = 5_000;
const INITIAL_DELAY_MS: u64 = 500;
const MAX_DELAY_MS: u64 = 8_000;
const MAX_ATTEMPTS: u32 = 8;
const TOTAL_TIMEOUT_MS: u64 = 30_000;

/// Retry, backoff and deadline settings for the startup gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatePolicy {
    /// Upper bound for a single request.
    pub attempt_timeout: Duration,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
    /// Wall-clock budget for the whole gate, backoff included.
    pub total_timeout: Duration,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_millis(ATTEMPT_TIMEOUT_MS),
            initial_delay: Duration::from_millis(INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            max_attempts: MAX_ATTEMPTS,
            total_timeout: Duration::from_millis(TOTAL_TIMEOUT_MS),
        }
    }
}

impl GatePolicy {
    pub fn with_total_timeout(mut self, total_timeout: Duration) -> Self {
        self.total_timeout = total_timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Backoff before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let multiplier = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_schedule() {
        let policy = GatePolicy::default();
        let delays: Vec<u128> = (0..6).map(|r| policy.delay_for(r).as_millis()).collect();
        assert_eq!(delays, vec![500, 1_000, 2_000, 4_000, 8_000, 8_000]);
    }

    #[test]
    fn test_max_attempts_floor() {
        assert_eq!(GatePolicy::default().with_max_attempts(0).max_attempts, 1);
    }
}
