use crate::config::PollConfig;
use crate::http::ServiceError;
use std::time::Duration;

/// Bounded polling schedule: growing delay, attempt cap, optional deadline
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub backoff_multiplier: f64,
    pub max_interval: Duration,
    pub max_attempts: u32,
    pub deadline: Option<Duration>,
    pub max_transient_errors: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_config(&PollConfig::default())
    }
}

impl PollPolicy {
    pub fn from_config(config: &PollConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            backoff_multiplier: config.backoff_multiplier.max(1.0),
            max_interval: Duration::from_millis(config.max_interval_ms.max(config.interval_ms)),
            max_attempts: config.max_attempts.max(1),
            deadline: config.timeout_secs.map(Duration::from_secs),
            max_transient_errors: config.max_transient_errors.max(1),
        }
    }

    /// Same delay before every query, no deadline
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            backoff_multiplier: 1.0,
            max_interval: interval,
            max_attempts: max_attempts.max(1),
            deadline: None,
            max_transient_errors: 3,
        }
    }

    /// Wait before status query number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.min(64) as i32);
        let millis = self.interval.as_millis() as f64 * factor;
        let capped = millis.min(self.max_interval.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// `consecutive_failures` includes `error`; reaching `max_transient_errors` stops
    pub fn should_retry(&self, consecutive_failures: u32, error: &ServiceError) -> bool {
        if consecutive_failures >= self.max_transient_errors {
            return false;
        }

        error.is_transient()
    }
}
