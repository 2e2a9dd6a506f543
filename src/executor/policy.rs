//! Retry policy
//!
//! Declarative description of how many attempts an operation gets, how
//! backoff grows between them, and how CAPTCHA waits are bounded.

use std::time::Duration;

use crate::error::{ErrorKind, HarvestError};

/// Retry behavior for one executor run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Maximum number of attempts, counting the first one
    pub max_attempts: u32,
    /// Backoff before the second attempt
    #[serde(with = "crate::executor::serde_duration_ms")]
    pub initial_backoff: Duration,
    /// Growth factor applied per subsequent attempt
    pub backoff_multiplier: f64,
    /// Error kinds that warrant another attempt
    pub retryable_kinds: Vec<ErrorKind>,
    /// Whether CAPTCHA pages are waited out instead of failing immediately
    pub captcha_retry_enabled: bool,
    /// Maximum time to wait for a CAPTCHA to clear
    #[serde(with = "crate::executor::serde_duration_ms")]
    pub captcha_wait_timeout: Duration,
    /// Interval between CAPTCHA re-checks
    #[serde(with = "crate::executor::serde_duration_ms")]
    pub captcha_poll_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            retryable_kinds: vec![ErrorKind::Transient, ErrorKind::Blocked],
            captcha_retry_enabled: true,
            captcha_wait_timeout: Duration::from_secs(120),
            captcha_poll_interval: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Validate the policy before first use.
    pub fn validate(&self) -> Result<(), HarvestError> {
        if self.max_attempts == 0 {
            return Err(HarvestError::Configuration(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(HarvestError::Configuration(format!(
                "backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.captcha_retry_enabled && self.captcha_poll_interval.is_zero() {
            return Err(HarvestError::Configuration(
                "captcha_poll_interval must be non-zero when CAPTCHA waits are enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Backoff to sleep after a failed `attempt` (1-based).
    ///
    /// Grows geometrically: `initial * multiplier^(attempt - 1)`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        self.initial_backoff.mul_f64(factor)
    }

    /// Whether this error warrants another attempt under the policy.
    pub fn is_retryable(&self, error: &HarvestError) -> bool {
        self.retryable_kinds.contains(&error.kind())
    }
}
