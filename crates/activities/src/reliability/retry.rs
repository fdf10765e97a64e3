//! Retry policy for activity re-delivery

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activity::{error_types, ActivityError};

/// Re-delivery policy applied to failed activity calls
///
/// Mirrors the engine's activity retry options: exponential backoff with
/// jitter, a delivery cap and a list of error types that are never
/// re-delivered.
///
/// # Example
///
/// ```
/// use syncflow_activities::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::exponential()
///     .with_max_attempts(4)
///     .with_initial_interval(Duration::from_millis(200));
///
/// assert_eq!(policy.delay_for_attempt(1), Duration::ZERO);
/// assert!(policy.has_attempts_remaining(3));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of deliveries (including the first)
    pub max_attempts: u32,

    /// Delay before the first re-delivery
    #[serde(with = "duration_millis")]
    pub initial_interval: Duration,

    /// Upper bound on the delay between deliveries
    #[serde(with = "duration_millis")]
    pub max_interval: Duration,

    /// Backoff multiplier
    pub backoff_coefficient: f64,

    /// Jitter factor (0.0-1.0)
    pub jitter: f64,

    /// Error types that are never re-delivered
    #[serde(default)]
    pub non_retryable_errors: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

impl RetryPolicy {
    /// Exponential backoff: 5 deliveries, 1s initial, 60s cap, 2x, 10% jitter
    ///
    /// Precondition failures are never re-delivered.
    pub fn exponential() -> Self {
        Self {
            max_attempts: 5,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(60),
            backoff_coefficient: 2.0,
            jitter: 0.1,
            non_retryable_errors: vec![
                error_types::ILLEGAL_STATE.to_string(),
                error_types::CONFLICTING_JOB.to_string(),
                error_types::TERMINAL_CONFLICT.to_string(),
            ],
        }
    }

    /// A single delivery
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            backoff_coefficient: 1.0,
            jitter: 0.0,
            non_retryable_errors: vec![],
        }
    }

    /// Fixed interval between deliveries
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_interval: interval,
            max_interval: interval,
            backoff_coefficient: 1.0,
            jitter: 0.0,
            non_retryable_errors: vec![],
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self.max_interval = self.max_interval.max(interval);
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Set the backoff coefficient; values below 1.0 or non-finite become 1.0
    pub fn with_backoff_coefficient(mut self, coefficient: f64) -> Self {
        self.backoff_coefficient = if coefficient.is_finite() {
            coefficient.max(1.0)
        } else {
            1.0
        };
        self
    }

    /// Set the jitter factor, clamped to 0.0-1.0
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn with_non_retryable_error(mut self, error_type: impl Into<String>) -> Self {
        self.non_retryable_errors.push(error_type.into());
        self
    }

    /// Delay before delivery number `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let retry_num = attempt - 1;
        let base = self.initial_interval.as_secs_f64()
            * self.backoff_coefficient.powi(retry_num as i32 - 1);
        let max = self.max_interval.as_secs_f64();
        // The coefficient is a public field; a bad value must not reach from_secs_f64
        let capped = if base.is_finite() { base.clamp(0.0, max) } else { max };

        let jitter_range = capped * self.jitter;
        let jittered = if jitter_range > 0.0 {
            let offset = rand::thread_rng().gen_range(-jitter_range..jitter_range);
            (capped + offset).max(0.0)
        } else {
            capped
        };

        Duration::from_secs_f64(jittered)
    }

    /// Whether a failed delivery may be re-delivered
    pub fn should_retry(&self, error: &ActivityError) -> bool {
        if !error.retryable {
            return false;
        }
        match error.error_type.as_deref() {
            Some(error_type) => !self.non_retryable_errors.iter().any(|e| e == error_type),
            None => true,
        }
    }

    pub fn has_attempts_remaining(&self, current_attempt: u32) -> bool {
        current_attempt < self.max_attempts
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_defaults() {
        let policy = RetryPolicy::exponential();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_interval, Duration::from_secs(1));
        assert!(policy
            .non_retryable_errors
            .contains(&error_types::ILLEGAL_STATE.to_string()));
    }

    #[test]
    fn test_delay_for_attempt() {
        let policy = RetryPolicy::exponential().with_jitter(0.0);

        assert_eq!(policy.delay_for_attempt(1), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy::exponential()
            .with_jitter(0.0)
            .with_max_interval(Duration::from_secs(3));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(3));
    }

    #[test]
    fn test_bad_backoff_coefficient() {
        for coefficient in [-2.0, 0.5, f64::NAN, f64::INFINITY] {
            let policy = RetryPolicy::exponential()
                .with_initial_interval(Duration::from_millis(100))
                .with_max_interval(Duration::from_secs(10))
                .with_backoff_coefficient(coefficient)
                .with_jitter(0.0);
            assert_eq!(policy.backoff_coefficient, 1.0);
            assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(100));
        }

        let mut policy = RetryPolicy::fixed(Duration::from_millis(100), 5);
        policy.backoff_coefficient = -3.0;
        assert_eq!(policy.delay_for_attempt(3), Duration::ZERO);
        policy.backoff_coefficient = f64::NAN;
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::exponential().with_jitter(0.5);
        for _ in 0..50 {
            let delay = policy.delay_for_attempt(2);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn test_zero_interval_with_jitter() {
        let policy = RetryPolicy::fixed(Duration::ZERO, 3).with_jitter(0.2);
        assert_eq!(policy.delay_for_attempt(2), Duration::ZERO);
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::exponential();

        let transient = ActivityError::retryable("pool timed out").with_type(error_types::RETRYABLE);
        assert!(policy.should_retry(&transient));

        let untyped = ActivityError::retryable("connection reset");
        assert!(policy.should_retry(&untyped));

        let precondition =
            ActivityError::non_retryable("attempt running").with_type(error_types::ILLEGAL_STATE);
        assert!(!policy.should_retry(&precondition));

        let listed = ActivityError::retryable("marked").with_type(error_types::TERMINAL_CONFLICT);
        assert!(!policy.should_retry(&listed));
    }

    #[test]
    fn test_attempts_remaining() {
        let policy = RetryPolicy::fixed(Duration::ZERO, 3);
        assert!(policy.has_attempts_remaining(2));
        assert!(!policy.has_attempts_remaining(3));
        assert!(!RetryPolicy::no_retry().has_attempts_remaining(1));
    }

    #[test]
    fn test_serialization_uses_millis() {
        let policy = RetryPolicy::fixed(Duration::from_millis(250), 2);
        let json = serde_json::to_value(&policy).unwrap();
        assert_eq!(json["initial_interval"], 250);

        let parsed: RetryPolicy = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, policy);
    }
}
