// Retry policy: exponential backoff, then dead letter
use tracing::{info, warn};

/// Error strings stored on a job are capped at this many chars
pub const MAX_ERROR_LEN: usize = 2000;

/// Retry decision result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after `delay_ms`
    Retry { delay_ms: i64 },
    /// Attempts exhausted
    DeadLetter,
}

/// Deterministic exponential backoff (no jitter)
///
/// `delay = min(base * 2^(attempt - 1), max)`, so with the 15 s / 1800 s
/// defaults attempt 1 waits 15 s, attempt 4 waits 120 s and attempt 8
/// onwards waits the 30 min cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base_delay_ms: i64,
    max_delay_ms: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(15_000, 1_800_000)
    }
}

impl RetryPolicy {
    pub fn new(base_delay_ms: i64, max_delay_ms: i64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
        }
    }

    pub fn from_secs(base_secs: u64, max_secs: u64) -> Self {
        Self::new(
            (base_secs as i64).saturating_mul(1000),
            (max_secs as i64).saturating_mul(1000),
        )
    }

    /// Backoff for the given (1-based) attempt
    pub fn delay_ms(&self, attempt_count: i32) -> i64 {
        let exponent = attempt_count.max(1) - 1;
        let factor = 2_i64.checked_pow(exponent as u32).unwrap_or(i64::MAX);
        self.base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms)
    }

    /// Decide what happens to a job whose attempt `attempt_count` just failed
    pub fn decide(&self, job_id: &str, attempt_count: i32, max_attempts: i32) -> RetryDecision {
        if attempt_count >= max_attempts {
            warn!(
                job_id = %job_id,
                attempt = attempt_count,
                max_attempts,
                "Max attempts reached, dead-lettering"
            );
            return RetryDecision::DeadLetter;
        }

        let delay_ms = self.delay_ms(attempt_count);
        info!(
            job_id = %job_id,
            attempt = attempt_count,
            max_attempts,
            delay_ms,
            "Scheduling retry"
        );
        RetryDecision::Retry { delay_ms }
    }
}

/// Cap an error message at `MAX_ERROR_LEN` chars without splitting a char
pub fn truncate_error(message: &str) -> String {
    match message.char_indices().nth(MAX_ERROR_LEN) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}
