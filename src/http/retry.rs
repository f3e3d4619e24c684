//! Retry policy, per-attempt classification and terminal errors for API calls.

use std::time::Duration;

/// Default attempt budget when the configuration does not set one.
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Default base delay between attempts.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default backoff multiplier.
pub const DEFAULT_MULTIPLIER: f64 = 1.8;

/// Attempt budget and backoff shape for one [`ClientSession`].
///
/// The budget counts the way the configuration always has: `attempts = 3`
/// issues exactly two network calls before the call is declared
/// unavailable.
///
/// [`ClientSession`]: super::ClientSession
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// A policy with the given budget and the default backoff shape.
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            attempts,
            ..Self::default()
        }
    }

    /// Delay inserted after the given 1-based attempt number.
    /// The first failed attempt waits the base delay unscaled.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let scale = self.multiplier.powi(attempt as i32 - 1);
        self.base_delay.mul_f64(scale)
    }
}

/// Classification of a single network attempt. Produced fresh per attempt;
/// the retry loop pattern-matches on it instead of letting errors propagate
/// across layers.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// A 2xx response with a parsable JSON body.
    Success(serde_json::Value),
    /// A 404 on a call that treats absence as a valid answer.
    NotFoundTolerated,
    /// A connection failure or a response status outside the 2xx class.
    RetryableFailure(anyhow::Error),
    /// A 2xx response whose body did not parse as JSON.
    EncodingFailure(anyhow::Error),
}

/// Terminal error surfaced by [`ClientSession::send`] once the attempt
/// budget is spent. Everything transient stays inside the retry loop.
///
/// [`ClientSession::send`]: super::ClientSession::send
#[derive(Debug)]
pub enum ApiError {
    /// No valid response within the attempt budget.
    Unavailable,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unavailable => {
                write!(f, "Unable to get a valid response from the API")
            }
        }
    }
}

impl std::error::Error for ApiError {}
