//! Failure classification and backoff.

use derive_more::Display;
use shelfcast_config::Retry;
use shelfcast_transport::error::ErrorKind as TransportErrorKind;
use std::time::Duration;

/// A failure the executor knows how to wait out.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The call outlived the executor's deadline.
    #[display("timed out")]
    Timeout,
    /// The API told us exactly how long to back off.
    #[display("rate limited for {}s", _0.as_secs())]
    RateLimited(Duration),
    #[display("network fault")]
    Network,
    #[display("remote API fault")]
    Remote,
}

impl Failure {
    /// `None` means the failure is unclassified and must not be retried.
    pub fn classify(kind: &TransportErrorKind) -> Option<Self> {
        match kind {
            TransportErrorKind::RetryAfter(wait) => Some(Self::RateLimited(*wait)),
            TransportErrorKind::TimedOut | TransportErrorKind::Network(_) => Some(Self::Network),
            TransportErrorKind::Api(_) => Some(Self::Remote),
            TransportErrorKind::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound on attempts per call, the first one included.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// How long a single attempt may take.
    pub deadline: Duration,
    /// Added on top of every server-mandated wait.
    pub rate_limit_margin: Duration,
    /// How often the rate-limit countdown message is refreshed.
    pub countdown_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&Retry::default())
    }
}

impl From<&Retry> for RetryPolicy {
    fn from(retry: &Retry) -> Self {
        Self {
            max_attempts: retry.max_retries.max(1),
            initial_delay: retry.initial_delay(),
            max_delay: retry.max_delay(),
            deadline: retry.deadline(),
            rate_limit_margin: retry.rate_limit_margin(),
            countdown_interval: retry.countdown_interval(),
        }
    }
}

impl RetryPolicy {
    /// Disable retries entirely.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// How long to wait after `attempt` (1-based) failed with `failure`.
    pub fn delay_for(&self, failure: Failure, attempt: u32) -> Duration {
        match failure {
            Failure::RateLimited(wait) => wait + self.rate_limit_margin,
            Failure::Network => {
                let exponent = attempt.saturating_sub(1).min(31);
                self.initial_delay.saturating_mul(1 << exponent).min(self.max_delay)
            },
            Failure::Timeout | Failure::Remote => self.initial_delay,
        }
    }
}
