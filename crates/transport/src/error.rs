//! Transport Error Types
//!
//! Every messenger implementation maps its native failures onto these kinds.
//! The retry executor classifies on nothing else, so the mapping decides
//! whether (and how) a failed call gets retried.

use derive_more::{Display, Error};
use std::time::Duration;

/// A transport error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The transport gave up waiting for a response.
    #[display("request timed out")]
    TimedOut,
    /// The remote API demands a pause before the next call.
    #[display("rate limited: retry after {}s", _0.as_secs())]
    RetryAfter(#[error(not(source))] Duration),
    /// Connection or protocol failure below the API.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// The API understood the request and rejected it.
    #[display("API error: {_0}")]
    Api(#[error(not(source))] String),
    /// Anything else: undecodable responses, local misuse, bugs.
    #[display("{_0}")]
    Other(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// The mandatory wait, if this is a rate-limit rejection.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RetryAfter(wait) => Some(*wait),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_display_uses_whole_seconds() {
        assert_eq!(ErrorKind::RetryAfter(Duration::from_millis(7_400)).to_string(), "rate limited: retry after 7s");
    }

    #[test]
    fn only_other_is_fatal() {
        assert!(ErrorKind::TimedOut.is_retryable());
        assert!(ErrorKind::Api("Bad Request".into()).is_retryable());
        assert!(!ErrorKind::Other("bug".into()).is_retryable());
    }
}
