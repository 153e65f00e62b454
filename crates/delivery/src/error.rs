//! Delivery Error Types
//!
//! Transport failures the executor gave up on keep the transport error as a
//! child frame, so the tree still says *why* the last attempt failed.

use crate::policy::Failure;
use derive_more::{Display, Error};
use std::path::PathBuf;

/// A delivery error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A classified failure kept happening until the attempt bound.
    #[display("gave up after {attempts} attempts: {failure}")]
    Exhausted { failure: Failure, attempts: u32 },
    /// A failure the executor doesn't know how to retry.
    #[display("unretryable failure on attempt {attempts}")]
    Unclassified { attempts: u32 },
    /// The sent-title ledger couldn't be read or written.
    #[display("sent-title ledger unusable: {}", _0.display())]
    Ledger(#[error(not(source))] PathBuf),
    /// The local inventory couldn't be read.
    #[display("inventory unavailable")]
    Inventory,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Exhausted { .. } | Self::Inventory => true,
            Self::Unclassified { .. } | Self::Ledger(_) => false,
        }
    }
}
