//! Workflow Error Types
//!
//! A conversation step that fails with one of these is over: the dispatcher
//! logs it, tells the operator, and forgets the conversation.

use derive_more::{Display, Error};

/// A workflow error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for workflow operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("couldn't read the local library")]
    Inventory,
    #[display("couldn't read the channel title index")]
    RemoteIndex,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        true
    }
}
