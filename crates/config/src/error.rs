//! Configuration Error Types
//!
//! Same shape as every other crate in the workspace: an `exn` tree rooted in
//! an actionable [`ErrorKind`].

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A provider (file, environment) produced values that don't fit the
    /// configuration structure.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
    /// An explicitly requested configuration file does not exist.
    #[display("configuration file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Values parsed fine but break an invariant.
    #[display("configuration value out of range: {_0}")]
    OutOfRange(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Re-reading the same file gives the same answer.
        false
    }
}
