//! Inventory Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// An inventory error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for inventory operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// File or directory does not exist
    #[display("not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Category or filename is empty, contains a separator, or tries to
    /// escape its root.
    #[display("invalid name: {_0:?}")]
    InvalidName(#[error(not(source))] String),
    /// Root directory is relative or not a directory.
    #[display("invalid root: {}", _0.display())]
    InvalidRoot(#[error(not(source))] PathBuf),
    /// Remote title index exists but isn't a JSON array.
    #[display("malformed remote index: {_0}")]
    MalformedIndex(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
