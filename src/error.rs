//! Startup errors.
//!
//! Once polling has begun nothing is fatal: conversation failures are
//! reported to the operator and polling failures are retried.

use derive_more::{Display, Error};

/// An application error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for the binary.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("couldn't load configuration")]
    Config,
    #[display("no bot token: set TELEGRAM_BOT_TOKEN or bot.token")]
    MissingToken,
    #[display("couldn't open the local library")]
    Inventory,
    #[display("couldn't set up the messaging transport")]
    Transport,
    #[display("couldn't determine the working directory")]
    WorkingDirectory,
}
