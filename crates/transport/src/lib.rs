//! Messaging transport.
//!
//! Everything above this crate talks to the outside world through
//! [`Messenger`]: plain messages (optionally with choice buttons), edits of
//! messages we sent, document uploads, and acknowledgement of button presses.
//! Implementations are responsible for mapping their failures onto
//! [`ErrorKind`](error::ErrorKind); they never retry on their own.

pub mod error;
#[cfg(feature = "mock")]
mod mock;
mod models;
#[cfg(feature = "telegram")]
pub mod telegram;

use crate::error::Result;
#[cfg(feature = "mock")]
pub use crate::mock::{MockMessenger, Operation, Recorded};
pub use crate::models::{Button, ChatId, Document, Event, EventKind, Keyboard, MessageId, UserId};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Messenger: Send + Sync {
    /// Name of the transport, for logging only.
    fn name(&self) -> &str;

    async fn send_message(&self, chat: &ChatId, text: &str, keyboard: Option<&Keyboard>) -> Result<MessageId>;

    /// Replace the text (and buttons) of a message previously sent by us.
    async fn edit_message(
        &self,
        chat: &ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<()>;

    async fn send_document(&self, chat: &ChatId, document: &Document) -> Result<MessageId>;

    /// Acknowledge a button press so the client stops its spinner.
    async fn answer_choice(&self, callback_id: &str) -> Result<()>;
}

pub type MessengerHandle = Arc<dyn Messenger + Send + Sync>;
