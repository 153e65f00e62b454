//! Operator notifications.
//!
//! Messages to the operator go through the executor like any other remote
//! call, but a notification that can't be delivered is only logged: it must
//! never turn a delivered document into a failure.

use crate::executor::Executor;
use shelfcast_transport::{ChatId, Keyboard, MessageId, MessengerHandle};
use std::sync::Arc;

#[derive(Clone)]
pub struct Notifier {
    executor: Arc<Executor>,
    messenger: MessengerHandle,
}

impl Notifier {
    pub fn new(executor: Arc<Executor>, messenger: MessengerHandle) -> Self {
        Self { executor, messenger }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn messenger(&self) -> &MessengerHandle {
        &self.messenger
    }

    pub async fn say(&self, chat: &ChatId, text: &str) -> Option<MessageId> {
        self.send(chat, text, None).await
    }

    pub async fn prompt(&self, chat: &ChatId, text: &str, keyboard: &Keyboard) -> Option<MessageId> {
        self.send(chat, text, Some(keyboard)).await
    }

    /// Rewrite one of our earlier messages in place.
    pub async fn replace(&self, chat: &ChatId, message: MessageId, text: &str, keyboard: Option<&Keyboard>) -> bool {
        let messenger = &self.messenger;
        let result = self
            .executor
            .run("edit_message", None, move || messenger.edit_message(chat, message, text, keyboard))
            .await;
        match result {
            Ok(done) => done.is_some(),
            Err(e) => {
                tracing::warn!(%chat, error = %e, "Couldn't update operator message");
                false
            },
        }
    }

    /// Acknowledge a button press.
    pub async fn ack(&self, callback_id: &str) {
        if let Err(e) = self.messenger.answer_choice(callback_id).await {
            tracing::debug!(error = %e, "Couldn't acknowledge choice");
        }
    }

    async fn send(&self, chat: &ChatId, text: &str, keyboard: Option<&Keyboard>) -> Option<MessageId> {
        let messenger = &self.messenger;
        let result = self
            .executor
            .run("send_message", None, move || messenger.send_message(chat, text, keyboard))
            .await;
        match result {
            Ok(sent) => sent,
            Err(e) => {
                tracing::warn!(%chat, error = %e, "Couldn't notify operator");
                None
            },
        }
    }
}
