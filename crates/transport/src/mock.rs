//! In-memory messenger for testing.

use crate::error::{ErrorKind, Result};
use crate::{ChatId, Document, Keyboard, MessageId, Messenger};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Mutex;

/// Which [`Messenger`] method a scripted outcome applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SendMessage,
    EditMessage,
    SendDocument,
    AnswerChoice,
}

/// A successful call, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Message {
        chat: ChatId,
        id: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edit {
        chat: ChatId,
        id: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Document {
        chat: ChatId,
        id: MessageId,
        file_name: String,
        caption: String,
        size: usize,
    },
    Answer {
        callback_id: String,
    },
}

enum Scripted {
    Fail(ErrorKind),
    /// Never respond; only a caller-side deadline gets past this.
    Hang,
}

/// In-memory messenger for testing.
///
/// Records every successful call and lets tests queue failures per
/// [`Operation`]. Queued outcomes are consumed one per call, oldest first;
/// once the queue for an operation is empty every call succeeds.
///
/// # Examples
///
/// ```
/// use shelfcast_transport::error::ErrorKind;
/// use shelfcast_transport::{ChatId, Messenger, MockMessenger, Operation};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let messenger = MockMessenger::default();
/// messenger.fail_next(Operation::SendMessage, ErrorKind::Api("Bad Request".into())).await;
/// let chat = ChatId::new("@shelf");
/// assert!(messenger.send_message(&chat, "hello", None).await.is_err());
/// assert!(messenger.send_message(&chat, "hello", None).await.is_ok());
/// assert_eq!(messenger.attempts(Operation::SendMessage).await, 2);
/// # }
/// ```
pub struct MockMessenger {
    next_id: AtomicI64,
    script: Mutex<HashMap<Operation, VecDeque<Scripted>>>,
    attempts: Mutex<HashMap<Operation, usize>>,
    recorded: Mutex<Vec<Recorded>>,
}

impl Default for MockMessenger {
    fn default() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            script: Mutex::default(),
            attempts: Mutex::default(),
            recorded: Mutex::default(),
        }
    }
}

impl MockMessenger {
    /// Queue a failure for the next unscripted call of `operation`.
    pub async fn fail_next(&self, operation: Operation, kind: ErrorKind) {
        self.script.lock().await.entry(operation).or_default().push_back(Scripted::Fail(kind));
    }

    /// Queue a call of `operation` that never completes.
    pub async fn hang_next(&self, operation: Operation) {
        self.script.lock().await.entry(operation).or_default().push_back(Scripted::Hang);
    }

    /// How many times `operation` was invoked, successful or not.
    pub async fn attempts(&self, operation: Operation) -> usize {
        self.attempts.lock().await.get(&operation).copied().unwrap_or(0)
    }

    pub async fn recorded(&self) -> Vec<Recorded> {
        self.recorded.lock().await.clone()
    }

    /// Text of every message sent or edited, in order.
    pub async fn texts(&self) -> Vec<String> {
        self.recorded
            .lock()
            .await
            .iter()
            .filter_map(|r| match r {
                Recorded::Message { text, .. } | Recorded::Edit { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// `(chat, file_name)` of every uploaded document, in order.
    pub async fn documents(&self) -> Vec<(ChatId, String)> {
        self.recorded
            .lock()
            .await
            .iter()
            .filter_map(|r| match r {
                Recorded::Document { chat, file_name, .. } => Some((chat.clone(), file_name.clone())),
                _ => None,
            })
            .collect()
    }

    /// The keyboard of the most recent message or edit that had one.
    pub async fn last_keyboard(&self) -> Option<Keyboard> {
        self.recorded.lock().await.iter().rev().find_map(|r| match r {
            Recorded::Message { keyboard: Some(kb), .. } | Recorded::Edit { keyboard: Some(kb), .. } => {
                Some(kb.clone())
            },
            _ => None,
        })
    }

    async fn begin(&self, operation: Operation) -> Result<()> {
        *self.attempts.lock().await.entry(operation).or_default() += 1;
        let scripted = self.script.lock().await.get_mut(&operation).and_then(VecDeque::pop_front);
        match scripted {
            None => Ok(()),
            Some(Scripted::Fail(kind)) => Err(exn::Exn::from(kind)),
            Some(Scripted::Hang) => {
                std::future::pending::<()>().await;
                Ok(())
            },
        }
    }

    fn allocate(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

#[async_trait]
impl Messenger for MockMessenger {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send_message(&self, chat: &ChatId, text: &str, keyboard: Option<&Keyboard>) -> Result<MessageId> {
        self.begin(Operation::SendMessage).await?;
        let id = self.allocate();
        self.recorded.lock().await.push(Recorded::Message {
            chat: chat.clone(),
            id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(id)
    }

    async fn edit_message(
        &self,
        chat: &ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<()> {
        self.begin(Operation::EditMessage).await?;
        self.recorded.lock().await.push(Recorded::Edit {
            chat: chat.clone(),
            id: message,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn send_document(&self, chat: &ChatId, document: &Document) -> Result<MessageId> {
        self.begin(Operation::SendDocument).await?;
        let id = self.allocate();
        self.recorded.lock().await.push(Recorded::Document {
            chat: chat.clone(),
            id,
            file_name: document.file_name.clone(),
            caption: document.caption.clone(),
            size: document.bytes.len(),
        });
        Ok(id)
    }

    async fn answer_choice(&self, callback_id: &str) -> Result<()> {
        self.begin(Operation::AnswerChoice).await?;
        self.recorded.lock().await.push(Recorded::Answer {
            callback_id: callback_id.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn failures_are_consumed_in_order() {
        let messenger = MockMessenger::default();
        let chat = ChatId::new("1");
        let doc = Document {
            file_name: "a.epub".into(),
            bytes: vec![1, 2, 3],
            caption: "A".into(),
        };
        messenger.fail_next(Operation::SendDocument, ErrorKind::TimedOut).await;
        messenger.fail_next(Operation::SendDocument, ErrorKind::RetryAfter(Duration::from_secs(3))).await;

        let err = messenger.send_document(&chat, &doc).await.unwrap_err();
        assert_eq!(*err, ErrorKind::TimedOut);
        let err = messenger.send_document(&chat, &doc).await.unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        messenger.send_document(&chat, &doc).await.unwrap();

        assert_eq!(messenger.attempts(Operation::SendDocument).await, 3);
        assert_eq!(messenger.documents().await, [(chat, "a.epub".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn hang_never_completes() {
        let messenger = MockMessenger::default();
        messenger.hang_next(Operation::SendMessage).await;
        let chat = ChatId::new("1");
        let res = tokio::time::timeout(Duration::from_secs(60), messenger.send_message(&chat, "x", None)).await;
        assert!(res.is_err());
        assert!(messenger.send_message(&chat, "x", None).await.is_ok());
    }

    #[tokio::test]
    async fn message_ids_are_unique() {
        let messenger = MockMessenger::default();
        let chat = ChatId::new("1");
        let a = messenger.send_message(&chat, "a", None).await.unwrap();
        let b = messenger.send_message(&chat, "b", None).await.unwrap();
        assert_ne!(a, b);
        messenger.edit_message(&chat, a, "a2", None).await.unwrap();
        assert_eq!(messenger.texts().await, ["a", "b", "a2"]);
    }
}
