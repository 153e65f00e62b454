//! Telegram Bot API messenger.

mod api;

use self::api::{Message, Update, decode, map_reqwest_error, reply_markup};
use crate::error::{ErrorKind, Result};
use crate::{ChatId, Document, Event, Keyboard, MessageId, Messenger};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::instrument;

const API_BASE: &str = "https://api.telegram.org";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Slack on top of the long-poll timeout before we consider `getUpdates` hung.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Telegram Bot API messenger.
///
/// Calls carry no request timeout of their own (callers enforce deadlines),
/// apart from `getUpdates`, which is bounded by the long-poll timeout.
pub struct TelegramMessenger {
    client: reqwest::Client,
    base: String,
    poll_timeout: Duration,
    offset: AtomicI64,
}

impl TelegramMessenger {
    pub fn new(token: &str, poll_timeout: Duration) -> Result<Self> {
        Self::with_api_base(API_BASE, token, poll_timeout)
    }

    /// Point at a different Bot API server (e.g. a self-hosted one).
    pub fn with_api_base(api_base: &str, token: &str, poll_timeout: Duration) -> Result<Self> {
        if token.trim().is_empty() {
            exn::bail!(ErrorKind::Other("bot token is empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ErrorKind::Other(e.to_string()))?;
        Ok(Self {
            client,
            base: format!("{}/bot{}", api_base.trim_end_matches('/'), token.trim()),
            poll_timeout,
            offset: AtomicI64::new(0),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base)
    }

    async fn finish<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> Result<T> {
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| map_reqwest_error(&e))?;
        let decoded = decode(status, &body).inspect_err(|kind| {
            tracing::debug!(%method, status, error = %kind, "Bot API call rejected");
        })?;
        Ok(decoded)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T> {
        let response = self
            .client
            .post(self.url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e))?;
        Self::finish(method, response).await
    }

    /// Long-poll for the next batch of operator events.
    ///
    /// Advances the update offset past everything returned, including
    /// updates we don't handle, so they are never redelivered.
    #[instrument(skip(self))]
    pub async fn poll(&self) -> Result<Vec<Event>> {
        let body = json!({
            "offset": self.offset.load(Ordering::Acquire),
            "timeout": self.poll_timeout.as_secs(),
            "allowed_updates": ["message", "callback_query"],
        });
        let response = self
            .client
            .post(self.url("getUpdates"))
            .timeout(self.poll_timeout + POLL_GRACE)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e))?;
        let updates: Vec<Update> = Self::finish("getUpdates", response).await?;
        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.offset.store(last + 1, Ordering::Release);
        }
        let events: Vec<Event> = updates.into_iter().filter_map(Update::into_event).collect();
        if !events.is_empty() {
            tracing::debug!(count = events.len(), "Received events");
        }
        Ok(events)
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_message(&self, chat: &ChatId, text: &str, keyboard: Option<&Keyboard>) -> Result<MessageId> {
        let mut body = json!({ "chat_id": chat.as_str(), "text": text });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = reply_markup(keyboard);
        }
        let message: Message = self.call("sendMessage", &body).await?;
        Ok(MessageId(message.message_id))
    }

    async fn edit_message(
        &self,
        chat: &ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<()> {
        let mut body = json!({ "chat_id": chat.as_str(), "message_id": message.0, "text": text });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = reply_markup(keyboard);
        }
        // Result is the edited message, or `true` for inline messages.
        let _: Value = self.call("editMessageText", &body).await?;
        Ok(())
    }

    #[instrument(skip(self, document), fields(file = %document.file_name, size = document.bytes.len()))]
    async fn send_document(&self, chat: &ChatId, document: &Document) -> Result<MessageId> {
        let part = Part::bytes(document.bytes.clone()).file_name(document.file_name.clone());
        let form = Form::new()
            .text("chat_id", chat.as_str().to_string())
            .text("caption", document.caption.clone())
            .part("document", part);
        let response = self
            .client
            .post(self.url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e))?;
        let message: Message = Self::finish("sendDocument", response).await?;
        Ok(MessageId(message.message_id))
    }

    async fn answer_choice(&self, callback_id: &str) -> Result<()> {
        let _: bool = self.call("answerCallbackQuery", &json!({ "callback_query_id": callback_id })).await?;
        Ok(())
    }
}
