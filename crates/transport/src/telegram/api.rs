//! Bot API wire types.
//!
//! Only the fields we read are modelled; serde ignores the rest.

use crate::error::ErrorKind;
use crate::{ChatId, Event, EventKind, Keyboard, MessageId, UserId};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Update {
    pub update_id: i64,
    message: Option<Message>,
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Message {
    pub message_id: i64,
    chat: Chat,
    from: Option<User>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: User,
    message: Option<Message>,
    data: Option<String>,
}

/// Unwrap a response body, mapping API-level rejections onto [`ErrorKind`].
pub(crate) fn decode<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<T, ErrorKind> {
    let envelope: Envelope<T> = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(e) if (200..300).contains(&status) => return Err(ErrorKind::Other(format!("undecodable response: {e}"))),
        Err(_) => return Err(ErrorKind::Api(format!("HTTP {status}"))),
    };
    if envelope.ok {
        return envelope.result.ok_or_else(|| ErrorKind::Other("response without result".to_string()));
    }
    if let Some(seconds) = envelope.parameters.and_then(|p| p.retry_after) {
        return Err(ErrorKind::RetryAfter(Duration::from_secs(seconds)));
    }
    Err(ErrorKind::Api(envelope.description.unwrap_or_else(|| format!("HTTP {status}"))))
}

pub(crate) fn map_reqwest_error(e: &reqwest::Error) -> ErrorKind {
    if e.is_timeout() {
        ErrorKind::TimedOut
    } else if e.is_connect() || e.is_request() || e.is_body() {
        ErrorKind::Network(e.to_string())
    } else if e.is_decode() || e.is_builder() {
        ErrorKind::Other(e.to_string())
    } else {
        ErrorKind::Network(e.to_string())
    }
}

pub(crate) fn reply_markup(keyboard: &Keyboard) -> Value {
    let rows: Vec<Vec<Value>> = keyboard
        .rows
        .iter()
        .map(|row| row.iter().map(|b| json!({ "text": b.label, "callback_data": b.data })).collect())
        .collect();
    json!({ "inline_keyboard": rows })
}

impl Update {
    /// The operator event this update carries, if it is one we handle.
    pub(crate) fn into_event(self) -> Option<Event> {
        if let Some(query) = self.callback_query {
            let message = query.message?;
            return Some(Event {
                chat: ChatId::from(message.chat.id),
                user: UserId(query.from.id),
                kind: EventKind::Choice {
                    callback_id: query.id,
                    data: query.data.unwrap_or_default(),
                    message: MessageId(message.message_id),
                },
            });
        }
        let message = self.message?;
        let text = message.text?;
        let user = message.from.map(|u| u.id).unwrap_or(message.chat.id);
        Some(Event {
            chat: ChatId::from(message.chat.id),
            user: UserId(user),
            kind: EventKind::from_text(&text),
        })
    }
}
