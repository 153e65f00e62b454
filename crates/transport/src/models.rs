//! Transport-neutral message and event types.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// A chat or channel address: a numeric id (`"-1001234"`) or a public
/// username (`"@shelf"`). Kept as text because both forms are accepted by
/// the APIs we speak.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(String);
impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl Display for ChatId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}
impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);
impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    /// Opaque token handed back in [`EventKind::Choice`] when pressed.
    pub data: String,
}
impl Button {
    pub fn new(label: impl Into<String>, data: impl ToString) -> Self {
        Self {
            label: label.into(),
            data: data.to_string(),
        }
    }
}

/// Inline choice buttons attached to a message, laid out in rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}
impl Keyboard {
    /// One button per row.
    pub fn column(buttons: impl IntoIterator<Item = Button>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    pub fn row(mut self, buttons: impl IntoIterator<Item = Button>) -> Self {
        let row: Vec<Button> = buttons.into_iter().collect();
        if !row.is_empty() {
            self.rows.push(row);
        }
        self
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }
}

/// A file upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub caption: String,
}

/// Inbound operator activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub chat: ChatId,
    pub user: UserId,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// `/name`, lower-cased, without the slash, bot suffix, or arguments.
    Command(String),
    /// Free text.
    Text(String),
    /// A button press on one of our messages.
    Choice {
        callback_id: String,
        data: String,
        message: MessageId,
    },
}
impl EventKind {
    /// Classify a plain text message as a command or free text.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        match trimmed.strip_prefix('/') {
            Some(rest) if rest.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) => {
                let word = rest.split_whitespace().next().unwrap_or_default();
                let name = word.split('@').next().unwrap_or_default();
                Self::Command(name.to_ascii_lowercase())
            },
            _ => Self::Text(trimmed.to_string()),
        }
    }
}
