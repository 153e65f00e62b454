//! Pieces shared by every conversation.

use crate::choice::{Choice, Quantity};
use shelfcast_config::Selection;
use shelfcast_delivery::{Deliverer, Notifier};
use shelfcast_inventory::InventoryHandle;
use shelfcast_transport::{Button, ChatId, Keyboard, MessageId};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a conversation step may use.
pub struct Services {
    pub deliverer: Arc<Deliverer>,
    pub selection: Selection,
    /// Where the harvester leaves the channel title index.
    pub remote_index: PathBuf,
}

impl Services {
    pub fn inventory(&self) -> &InventoryHandle {
        self.deliverer.inventory()
    }

    pub fn notifier(&self) -> &Notifier {
        self.deliverer.notifier()
    }
}

/// One operator event, as a conversation sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Text(String),
    Choice(Choice),
    /// A button token we don't recognise.
    Invalid(String),
}

impl Input {
    pub fn from_choice_data(data: &str) -> Self {
        match data.parse() {
            Ok(choice) => Self::Choice(choice),
            Err(_) => Self::Invalid(data.to_string()),
        }
    }
}

/// Where answers to the current event go.
///
/// Prompts triggered by a button press replace the message that carried the
/// button, so the chat doesn't fill up with stale keyboards.
pub struct Reply<'a> {
    pub services: &'a Services,
    pub chat: &'a ChatId,
    pub origin: Option<MessageId>,
}

impl Reply<'_> {
    pub async fn show(&self, text: &str, keyboard: Option<&Keyboard>) {
        let notifier = self.services.notifier();
        if let Some(origin) = self.origin
            && notifier.replace(self.chat, origin, text, keyboard).await
        {
            return;
        }
        match keyboard {
            Some(keyboard) => notifier.prompt(self.chat, text, keyboard).await,
            None => notifier.say(self.chat, text).await,
        };
    }

    /// Always a fresh message.
    pub async fn say(&self, text: &str) {
        self.services.notifier().say(self.chat, text).await;
    }
}

/// Shorten `name` to `width` characters for a button label.
pub fn label(name: &str, width: usize) -> String {
    if name.chars().count() <= width || width <= 3 {
        return name.to_string();
    }
    let mut short: String = name.chars().take(width - 3).collect();
    short.push_str("...");
    short
}

/// Categories two to a row, each button carrying `token(position)`.
pub fn category_keyboard(categories: &[String], token: fn(usize) -> Choice) -> Keyboard {
    let buttons: Vec<Button> = categories.iter().enumerate().map(|(i, c)| Button::new(c.clone(), token(i))).collect();
    buttons.chunks(2).fold(Keyboard::default(), |kb, pair| kb.row(pair.iter().cloned()))
}

pub fn count_keyboard(options: &[u32]) -> Keyboard {
    let mut buttons: Vec<Button> = options
        .iter()
        .map(|n| Button::new(n.to_string(), Choice::Count(Quantity::Exactly(*n))))
        .collect();
    buttons.push(Button::new("All", Choice::Count(Quantity::All)));
    buttons
        .chunks(3)
        .fold(Keyboard::default(), |kb, row| kb.row(row.iter().cloned()))
        .row([Button::new("Back to categories", Choice::BackToCategories)])
}

pub fn main_menu() -> Keyboard {
    Keyboard::column([
        Button::new("Upload books", Choice::MenuUpload),
        Button::new("Upload from a starting book", Choice::MenuUploadFrom),
        Button::new("Check channel and backfill", Choice::MenuCheckFill),
    ])
}

pub const DESTINATION_PROMPT: &str =
    "Send the destination channel id or username (e.g. @my_channel, -1001234567890 or https://t.me/my_channel):";

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Short", 30, "Short")]
    #[case("A Very Long Title That Goes On And On", 30, "A Very Long Title That Goes...")]
    #[case("三体三体三体", 5, "三体...")]
    fn labels(#[case] name: &str, #[case] width: usize, #[case] expected: &str) {
        assert_eq!(label(name, width), expected);
    }

    #[test]
    fn categories_pair_up() {
        let categories: Vec<String> = ["a", "b", "c"].map(String::from).to_vec();
        let kb = category_keyboard(&categories, Choice::Category);
        assert_eq!(kb.rows.len(), 2);
        assert_eq!(kb.rows[1][0].data, "cat_2");
        let kb = category_keyboard(&categories, Choice::CheckCategory);
        assert_eq!(kb.rows[0][1].data, "checkcat_1");
    }

    #[test]
    fn counts_end_with_all_and_back() {
        let kb = count_keyboard(&[1, 3, 5, 10]);
        let data: Vec<&str> = kb.buttons().map(|b| b.data.as_str()).collect();
        assert_eq!(data, ["count_1", "count_3", "count_5", "count_10", "count_all", "back_to_categories"]);
        assert_eq!(kb.rows.len(), 3);
    }

    #[test]
    fn unknown_tokens_are_invalid_input() {
        assert_eq!(Input::from_choice_data("cat_1"), Input::Choice(Choice::Category(1)));
        assert_eq!(Input::from_choice_data("nope"), Input::Invalid("nope".into()));
    }
}
