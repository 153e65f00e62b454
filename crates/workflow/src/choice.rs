//! Choice-token codec.
//!
//! Every button we send carries one of these as its data, and every button
//! press comes back as one. Anything that doesn't parse is treated as
//! invalid input by the conversation that receives it.

use derive_more::{Display, Error};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Choice {
    #[display("menu_upload")]
    MenuUpload,
    #[display("menu_uploadfrom")]
    MenuUploadFrom,
    #[display("menu_checkfill")]
    MenuCheckFill,
    /// Category (by position) for a counted upload.
    #[display("cat_{_0}")]
    Category(usize),
    /// Category (by position) for an upload starting after an anchor book.
    #[display("catfrom_{_0}")]
    AnchorCategory(usize),
    #[display("{_0}")]
    Count(Quantity),
    #[display("back_to_categories")]
    BackToCategories,
    /// Book by short id.
    #[display("book_{_0}")]
    Book(String),
    #[display("back_to_count")]
    BackToCount,
    /// Anchor book by position in the category's ordering.
    #[display("startbook_{_0}")]
    StartBook(usize),
    /// Category (by position) to reconcile.
    #[display("checkcat_{_0}")]
    CheckCategory(usize),
    #[display("{}", if *_0 { "checkconfirm_yes" } else { "checkconfirm_no" })]
    CheckConfirm(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Quantity {
    #[display("count_{_0}")]
    Exactly(u32),
    #[display("count_all")]
    All,
}

#[derive(Debug, Display, Error, PartialEq, Eq)]
#[display("unrecognised choice: {_0:?}")]
pub struct UnknownChoice(#[error(not(source))] pub String);

impl FromStr for Choice {
    type Err = UnknownChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownChoice(s.to_string());
        let index = |rest: &str| rest.parse::<usize>().map_err(|_| unknown());
        Ok(match s {
            "menu_upload" => Self::MenuUpload,
            "menu_uploadfrom" => Self::MenuUploadFrom,
            "menu_checkfill" => Self::MenuCheckFill,
            "back_to_categories" => Self::BackToCategories,
            "back_to_count" => Self::BackToCount,
            "count_all" => Self::Count(Quantity::All),
            "checkconfirm_yes" => Self::CheckConfirm(true),
            "checkconfirm_no" => Self::CheckConfirm(false),
            _ => {
                if let Some(rest) = s.strip_prefix("catfrom_") {
                    Self::AnchorCategory(index(rest)?)
                } else if let Some(rest) = s.strip_prefix("cat_") {
                    Self::Category(index(rest)?)
                } else if let Some(rest) = s.strip_prefix("checkcat_") {
                    Self::CheckCategory(index(rest)?)
                } else if let Some(rest) = s.strip_prefix("startbook_") {
                    Self::StartBook(index(rest)?)
                } else if let Some(rest) = s.strip_prefix("count_") {
                    match rest.parse::<u32>() {
                        Ok(n) if n > 0 => Self::Count(Quantity::Exactly(n)),
                        _ => return Err(unknown()),
                    }
                } else if let Some(rest) = s.strip_prefix("book_")
                    && !rest.is_empty()
                    && rest.chars().all(|c| c.is_ascii_hexdigit())
                {
                    Self::Book(rest.to_string())
                } else {
                    return Err(unknown());
                }
            },
        })
    }
}
