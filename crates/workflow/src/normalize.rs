//! Filename normalization.
//!
//! Local artifacts and remote captions are named independently, so they are
//! compared on a lossy key: lower-cased, with everything except ASCII
//! letters, digits and CJK unified ideographs (U+4E00..=U+9FA5) removed.
//! Separators (whitespace, `_`, `-`) and punctuation all disappear.

use regex::Regex;
use std::sync::LazyLock;

static NOT_KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9\x{4e00}-\x{9fa5}]+").unwrap());

/// Comparison key for a filename or title. Never fails; may be empty.
///
/// ```
/// use shelfcast_workflow::normalize;
/// assert_eq!(normalize("The Left-Hand_of Darkness!"), "thelefthandofdarkness");
/// assert_eq!(normalize("三体 (第一部)"), "三体第一部");
/// ```
pub fn normalize(name: &str) -> String {
    NOT_KEY.replace_all(&name.to_lowercase(), "").into_owned()
}
