//! Sidecar metadata parsing.
//!
//! Each document has a plain-text sidecar next to it with labelled fields:
//!
//! ```text
//! Title: The Left Hand of Darkness
//! Author: Ursula K. Le Guin
//! Intro:
//! A lone human emissary is sent to Winter...
//! ```
//!
//! Both ASCII (`:`) and full-width (`：`) colons are accepted, as is the CJK
//! label set (`标题`, `作者`, `简介`) found in older collections. Parsing is
//! total: anything missing falls back to a default and is flagged as such.

use regex::Regex;
use std::sync::LazyLock;

pub const UNKNOWN_AUTHOR: &str = "unknown";
pub const NO_INTRO: &str = "none";

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

regex!(TITLE_LABEL, r"^\s*(?:(?i:title)|标题)\s*[:：]\s*(.*)$");
regex!(AUTHOR_LABEL, r"^\s*(?:(?i:author)|作者)\s*[:：]\s*(.*)$");
regex!(INTRO_LABEL, r"^\s*(?:(?i:intro)|简介)\s*[:：]\s*(.*)$");

/// Which [`BookInfo`] fields were filled in by a default rather than the
/// sidecar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Defaulted {
    pub title: bool,
    pub author: bool,
    pub intro: bool,
}
impl Defaulted {
    pub fn all() -> Self {
        Self { title: true, author: true, intro: true }
    }

    pub fn any(&self) -> bool {
        self.title || self.author || self.intro
    }
}

/// Display metadata for one document. Recomputed on every delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookInfo {
    pub title: String,
    pub author: String,
    pub intro: String,
    pub defaulted: Defaulted,
}

impl BookInfo {
    /// Everything defaulted; `fallback_title` is usually the filename stem.
    pub fn fallback(fallback_title: impl Into<String>) -> Self {
        Self {
            title: fallback_title.into(),
            author: UNKNOWN_AUTHOR.to_string(),
            intro: NO_INTRO.to_string(),
            defaulted: Defaulted::all(),
        }
    }

    /// Parse sidecar `content`. Never fails.
    pub fn parse(fallback_title: &str, content: &str) -> Self {
        let lines: Vec<&str> = content.lines().collect();
        let mut title = None;
        let mut author = None;
        let mut intro = None;
        for (i, line) in lines.iter().enumerate() {
            if let Some(value) = capture(&TITLE_LABEL, line) {
                title = Some(value.to_string());
            } else if let Some(value) = capture(&AUTHOR_LABEL, line) {
                author = Some(value.to_string());
            } else if let Some(value) = capture(&INTRO_LABEL, line) {
                let mut body: Vec<&str> = Vec::new();
                if !value.is_empty() {
                    body.push(value);
                }
                body.extend(
                    lines[i + 1..]
                        .iter()
                        .take_while(|l| !TITLE_LABEL.is_match(l) && !AUTHOR_LABEL.is_match(l))
                        .filter(|l| !l.trim().is_empty())
                        .map(|l| l.trim_end()),
                );
                intro = Some(body.join("\n"));
            }
        }

        let title = title.filter(|t| !t.is_empty());
        let author = author.filter(|a| !a.is_empty());
        let intro = intro.filter(|i| !i.is_empty());
        let defaulted = Defaulted {
            title: title.is_none(),
            author: author.is_none(),
            intro: intro.is_none(),
        };
        Self {
            title: title.unwrap_or_else(|| fallback_title.to_string()),
            author: author.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            intro: intro.unwrap_or_else(|| NO_INTRO.to_string()),
            defaulted,
        }
    }
}

fn capture<'a>(label: &Regex, line: &'a str) -> Option<&'a str> {
    label.captures(line).and_then(|c| c.get(1)).map(|m| m.as_str().trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_sidecar() {
        let content = "Title: Solaris\nAuthor: Stanisław Lem\nIntro:\nA planet-wide ocean.\n\nIt thinks.\n";
        let info = BookInfo::parse("solaris", content);
        assert_eq!(info.title, "Solaris");
        assert_eq!(info.author, "Stanisław Lem");
        assert_eq!(info.intro, "A planet-wide ocean.\nIt thinks.");
        assert!(!info.defaulted.any());
    }

    #[test]
    fn cjk_labels_and_fullwidth_colons() {
        let content = "标题：三体\n作者：刘慈欣\n简介：\n地球往事。\n";
        let info = BookInfo::parse("三体", content);
        assert_eq!(info.title, "三体");
        assert_eq!(info.author, "刘慈欣");
        assert_eq!(info.intro, "地球往事。");
    }

    #[test]
    fn intro_on_label_line() {
        let info = BookInfo::parse("x", "Intro: Short and sweet.\nMore.\nAuthor: Someone");
        assert_eq!(info.intro, "Short and sweet.\nMore.");
        assert_eq!(info.author, "Someone");
    }

    #[test]
    fn intro_stops_at_next_label() {
        let info = BookInfo::parse("x", "Intro:\nfirst\nTitle: Late Title\nsecond");
        assert_eq!(info.intro, "first");
        assert_eq!(info.title, "Late Title");
    }

    #[test]
    fn missing_fields_fall_back() {
        let info = BookInfo::parse("Fallback Name", "just some prose\nwith no labels");
        assert_eq!(info.title, "Fallback Name");
        assert_eq!(info.author, UNKNOWN_AUTHOR);
        assert_eq!(info.intro, NO_INTRO);
        assert_eq!(info.defaulted, Defaulted::all());
    }

    #[test]
    fn blank_values_count_as_missing() {
        let info = BookInfo::parse("Name", "Title:   \nAuthor: A\nIntro:\n\n  \n");
        assert_eq!(info.title, "Name");
        assert!(info.defaulted.title);
        assert!(!info.defaulted.author);
        assert!(info.defaulted.intro);
    }

    #[test]
    fn empty_content() {
        assert_eq!(BookInfo::parse("Name", ""), BookInfo::fallback("Name"));
    }
}
