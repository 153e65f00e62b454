//! Document captions.

use shelfcast_config::{CaptionLabels, Delivery};
use shelfcast_inventory::BookInfo;

const ELLIPSIS: &str = "...";

/// Builds the caption attached to every delivered document.
///
/// ```text
/// Title: Dune
/// Category: #sci_fi
/// Intro: A desert planet...
/// ```
///
/// The category becomes a hashtag, so `-` is rewritten to `_`. Captions
/// longer than the limit (in characters) are cut and end with `...`.
#[derive(Debug, Clone)]
pub struct CaptionBuilder {
    labels: CaptionLabels,
    limit: usize,
}

impl CaptionBuilder {
    pub fn new(labels: CaptionLabels, limit: usize) -> Self {
        Self {
            labels,
            limit: limit.max(ELLIPSIS.len() + 1),
        }
    }

    pub fn build(&self, info: &BookInfo, category: &str) -> String {
        let caption = format!(
            "{}: {}\n{}: #{}\n{}: {}",
            self.labels.title,
            info.title,
            self.labels.category,
            hashtag(category),
            self.labels.intro,
            info.intro,
        );
        truncate(caption, self.limit)
    }
}

impl From<&Delivery> for CaptionBuilder {
    fn from(delivery: &Delivery) -> Self {
        Self::new(delivery.caption_labels.clone(), delivery.caption_limit)
    }
}

pub fn hashtag(category: &str) -> String {
    category.replace('-', "_")
}

fn truncate(text: String, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text;
    }
    let keep = limit - ELLIPSIS.len();
    let mut cut: String = text.chars().take(keep).collect();
    cut.push_str(ELLIPSIS);
    cut
}
