//! Remote title index.
//!
//! An external harvester walks the channel's message history and writes one
//! `{title, filename, category}` object per distinct (title, category) pair to
//! a JSON file. This module only ever reads that file, as a whole, once per
//! reconciliation run.

use crate::error::{ErrorKind, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTitleEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub category: String,
}

/// Immutable snapshot of the remote title index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteIndex {
    entries: Vec<RemoteTitleEntry>,
}

/// Categories compare equal when they differ only by `-` vs `_`; the
/// category hashtag in a caption can't contain `-`, so it is rewritten.
pub fn same_category(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.chars().zip(b.chars()).all(|(x, y)| fold_separator(x) == fold_separator(y))
}

fn fold_separator(c: char) -> char {
    if c == '-' { '_' } else { c }
}

impl RemoteIndex {
    pub fn new(entries: impl IntoIterator<Item = RemoteTitleEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(Self::tidy).collect(),
        }
    }

    /// Load a snapshot from disk. A missing file is an empty index.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Remote index does not exist yet; treating the channel as empty");
                return Ok(Self::default());
            },
            Err(e) => exn::bail!(ErrorKind::Io(e)),
        };
        Self::from_json(&bytes)
    }

    /// Parse a JSON array, skipping anything that isn't a usable entry
    /// object (the harvester has historically written stray strings).
    /// An entry needs a filename or a title; either one is enough.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let values: Vec<Value> =
            serde_json::from_slice(bytes).map_err(|e| ErrorKind::MalformedIndex(e.to_string()))?;
        let total = values.len();
        let entries: Vec<RemoteTitleEntry> = values
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|v| serde_json::from_value::<RemoteTitleEntry>(v).ok())
            .map(Self::tidy)
            .filter(|entry| !entry.filename.is_empty())
            .collect();
        if entries.len() != total {
            tracing::debug!(skipped = total - entries.len(), "Ignored malformed remote index entries");
        }
        Ok(Self { entries })
    }

    fn tidy(mut entry: RemoteTitleEntry) -> RemoteTitleEntry {
        entry.title = entry.title.trim().to_string();
        entry.filename = entry.filename.trim().to_string();
        if entry.filename.is_empty() {
            entry.filename = entry.title.clone();
        }
        entry.category = entry.category.trim().trim_start_matches('#').to_string();
        entry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RemoteTitleEntry] {
        &self.entries
    }

    /// Entries whose category matches `category`, separator-insensitively.
    pub fn entries_for<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a RemoteTitleEntry> + 'a {
        self.entries.iter().filter(move |e| same_category(&e.category, category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("sci-fi", "sci_fi", true)]
    #[case("sci_fi", "sci-fi", true)]
    #[case("a-b_c", "a_b-c", true)]
    #[case("scifi", "sci_fi", false)]
    #[case("Fiction", "fiction", false)]
    fn category_comparison(#[case] a: &str, #[case] b: &str, #[case] expected: bool) {
        assert_eq!(same_category(a, b), expected);
    }

    #[test]
    fn skips_junk_and_tidies() {
        let json = br##"[
            "stray string",
            42,
            {"title": "Dune", "filename": "Dune", "category": "#sci_fi"},
            {"title": " Emma ", "category": "classics"},
            {"filename": "no title"},
            {"category": "nameless"},
            {"title": 7}
        ]"##;
        let index = RemoteIndex::from_json(json).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.entries()[0].category, "sci_fi");
        assert_eq!(index.entries()[1].title, "Emma");
        assert_eq!(index.entries()[1].filename, "Emma");
    }

    #[test]
    fn filename_without_title_is_kept() {
        let index = RemoteIndex::from_json(br#"[{"filename": "Dune", "category": "fiction"}]"#).unwrap();
        let entries: Vec<_> = index.entries_for("fiction").collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].filename, "Dune");
        assert!(entries[0].title.is_empty());
    }

    #[test]
    fn not_an_array() {
        let err = RemoteIndex::from_json(b"{\"title\": 1}").unwrap_err();
        assert!(matches!(&*err, ErrorKind::MalformedIndex(_)));
    }

    #[test]
    fn filters_by_category() {
        let index = RemoteIndex::new([
            RemoteTitleEntry { title: "A".into(), filename: "A".into(), category: "sci_fi".into() },
            RemoteTitleEntry { title: "B".into(), filename: "B".into(), category: "fantasy".into() },
            RemoteTitleEntry { title: "C".into(), filename: "C".into(), category: "sci-fi".into() },
        ]);
        let titles: Vec<_> = index.entries_for("sci-fi").map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["A", "C"]);
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = RemoteIndex::load(dir.path().join("channel_titles.json")).await.unwrap();
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channel_titles.json");
        tokio::fs::write(&path, r#"[{"title": "三体", "filename": "三体", "category": "科幻"}]"#).await.unwrap();
        let index = RemoteIndex::load(&path).await.unwrap();
        assert_eq!(index.entries_for("科幻").count(), 1);
    }
}
