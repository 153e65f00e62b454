//! Inventory models.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Identifies one document in the local inventory.
///
/// `filename` is normally a sidecar filename (`"Dune.txt"`), but
/// reconciliation may fall back to a bare artifact stem (`"Dune"`) when no
/// sidecar exists. Either resolves to the same artifact via [`stem`](Self::stem).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    pub category: String,
    pub filename: String,
    /// `false` when `filename` is already an artifact stem.
    pub sidecar: bool,
}
impl DocumentRef {
    pub fn new(category: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            filename: filename.into(),
            sidecar: true,
        }
    }

    /// A document known only by its artifact stem. The stem is used as is,
    /// even when it happens to end in the sidecar extension.
    pub fn bare(category: impl Into<String>, stem: impl Into<String>) -> Self {
        Self {
            sidecar: false,
            ..Self::new(category, stem)
        }
    }

    /// Filename without the sidecar extension.
    pub fn stem(&self, sidecar_extension: &str) -> &str {
        if self.sidecar {
            strip_extension(&self.filename, sidecar_extension)
        } else {
            &self.filename
        }
    }
}
impl Display for DocumentRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.category, self.filename)
    }
}

/// A deliverable binary file, found by [`Inventory::locate_artifact`](crate::Inventory::locate_artifact)
/// or listed by [`Inventory::artifacts`](crate::Inventory::artifacts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Category directory the file was actually found in (may differ from
    /// the document's own category).
    pub category: String,
    /// Filename without extension; this is what gets recorded as sent.
    pub stem: String,
    /// Full filename, used as the upload name.
    pub file_name: String,
    pub size: u64,
}
impl Artifact {
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Strip `.{extension}` from the end of `name`, if present.
pub fn strip_extension<'a>(name: &'a str, extension: &str) -> &'a str {
    name.strip_suffix(extension)
        .and_then(|rest| rest.strip_suffix('.'))
        .filter(|stem| !stem.is_empty())
        .unwrap_or(name)
}
