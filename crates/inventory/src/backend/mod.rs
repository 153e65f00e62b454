//! Inventory trait and implementations.
//!
//! An inventory is two parallel directory-per-category trees: sidecar text
//! files describing each document, and the binary artifacts that actually get
//! delivered. This crate only reads them; creating the layout is someone
//! else's job.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalInventory;
#[cfg(feature = "mock")]
pub use self::mock::MockInventory;
use crate::error::Result;
use crate::models::{Artifact, DocumentRef};
use crate::sidecar::BookInfo;
use async_trait::async_trait;

/// Read-only access to the local document collection.
///
/// # Examples
///
/// ```
/// use shelfcast_inventory::{DocumentRef, Inventory, error::Result};
///
/// async fn artifact_size(inventory: &dyn Inventory, doc: &DocumentRef) -> Result<u64> {
///     let stem = doc.stem(inventory.sidecar_extension());
///     Ok(match inventory.locate_artifact(&doc.category, stem).await? {
///         Some(artifact) => artifact.size,
///         None => 0,
///     })
/// }
/// ```
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Name of the configured inventory, for logging only.
    fn name(&self) -> &str;

    /// Extension (without the dot) identifying sidecar files.
    fn sidecar_extension(&self) -> &str;

    /// Sidecar categories, sorted.
    async fn categories(&self) -> Result<Vec<String>>;

    /// Sidecar filenames in `category`, sorted. This order is the category's
    /// canonical ordering (used by "upload from anchor").
    async fn documents(&self, category: &str) -> Result<Vec<String>>;

    /// Raw sidecar text. Invalid UTF-8 is replaced rather than rejected.
    async fn read_sidecar(&self, category: &str, filename: &str) -> Result<String>;

    /// Artifact categories, sorted.
    async fn artifact_categories(&self) -> Result<Vec<String>>;

    /// Every artifact in `category`. A missing category is empty, not an
    /// error.
    async fn artifacts(&self, category: &str) -> Result<Vec<Artifact>>;

    /// The artifact named exactly `stem` in `category`, if there is one.
    async fn stat_artifact(&self, category: &str, stem: &str) -> Result<Option<Artifact>>;

    /// Artifact contents.
    async fn read_artifact(&self, artifact: &Artifact) -> Result<Vec<u8>>;

    /// Find the artifact for `stem`: the document's own category first, then
    /// every artifact category in order.
    async fn locate_artifact(&self, category: &str, stem: &str) -> Result<Option<Artifact>> {
        if let Some(found) = self.stat_artifact(category, stem).await? {
            return Ok(Some(found));
        }
        for other in self.artifact_categories().await? {
            if other == category {
                continue;
            }
            if let Some(found) = self.stat_artifact(&other, stem).await? {
                tracing::debug!(inventory = self.name(), %category, found_in = %other, %stem, "Artifact found outside its category");
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Best-effort [`BookInfo`] for `doc`: unreadable sidecars produce
    /// defaults instead of an error.
    async fn book_info(&self, doc: &DocumentRef) -> BookInfo {
        let fallback = doc.stem(self.sidecar_extension()).to_string();
        if !doc.sidecar {
            return BookInfo::fallback(fallback);
        }
        match self.read_sidecar(&doc.category, &doc.filename).await {
            Ok(content) => BookInfo::parse(&fallback, &content),
            Err(e) => {
                tracing::warn!(inventory = self.name(), document = %doc, error = %e, "Sidecar unreadable; using defaults");
                BookInfo::fallback(fallback)
            },
        }
    }
}
