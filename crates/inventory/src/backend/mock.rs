//! In-memory inventory for testing.

use crate::Inventory;
use crate::error::{ErrorKind, Result};
use crate::models::{Artifact, strip_extension};
use crate::path::validate as validate_name;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

type Tree = BTreeMap<String, BTreeMap<String, Vec<u8>>>;

/// In-memory inventory for testing.
///
/// Both trees live in `BTreeMap`s behind a [`RwLock`], so listings come back
/// sorted and files can be added or removed mid-test through `&self`.
///
/// # Examples
///
/// ```
/// use shelfcast_inventory::{Inventory, MockInventory};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let inventory = MockInventory::default()
///     .with_sidecars([("fiction", "Dune.txt", "Title: Dune")])
///     .with_artifacts([("fiction", "Dune.epub", b"epub".as_slice())]);
/// assert_eq!(inventory.documents("fiction").await?, ["Dune.txt"]);
/// assert!(inventory.locate_artifact("fiction", "Dune").await?.is_some());
/// # Ok(())
/// # }
/// ```
pub struct MockInventory {
    name: String,
    sidecar_extension: String,
    artifact_extension: String,
    sidecars: RwLock<Tree>,
    artifacts: RwLock<Tree>,
}

impl MockInventory {
    /// Add sidecar files.
    ///
    /// Panics if a category or filename fails validation. If test setup is
    /// wrong, then test should not pass.
    pub fn with_sidecars<'a>(self, files: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>) -> Self {
        let tree = self.sidecars.into_inner();
        let tree = Self::insert_all(tree, files.into_iter().map(|(c, f, text)| (c, f, text.as_bytes())));
        Self {
            sidecars: RwLock::new(tree),
            ..self
        }
    }

    /// Add artifact files. Same panics as [`with_sidecars`](Self::with_sidecars).
    pub fn with_artifacts<'a>(self, files: impl IntoIterator<Item = (&'a str, &'a str, &'a [u8])>) -> Self {
        let tree = self.artifacts.into_inner();
        let tree = Self::insert_all(tree, files);
        Self {
            artifacts: RwLock::new(tree),
            ..self
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn insert_all<'a>(mut tree: Tree, files: impl IntoIterator<Item = (&'a str, &'a str, &'a [u8])>) -> Tree {
        for (category, file_name, data) in files {
            if validate_name(category).is_err() || validate_name(file_name).is_err() {
                panic!("MockInventory: invalid entry {category}/{file_name}");
            }
            tree.entry(category.to_string()).or_default().insert(file_name.to_string(), data.to_vec());
        }
        tree
    }

    /// Add or replace an artifact.
    pub async fn put_artifact(&self, category: &str, file_name: &str, data: &[u8]) -> Result<()> {
        validate_name(category)?;
        validate_name(file_name)?;
        self.artifacts
            .write()
            .await
            .entry(category.to_string())
            .or_default()
            .insert(file_name.to_string(), data.to_vec());
        Ok(())
    }

    /// Remove an artifact, as if someone deleted it between listing and
    /// delivery.
    pub async fn remove_artifact(&self, category: &str, file_name: &str) -> Result<()> {
        let mut guard = self.artifacts.write().await;
        guard
            .get_mut(category)
            .and_then(|files| files.remove(file_name))
            .map(|_| ())
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(PathBuf::from(category).join(file_name))))
    }

    fn artifact(&self, category: &str, file_name: &str, data: &[u8]) -> Option<Artifact> {
        let stem = strip_extension(file_name, &self.artifact_extension);
        (stem != file_name).then(|| Artifact {
            category: category.to_string(),
            stem: stem.to_string(),
            file_name: file_name.to_string(),
            size: data.len() as u64,
        })
    }
}

impl Default for MockInventory {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            sidecar_extension: "txt".to_string(),
            artifact_extension: "epub".to_string(),
            sidecars: RwLock::default(),
            artifacts: RwLock::default(),
        }
    }
}

#[async_trait]
impl Inventory for MockInventory {
    fn name(&self) -> &str {
        &self.name
    }

    fn sidecar_extension(&self) -> &str {
        &self.sidecar_extension
    }

    async fn categories(&self) -> Result<Vec<String>> {
        Ok(self.sidecars.read().await.keys().cloned().collect())
    }

    async fn documents(&self, category: &str) -> Result<Vec<String>> {
        validate_name(category)?;
        let guard = self.sidecars.read().await;
        Ok(guard
            .get(category)
            .map(|files| {
                files
                    .keys()
                    .filter(|f| strip_extension(f, &self.sidecar_extension) != f.as_str())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn read_sidecar(&self, category: &str, filename: &str) -> Result<String> {
        validate_name(category)?;
        validate_name(filename)?;
        let guard = self.sidecars.read().await;
        let data = guard
            .get(category)
            .and_then(|files| files.get(filename))
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(PathBuf::from(category).join(filename))))?;
        Ok(String::from_utf8_lossy(data).into_owned())
    }

    async fn artifact_categories(&self) -> Result<Vec<String>> {
        Ok(self.artifacts.read().await.keys().cloned().collect())
    }

    async fn artifacts(&self, category: &str) -> Result<Vec<Artifact>> {
        validate_name(category)?;
        let guard = self.artifacts.read().await;
        Ok(guard
            .get(category)
            .map(|files| files.iter().filter_map(|(name, data)| self.artifact(category, name, data)).collect())
            .unwrap_or_default())
    }

    async fn stat_artifact(&self, category: &str, stem: &str) -> Result<Option<Artifact>> {
        validate_name(category)?;
        let file_name = format!("{stem}.{}", self.artifact_extension);
        let guard = self.artifacts.read().await;
        Ok(guard
            .get(category)
            .and_then(|files| files.get(&file_name))
            .and_then(|data| self.artifact(category, &file_name, data)))
    }

    async fn read_artifact(&self, artifact: &Artifact) -> Result<Vec<u8>> {
        let guard = self.artifacts.read().await;
        guard
            .get(&artifact.category)
            .and_then(|files| files.get(&artifact.file_name))
            .cloned()
            .ok_or_else(|| {
                exn::Exn::from(ErrorKind::NotFound(PathBuf::from(&artifact.category).join(&artifact.file_name)))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn removal_is_visible() {
        let inventory = MockInventory::default().with_artifacts([("fiction", "A.epub", b"a".as_slice())]);
        let found = inventory.locate_artifact("fiction", "A").await.unwrap().unwrap();
        inventory.remove_artifact("fiction", "A.epub").await.unwrap();
        let err = inventory.read_artifact(&found).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn ignores_foreign_extensions() {
        let inventory = MockInventory::default()
            .with_sidecars([("fiction", "A.txt", ""), ("fiction", "readme.md", "")])
            .with_artifacts([("fiction", "A.epub", b"".as_slice()), ("fiction", "A.pdf", b"x".as_slice())]);
        assert_eq!(inventory.documents("fiction").await.unwrap(), ["A.txt"]);
        let artifacts = inventory.artifacts("fiction").await.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert!(artifacts[0].is_empty());
    }

    #[test]
    #[should_panic(expected = "invalid entry")]
    fn invalid_setup_panics() {
        let _ = MockInventory::default().with_sidecars([("..", "x.txt", "")]);
    }
}
