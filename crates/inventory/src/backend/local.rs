//! Local filesystem inventory.
//!
//! Reads the sidecar and artifact trees with `tokio::fs`. Every category and
//! filename is validated as a single path component before being joined onto
//! a root, so nothing outside the two roots is ever touched.

use crate::backend::Inventory;
use crate::error::{ErrorKind, Result};
use crate::models::{Artifact, strip_extension};
use crate::path::validate as validate_name;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem inventory.
///
/// # Examples
///
/// ```no_run
/// use shelfcast_inventory::LocalInventory;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let inventory = LocalInventory::new("local", "/srv/books/sidecars", "/srv/books/epub", "txt", "epub")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalInventory {
    name: String,
    sidecars: PathBuf,
    artifacts: PathBuf,
    sidecar_extension: String,
    artifact_extension: String,
}

impl LocalInventory {
    /// Create a new local inventory.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRoot`](ErrorKind::InvalidRoot) if either root is
    /// relative, or exists but isn't a directory. Roots that don't exist
    /// yet are fine; they simply list as empty.
    pub fn new(
        name: impl Into<String>,
        sidecars: impl AsRef<Path>,
        artifacts: impl AsRef<Path>,
        sidecar_extension: impl Into<String>,
        artifact_extension: impl Into<String>,
    ) -> Result<Self> {
        let sidecars = Self::check_root(sidecars.as_ref())?;
        let artifacts = Self::check_root(artifacts.as_ref())?;
        Ok(Self {
            name: name.into(),
            sidecars,
            artifacts,
            sidecar_extension: sidecar_extension.into(),
            artifact_extension: artifact_extension.into(),
        })
    }

    fn check_root(root: &Path) -> Result<PathBuf> {
        if !root.is_absolute() || (root.exists() && !root.is_dir()) {
            exn::bail!(ErrorKind::InvalidRoot(root.to_path_buf()));
        }
        Ok(root.to_path_buf())
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    fn artifact_file_name(&self, stem: &str) -> String {
        format!("{stem}.{}", self.artifact_extension)
    }

    /// Sorted names of the directories (or regular files) directly inside
    /// `dir`. A missing directory lists as empty.
    async fn list_dir(dir: &Path, want_dirs: bool) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => exn::bail!(Self::map_io_error(e, dir)),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Self::map_io_error(e, dir))? {
            let file_type = entry.file_type().await.map_err(|e| Self::map_io_error(e, &entry.path()))?;
            let matches = if want_dirs { file_type.is_dir() } else { file_type.is_file() };
            if !matches {
                continue;
            }
            // Non-UTF-8 names can't round-trip through choice tokens or the
            // remote index, so they don't exist as far as we're concerned.
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => tracing::debug!(name = ?raw, dir = %dir.display(), "Skipping non UTF-8 entry"),
            }
        }
        names.sort();
        Ok(names)
    }

    fn has_extension(name: &str, extension: &str) -> bool {
        strip_extension(name, extension) != name
    }
}

#[async_trait]
impl Inventory for LocalInventory {
    fn name(&self) -> &str {
        &self.name
    }

    fn sidecar_extension(&self) -> &str {
        &self.sidecar_extension
    }

    async fn categories(&self) -> Result<Vec<String>> {
        Self::list_dir(&self.sidecars, true).await
    }

    async fn documents(&self, category: &str) -> Result<Vec<String>> {
        let dir = self.sidecars.join(validate_name(category)?);
        let mut files = Self::list_dir(&dir, false).await?;
        files.retain(|f| Self::has_extension(f, &self.sidecar_extension));
        Ok(files)
    }

    async fn read_sidecar(&self, category: &str, filename: &str) -> Result<String> {
        let path = self.sidecars.join(validate_name(category)?).join(validate_name(filename)?);
        let bytes = fs::read(&path).await.map_err(|e| Self::map_io_error(e, &path))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn artifact_categories(&self) -> Result<Vec<String>> {
        Self::list_dir(&self.artifacts, true).await
    }

    async fn artifacts(&self, category: &str) -> Result<Vec<Artifact>> {
        let dir = self.artifacts.join(validate_name(category)?);
        let mut found = Vec::new();
        for file_name in Self::list_dir(&dir, false).await? {
            let stem = strip_extension(&file_name, &self.artifact_extension);
            if stem == file_name {
                continue;
            }
            let stem = stem.to_string();
            let path = dir.join(&file_name);
            let metadata = fs::metadata(&path).await.map_err(|e| Self::map_io_error(e, &path))?;
            found.push(Artifact {
                category: category.to_string(),
                stem,
                file_name,
                size: metadata.len(),
            });
        }
        Ok(found)
    }

    async fn stat_artifact(&self, category: &str, stem: &str) -> Result<Option<Artifact>> {
        let file_name = self.artifact_file_name(stem);
        let path = self.artifacts.join(validate_name(category)?).join(validate_name(&file_name)?);
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(Some(Artifact {
                category: category.to_string(),
                stem: stem.to_string(),
                file_name,
                size: metadata.len(),
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => exn::bail!(Self::map_io_error(e, &path)),
        }
    }

    async fn read_artifact(&self, artifact: &Artifact) -> Result<Vec<u8>> {
        let path = self
            .artifacts
            .join(validate_name(&artifact.category)?)
            .join(validate_name(&artifact.file_name)?);
        Ok(fs::read(&path).await.map_err(|e| Self::map_io_error(e, &path))?)
    }
}
