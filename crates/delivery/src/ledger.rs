//! Sent-title ledger.
//!
//! A JSON array of artifact stems that have been delivered. The whole file is
//! loaded before and rewritten after every addition; writes go to a sibling
//! temporary file first and are renamed into place.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::instrument;

pub struct Ledger {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write: Mutex<()>,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every recorded title. A ledger that doesn't exist yet is empty.
    pub async fn load(&self) -> Result<BTreeSet<String>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e).or_raise(|| ErrorKind::Ledger(self.path.clone())),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeSet::new());
        }
        serde_json::from_slice(&bytes).or_raise(|| ErrorKind::Ledger(self.path.clone()))
    }

    pub async fn contains(&self, title: &str) -> Result<bool> {
        Ok(self.load().await?.contains(title.trim()))
    }

    /// Add `title`. Returns `false` (and writes nothing) if it was already
    /// recorded.
    #[instrument(skip(self), fields(ledger = %self.path.display()))]
    pub async fn record(&self, title: &str) -> Result<bool> {
        let _guard = self.write.lock().await;
        let mut titles = self.load().await?;
        if !titles.insert(title.trim().to_string()) {
            return Ok(false);
        }
        self.save(&titles).await?;
        tracing::debug!(total = titles.len(), "Recorded sent title");
        Ok(true)
    }

    async fn save(&self, titles: &BTreeSet<String>) -> Result<()> {
        let json = serde_json::to_vec_pretty(titles).or_raise(|| ErrorKind::Ledger(self.path.clone()))?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Ledger(self.path.clone()))?;
        }
        fs::write(&tmp, json).await.or_raise(|| ErrorKind::Ledger(tmp.clone()))?;
        fs::rename(&tmp, &self.path).await.or_raise(|| ErrorKind::Ledger(self.path.clone()))?;
        Ok(())
    }
}
