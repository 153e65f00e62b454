//! Layered configuration for shelfcast.
//!
//! Values are resolved in order, later layers winning:
//!
//! 1. Compiled-in defaults ([`Config::default`]),
//! 2. a TOML file (explicit path, or `config.toml` in the platform config
//!    directory),
//! 3. `SHELFCAST_*` environment variables, using `__` to descend into
//!    sections (`SHELFCAST_RETRY__MAX_RETRIES=3`),
//! 4. `TELEGRAM_BOT_TOKEN`, mapped onto `bot.token`.
//!
//! Durations are stored as integer milliseconds so the TOML stays readable;
//! use the accessor methods to get [`Duration`]s.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "SHELFCAST_";
const TOKEN_VARIABLE: &str = "TELEGRAM_BOT_TOKEN";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bot: Bot,
    pub paths: Paths,
    pub retry: Retry,
    pub delivery: Delivery,
    pub selection: Selection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bot {
    pub token: Option<String>,
    pub poll_timeout_secs: u64,
}
impl Default for Bot {
    fn default() -> Self {
        Self { token: None, poll_timeout_secs: 30 }
    }
}

/// Where the local collection and the bookkeeping files live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Directory-per-category of sidecar text files.
    pub sidecars: PathBuf,
    /// Directory-per-category of the deliverable artifacts.
    pub artifacts: PathBuf,
    pub sidecar_extension: String,
    pub artifact_extension: String,
    /// Sent-title ledger (JSON array).
    pub ledger: PathBuf,
    /// Remote title index written by the channel harvester (JSON array).
    pub remote_index: PathBuf,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            sidecars: PathBuf::from("processed_books"),
            artifacts: PathBuf::from("categorized_books"),
            sidecar_extension: "txt".to_string(),
            artifact_extension: "epub".to_string(),
            ledger: PathBuf::from("sent_titles.json"),
            remote_index: PathBuf::from("channel_titles.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Retry {
    /// Retries allowed after the first attempt, per failure.
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Hard deadline for a single remote call.
    pub deadline_ms: u64,
    /// Added on top of the wait the API asks for.
    pub rate_limit_margin_ms: u64,
    /// How often the rate-limit countdown message is edited.
    pub countdown_interval_ms: u64,
}
impl Default for Retry {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            deadline_ms: 60_000,
            rate_limit_margin_ms: 1_000,
            countdown_interval_ms: 5_000,
        }
    }
}
impl Retry {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn rate_limit_margin(&self) -> Duration {
        Duration::from_millis(self.rate_limit_margin_ms)
    }

    pub fn countdown_interval(&self) -> Duration {
        Duration::from_millis(self.countdown_interval_ms)
    }
}

/// Labels written into captions. The channel harvester parses them back out
/// of the message text, so they must match whatever it was configured with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionLabels {
    pub title: String,
    pub category: String,
    pub intro: String,
}
impl Default for CaptionLabels {
    fn default() -> Self {
        Self {
            title: "Title".to_string(),
            category: "Category".to_string(),
            intro: "Intro".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delivery {
    /// Maximum caption length, in characters.
    pub caption_limit: usize,
    pub caption_labels: CaptionLabels,
    /// Whole-send attempts layered on top of the executor's own retries.
    pub upload_attempts: u32,
    pub upload_retry_delay_ms: u64,
    /// Pause before the first send after a recovered retry.
    pub post_retry_delay_ms: u64,
    /// Pause before the next item after a rate-limit recovery.
    pub rate_limit_settle_ms: u64,
    /// Gap between successive backfill deliveries.
    pub reconcile_pacing_ms: u64,
}
impl Default for Delivery {
    fn default() -> Self {
        Self {
            caption_limit: 1024,
            caption_labels: CaptionLabels::default(),
            upload_attempts: 3,
            upload_retry_delay_ms: 2_000,
            post_retry_delay_ms: 5_000,
            rate_limit_settle_ms: 15_000,
            reconcile_pacing_ms: 1_500,
        }
    }
}
impl Delivery {
    pub fn upload_retry_delay(&self) -> Duration {
        Duration::from_millis(self.upload_retry_delay_ms)
    }

    pub fn post_retry_delay(&self) -> Duration {
        Duration::from_millis(self.post_retry_delay_ms)
    }

    pub fn rate_limit_settle(&self) -> Duration {
        Duration::from_millis(self.rate_limit_settle_ms)
    }

    pub fn reconcile_pacing(&self) -> Duration {
        Duration::from_millis(self.reconcile_pacing_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selection {
    /// Candidates shown per book-picking screen.
    pub page_size: usize,
    /// Button labels longer than this are shortened.
    pub label_width: usize,
    pub count_options: Vec<u32>,
    /// Names listed in a reconciliation preview before summarising.
    pub preview_limit: usize,
}
impl Default for Selection {
    fn default() -> Self {
        Self {
            page_size: 10,
            label_width: 30,
            count_options: vec![1, 3, 5, 10],
            preview_limit: 10,
        }
    }
}

impl Config {
    /// Resolve the configuration.
    ///
    /// An explicit `path` must exist. Without one, the platform default
    /// location is consulted and silently skipped when absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) if !p.exists() => exn::bail!(ErrorKind::NotFound(p.to_path_buf())),
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path().filter(|p| p.exists()),
        };
        match &file {
            Some(p) => tracing::debug!(path = %p.display(), "Loading configuration file"),
            None => tracing::debug!("No configuration file; using defaults and environment"),
        }
        Self::from_figment(Self::figment(file.as_deref()))
    }

    /// Platform configuration file location (`~/.config/shelfcast/config.toml`
    /// on Linux).
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "shelfcast").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Env::raw().only(&[TOKEN_VARIABLE]).map(|_| "bot.token".into()))
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().map_err(|e| ErrorKind::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.selection.page_size == 0 {
            exn::bail!(ErrorKind::OutOfRange("selection.page_size"));
        }
        if self.selection.count_options.is_empty() || self.selection.count_options.contains(&0) {
            exn::bail!(ErrorKind::OutOfRange("selection.count_options"));
        }
        // Room for at least one character next to the truncation marker.
        if self.delivery.caption_limit <= 3 {
            exn::bail!(ErrorKind::OutOfRange("delivery.caption_limit"));
        }
        if self.delivery.upload_attempts == 0 {
            exn::bail!(ErrorKind::OutOfRange("delivery.upload_attempts"));
        }
        Ok(())
    }

    /// Copy safe to print: the bot token is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.bot.token.is_some() {
            copy.bot.token = Some("********".to_string());
        }
        copy
    }
}
