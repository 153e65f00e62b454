//! Document delivery pipeline.
//!
//! [`Deliverer::deliver`] takes one document from sidecar to channel. Nothing
//! that goes wrong with a single document escapes it: every failure becomes
//! a [`DeliveryOutcome`] and a message to the operator, so a batch always
//! moves on to the next item.

use crate::caption::CaptionBuilder;
use crate::control::BatchControl;
use crate::error::{ErrorKind, Result};
use crate::ledger::Ledger;
use crate::notify::Notifier;
use derive_more::Display;
use exn::ResultExt;
use shelfcast_config::Delivery;
use shelfcast_inventory::{Artifact, DocumentRef, InventoryHandle};
use shelfcast_transport::{ChatId, Document, MessageId};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::instrument;

/// Where a batch goes, and who hears about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub destination: ChatId,
    pub operator: ChatId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Delivered and recorded under `title` (the artifact stem).
    Sent { title: String },
    Skipped { reason: String },
    Failed { reason: String },
    /// The stop flag was raised before the document went out.
    Aborted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[display("{sent} sent, {skipped} skipped, {failed} failed")]
pub struct BatchSummary {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
    pub stopped: bool,
}

impl BatchSummary {
    /// Tally `outcome`. Returns `false` once the batch should end.
    pub fn record(&mut self, outcome: &DeliveryOutcome) -> bool {
        match outcome {
            DeliveryOutcome::Sent { .. } => self.sent += 1,
            DeliveryOutcome::Skipped { .. } => self.skipped += 1,
            DeliveryOutcome::Failed { .. } => self.failed += 1,
            DeliveryOutcome::Aborted => {
                self.stopped = true;
                return false;
            },
        }
        true
    }
}

pub struct Deliverer {
    inventory: InventoryHandle,
    notifier: Notifier,
    ledger: Arc<Ledger>,
    captions: CaptionBuilder,
    settings: Delivery,
}

impl Deliverer {
    pub fn new(inventory: InventoryHandle, notifier: Notifier, ledger: Arc<Ledger>, settings: &Delivery) -> Self {
        Self {
            inventory,
            notifier,
            ledger,
            captions: CaptionBuilder::from(settings),
            settings: settings.clone(),
        }
    }

    pub fn control(&self) -> &Arc<BatchControl> {
        self.notifier.executor().control()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn inventory(&self) -> &InventoryHandle {
        &self.inventory
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn settings(&self) -> &Delivery {
        &self.settings
    }

    /// Deliver one document to `route.destination`.
    #[instrument(skip(self, route), fields(document = %doc, destination = %route.destination))]
    pub async fn deliver(&self, doc: &DocumentRef, route: &Route) -> DeliveryOutcome {
        if self.control().stop.is_set() {
            return DeliveryOutcome::Aborted;
        }
        match self.try_deliver(doc, route).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = ?e, "Delivery failed");
                let reason = e.to_string();
                self.notifier
                    .say(&route.operator, &format!("Failed to deliver {}: {reason}", doc.filename))
                    .await;
                DeliveryOutcome::Failed { reason }
            },
        }
    }

    /// Deliver `docs` in order, `pacing` apart, until done or stopped.
    ///
    /// Resets the shared retry state first: a batch never inherits another
    /// batch's slowdown.
    #[instrument(skip_all, fields(destination = %route.destination, items = docs.len()))]
    pub async fn deliver_all(&self, docs: &[DocumentRef], route: &Route, pacing: Duration) -> BatchSummary {
        self.control().retry.reset();
        let mut summary = BatchSummary::default();
        for (i, doc) in docs.iter().enumerate() {
            if self.control().stop.is_set() {
                summary.stopped = true;
                break;
            }
            if i > 0 && !pacing.is_zero() {
                sleep(pacing).await;
            }
            let outcome = self.deliver(doc, route).await;
            if !summary.record(&outcome) {
                break;
            }
        }
        tracing::info!(
            sent = summary.sent,
            skipped = summary.skipped,
            failed = summary.failed,
            stopped = summary.stopped,
            "Batch finished"
        );
        summary
    }

    async fn try_deliver(&self, doc: &DocumentRef, route: &Route) -> Result<DeliveryOutcome> {
        let control = self.control();
        if control.retry.take_just_retried() {
            let settle = self.settings.rate_limit_settle();
            self.notifier
                .say(
                    &route.operator,
                    &format!("Recovering from a rate limit, waiting {}s before continuing.", settle.as_secs()),
                )
                .await;
            sleep(settle).await;
        }

        let info = self.inventory.book_info(doc).await;
        let stem = doc.stem(self.inventory.sidecar_extension());
        let located = self.inventory.locate_artifact(&doc.category, stem).await.or_raise(|| ErrorKind::Inventory)?;
        let artifact = match located {
            None => return Ok(self.skip(route, format!("no file found for {stem}")).await),
            Some(artifact) if artifact.is_empty() => {
                return Ok(self.skip(route, format!("{} is empty", artifact.file_name)).await);
            },
            Some(artifact) => artifact,
        };
        let caption = self.captions.build(&info, &doc.category);

        if let Some(retries) = control.retry.take_after_retry() {
            let pause = self.settings.post_retry_delay();
            self.notifier
                .say(
                    &route.operator,
                    &format!("Recovered after {retries} retries, pausing {}s.", pause.as_secs()),
                )
                .await;
            sleep(pause).await;
        }

        let attempts = self.settings.upload_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.upload(&artifact, &caption, route).await {
                Ok(Some(_)) => break,
                Ok(None) => return Ok(DeliveryOutcome::Aborted),
                Err(e) if attempt < attempts && matches!(&*e, ErrorKind::Unclassified { .. } | ErrorKind::Inventory) => {
                    tracing::warn!(attempt, attempts, error = %e, "Upload failed; reloading and trying again");
                    sleep(self.settings.upload_retry_delay()).await;
                },
                Err(e) => return Err(e),
            }
        }

        if let Err(e) = self.ledger.record(&artifact.stem).await {
            tracing::error!(error = ?e, title = %artifact.stem, "Delivered but not recorded as sent");
        }
        tracing::info!(title = %artifact.stem, found_in = %artifact.category, "Delivered");
        self.notifier.say(&route.operator, &format!("Sent: {}", info.title)).await;
        Ok(DeliveryOutcome::Sent { title: artifact.stem })
    }

    async fn upload(&self, artifact: &Artifact, caption: &str, route: &Route) -> Result<Option<MessageId>> {
        let bytes = self.inventory.read_artifact(artifact).await.or_raise(|| ErrorKind::Inventory)?;
        let document = Document {
            file_name: artifact.file_name.clone(),
            bytes,
            caption: caption.to_string(),
        };
        let messenger = self.notifier.messenger();
        let (destination, document) = (&route.destination, &document);
        self.notifier
            .executor()
            .run("send_document", Some(&route.operator), move || messenger.send_document(destination, document))
            .await
    }

    async fn skip(&self, route: &Route, reason: String) -> DeliveryOutcome {
        tracing::warn!(%reason, "Skipping document");
        self.notifier.say(&route.operator, &format!("Skipped: {reason}")).await;
        DeliveryOutcome::Skipped { reason }
    }
}
