//! Channel reconciliation.
//!
//! Compares the artifacts of one local category with the remote title index
//! and offers to backfill whatever the channel is missing. Names on both
//! sides go through [`normalize`] before they are compared; the local names
//! are kept alongside their keys so the operator sees real titles.
//!
//! Only local-minus-remote is computed. Titles the channel has that the
//! library no longer does are not reported.

use crate::choice::Choice;
use crate::destination::parse_destination;
use crate::error::{ErrorKind, Result};
use crate::flow::{self, DESTINATION_PROMPT, Input, Reply};
use crate::normalize::normalize;
use exn::ResultExt;
use shelfcast_delivery::{BatchSummary, DeliveryOutcome, Route};
use shelfcast_inventory::{Artifact, DocumentRef, RemoteIndex};
use shelfcast_transport::{Button, ChatId, Keyboard};
use std::collections::HashSet;
use tokio::time::sleep;
use tracing::instrument;

/// A local artifact with no counterpart in the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapItem {
    /// Artifact name without its extension.
    pub name: String,
    pub file_name: String,
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gap {
    pub category: String,
    /// In local listing order.
    pub items: Vec<GapItem>,
}

impl Gap {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// The first `limit` names, one per line, and a total when there are more.
    pub fn preview(&self, limit: usize) -> String {
        let mut text = self.items.iter().take(limit).map(|i| i.name.as_str()).collect::<Vec<_>>().join("\n");
        if self.items.len() > limit {
            text.push_str(&format!("\n...{} missing in total", self.items.len()));
        }
        text
    }
}

/// Local artifacts of `category` whose normalized name matches no remote
/// filename in the same category.
pub fn diff(artifacts: &[Artifact], remote: &RemoteIndex, category: &str) -> Gap {
    let remote_keys: HashSet<String> = remote
        .entries_for(category)
        .filter(|entry| !entry.filename.is_empty())
        .map(|entry| normalize(&entry.filename))
        .collect();
    let items = artifacts
        .iter()
        .filter_map(|artifact| {
            let key = normalize(&artifact.stem);
            (!remote_keys.contains(&key)).then(|| GapItem {
                name: artifact.stem.clone(),
                file_name: artifact.file_name.clone(),
                key,
            })
        })
        .collect();
    Gap {
        category: category.to_string(),
        items,
    }
}

/// The document to deliver for `item`: its sidecar when there is one,
/// otherwise the bare name, which still locates the artifact.
pub fn resolve(item: &GapItem, category: &str, documents: &[String], sidecar_extension: &str) -> DocumentRef {
    let sidecar = format!("{}.{sidecar_extension}", item.name);
    if documents.contains(&sidecar) {
        DocumentRef::new(category, sidecar)
    } else {
        DocumentRef::bare(category, item.name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    AwaitingDestination,
    AwaitingCategory { destination: ChatId, categories: Vec<String> },
    AwaitingConfirm { destination: ChatId, gap: Gap },
}

impl Session {
    pub async fn begin(reply: &Reply<'_>) -> Self {
        reply.show(DESTINATION_PROMPT, None).await;
        Self::AwaitingDestination
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AwaitingDestination => "awaiting_destination",
            Self::AwaitingCategory { .. } => "awaiting_category",
            Self::AwaitingConfirm { .. } => "awaiting_confirm",
        }
    }

    #[instrument(skip_all, fields(state = self.name()))]
    pub async fn step(self, input: Input, reply: &Reply<'_>) -> Result<Option<Self>> {
        let services = reply.services;
        match (self, input) {
            (Self::AwaitingDestination, Input::Text(text)) => {
                let Some(destination) = parse_destination(&text) else {
                    reply.say(&format!("That isn't a channel id or username.\n{DESTINATION_PROMPT}")).await;
                    return Ok(Some(Self::AwaitingDestination));
                };
                let categories = services.inventory().categories().await.or_raise(|| ErrorKind::Inventory)?;
                if categories.is_empty() {
                    reply.say("No categories found in the local library.").await;
                    return Ok(None);
                }
                let keyboard = flow::category_keyboard(&categories, Choice::CheckCategory);
                reply.show("Choose a category to check:", Some(&keyboard)).await;
                Ok(Some(Self::AwaitingCategory { destination, categories }))
            },
            (Self::AwaitingCategory { destination, categories }, Input::Choice(Choice::CheckCategory(i)))
                if i < categories.len() =>
            {
                let category = &categories[i];
                let artifacts = services.inventory().artifacts(category).await.or_raise(|| ErrorKind::Inventory)?;
                let remote = RemoteIndex::load(&services.remote_index).await.or_raise(|| ErrorKind::RemoteIndex)?;
                let gap = diff(&artifacts, &remote, category);
                tracing::info!(%category, local = artifacts.len(), remote = remote.len(), missing = gap.len(), "Compared with channel");
                if gap.is_empty() {
                    reply.say(&format!("{category} is in sync with the channel, nothing to backfill.")).await;
                    return Ok(None);
                }
                let text = format!(
                    "{category} is missing {} books:\n{}\nBackfill them?",
                    gap.len(),
                    gap.preview(services.selection.preview_limit)
                );
                let keyboard = Keyboard::default().row([
                    Button::new("Backfill", Choice::CheckConfirm(true)),
                    Button::new("Don't backfill", Choice::CheckConfirm(false)),
                ]);
                reply.show(&text, Some(&keyboard)).await;
                Ok(Some(Self::AwaitingConfirm { destination, gap }))
            },
            (Self::AwaitingConfirm { .. }, Input::Choice(Choice::CheckConfirm(false))) => {
                reply.show("Cancelled.", None).await;
                Ok(None)
            },
            (Self::AwaitingConfirm { destination, gap }, Input::Choice(Choice::CheckConfirm(true))) => {
                reply.show(&format!("Backfilling {} books in {}...", gap.len(), gap.category), None).await;
                let summary = backfill(&gap, destination, reply).await?;
                let verb = if summary.stopped { "stopped" } else { "finished" };
                reply.say(&format!("Backfill of {} {verb}.\n{summary}", gap.category)).await;
                Ok(None)
            },
            (state, input) => {
                tracing::debug!(?input, "Input not expected here");
                let hint = match &state {
                    Self::AwaitingDestination => "Please send a channel id or username, or /cancel.",
                    Self::AwaitingCategory { .. } => "Please pick a category from the buttons above, or /cancel.",
                    Self::AwaitingConfirm { .. } => "Please answer with the buttons above, or /cancel.",
                };
                reply.say(hint).await;
                Ok(Some(state))
            },
        }
    }
}

/// Deliver every gap item to `destination`, reporting each one.
async fn backfill(gap: &Gap, destination: ChatId, reply: &Reply<'_>) -> Result<BatchSummary> {
    let services = reply.services;
    let deliverer = &services.deliverer;
    let documents = services.inventory().documents(&gap.category).await.or_raise(|| ErrorKind::Inventory)?;
    let extension = services.inventory().sidecar_extension();
    let pacing = deliverer.settings().reconcile_pacing();
    let route = Route {
        destination,
        operator: reply.chat.clone(),
    };

    deliverer.control().retry.reset();
    let mut summary = BatchSummary::default();
    for (i, item) in gap.items.iter().enumerate() {
        if deliverer.control().stop.is_set() {
            summary.stopped = true;
            break;
        }
        if i > 0 {
            sleep(pacing).await;
        }
        let doc = resolve(item, &gap.category, &documents, extension);
        let outcome = deliverer.deliver(&doc, &route).await;
        match &outcome {
            DeliveryOutcome::Sent { .. } => reply.say(&format!("Backfilled: {}", item.name)).await,
            DeliveryOutcome::Skipped { .. } | DeliveryOutcome::Failed { .. } => {
                reply.say(&format!("Couldn't backfill {}", item.name)).await;
            },
            DeliveryOutcome::Aborted => {},
        }
        if !summary.record(&outcome) {
            break;
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use shelfcast_inventory::{MockInventory, RemoteTitleEntry};
    use std::time::Duration;
    use tokio::time::Instant;

    fn artifact(category: &str, stem: &str) -> Artifact {
        Artifact {
            category: category.to_string(),
            stem: stem.to_string(),
            file_name: format!("{stem}.epub"),
            size: 1,
        }
    }

    fn entry(title: &str, filename: &str, category: &str) -> RemoteTitleEntry {
        RemoteTitleEntry {
            title: title.to_string(),
            filename: filename.to_string(),
            category: category.to_string(),
        }
    }

    fn keys(gap: &Gap) -> Vec<&str> {
        gap.items.iter().map(|i| i.key.as_str()).collect()
    }

    #[test]
    fn local_minus_remote() {
        let local = [artifact("fiction", "A"), artifact("fiction", "B")];
        let remote = RemoteIndex::new([entry("Alpha", "a", "fiction")]);

        let gap = diff(&local, &remote, "fiction");

        assert_eq!(
            gap.items,
            [GapItem {
                name: "B".into(),
                file_name: "B.epub".into(),
                key: "b".into(),
            }]
        );
    }

    #[test]
    fn order_does_not_matter() {
        let local = [artifact("f", "One"), artifact("f", "Two"), artifact("f", "Three")];
        let remote = [entry("", "two", "f"), entry("", "x", "f")];
        let forward = diff(&local, &RemoteIndex::new(remote.clone()), "f");

        let mut reversed_local = local.to_vec();
        reversed_local.reverse();
        let mut reversed_remote = remote.to_vec();
        reversed_remote.reverse();
        let backward = diff(&reversed_local, &RemoteIndex::new(reversed_remote), "f");

        let mut a = keys(&forward);
        let mut b = keys(&backward);
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
        assert_eq!(a, ["one", "three"]);
    }

    #[test]
    fn separators_in_category_are_interchangeable() {
        let local = [artifact("sci-fi", "Dune")];
        let remote = RemoteIndex::new([entry("Dune", "DUNE", "sci_fi")]);
        assert!(diff(&local, &remote, "sci-fi").is_empty());
    }

    #[test]
    fn other_categories_are_ignored() {
        let local = [artifact("fiction", "Dune")];
        let remote = RemoteIndex::new([entry("Dune", "Dune", "history")]);
        assert_eq!(keys(&diff(&local, &remote, "fiction")), ["dune"]);
    }

    #[test]
    fn matching_remote_entry_closes_gap() {
        let local = [artifact("fiction", "The Left Hand"), artifact("fiction", "Emma")];
        let mut remote = vec![entry("Emma", "emma", "fiction")];
        assert_eq!(keys(&diff(&local, &RemoteIndex::new(remote.clone()), "fiction")), ["thelefthand"]);

        remote.push(entry("Left Hand", "the_left-hand", "fiction"));
        assert!(diff(&local, &RemoteIndex::new(remote), "fiction").is_empty());
    }

    #[test]
    fn preview_is_bounded() {
        let gap = Gap {
            category: "f".into(),
            items: (0..12)
                .map(|i| GapItem {
                    name: format!("B{i}"),
                    file_name: format!("B{i}.epub"),
                    key: format!("b{i}"),
                })
                .collect(),
        };
        let preview = gap.preview(10);
        assert_eq!(preview.lines().count(), 11);
        assert!(preview.starts_with("B0\nB1\n"));
        assert!(preview.ends_with("\n...12 missing in total"));
        assert_eq!(gap.preview(20).lines().count(), 12);
    }

    #[test]
    fn prefers_sidecar_reference() {
        let item = &diff(&[artifact("f", "Dune")], &RemoteIndex::default(), "f").items[0];
        let with = resolve(item, "f", &["Dune.txt".into()], "txt");
        assert_eq!(with.filename, "Dune.txt");
        let without = resolve(item, "f", &["Emma.txt".into()], "txt");
        assert_eq!(without.filename, "Dune");
        assert!(!without.sidecar);
    }

    #[tokio::test(start_paused = true)]
    async fn backfills_artifact_named_like_a_sidecar() {
        let inventory = MockInventory::default()
            .with_sidecars([("fiction", "Alpha.txt", "Title: Alpha")])
            .with_artifacts([("fiction", "notes.txt.epub", b"n".as_slice())]);
        let h = Harness::new(inventory);
        let session = confirming(&h, "[]").await;
        assert_eq!(h.last_text().await, "fiction is missing 1 books:\nnotes.txt\nBackfill them?");

        session
            .step(Input::Choice(Choice::CheckConfirm(true)), &h.reply(None))
            .await
            .unwrap();

        assert_eq!(h.sent_files().await, ["notes.txt.epub"]);
        assert!(h.messenger.texts().await.contains(&"Backfilled: notes.txt".to_string()));
    }

    fn library() -> MockInventory {
        MockInventory::default()
            .with_sidecars([("fiction", "Alpha.txt", "Title: Alpha"), ("fiction", "Gamma.txt", "Title: Gamma")])
            .with_artifacts([
                ("fiction", "Alpha.epub", b"a".as_slice()),
                ("fiction", "Beta.epub", b"b".as_slice()),
                ("fiction", "Gamma.epub", b"c".as_slice()),
            ])
    }

    async fn confirming(h: &Harness, remote: &str) -> Session {
        std::fs::write(&h.services.remote_index, remote).unwrap();
        let session = Session::begin(&h.reply(None)).await;
        let session = session.step(Input::Text("@backup".into()), &h.reply(None)).await.unwrap().unwrap();
        session
            .step(Input::Choice(Choice::CheckCategory(0)), &h.reply(None))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn backfills_to_chosen_channel() {
        let h = Harness::new(library());
        let session = confirming(&h, r##"[{"title": "Gamma", "filename": "gamma", "category": "#fiction"}]"##).await;
        assert!(matches!(&session, Session::AwaitingConfirm { gap, .. } if gap.len() == 2));
        assert_eq!(h.last_text().await, "fiction is missing 2 books:\nAlpha\nBeta\nBackfill them?");
        let started = Instant::now();

        let done = session
            .step(Input::Choice(Choice::CheckConfirm(true)), &h.reply(None))
            .await
            .unwrap();

        assert!(done.is_none());
        let sent = h.messenger.documents().await;
        assert_eq!(
            sent,
            [
                (ChatId::new("@backup"), "Alpha.epub".to_string()),
                (ChatId::new("@backup"), "Beta.epub".to_string())
            ]
        );
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
        let texts = h.messenger.texts().await;
        assert!(texts.contains(&"Backfilled: Alpha".to_string()));
        assert!(texts.contains(&"Backfilled: Beta".to_string()));
        assert_eq!(texts.last().unwrap(), "Backfill of fiction finished.\n2 sent, 0 skipped, 0 failed");
        assert!(h.services.deliverer.ledger().contains("Beta").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn in_sync_ends_without_prompt() {
        let h = Harness::new(library());
        std::fs::write(
            &h.services.remote_index,
            r#"[{"title": "a", "filename": "ALPHA", "category": "fiction"},
                {"title": "b", "filename": "beta", "category": "fiction"},
                {"title": "c", "filename": "Gamma!", "category": "fiction"}]"#,
        )
        .unwrap();
        let session = Session::begin(&h.reply(None)).await;
        let session = session.step(Input::Text("@backup".into()), &h.reply(None)).await.unwrap().unwrap();

        let done = session.step(Input::Choice(Choice::CheckCategory(0)), &h.reply(None)).await.unwrap();

        assert!(done.is_none());
        assert_eq!(h.last_text().await, "fiction is in sync with the channel, nothing to backfill.");
    }

    #[tokio::test(start_paused = true)]
    async fn untitled_remote_entries_still_count() {
        let h = Harness::new(library());
        let session = confirming(
            &h,
            r#"[{"filename": "Alpha", "category": "fiction"}, {"filename": "Beta", "category": "fiction"}]"#,
        )
        .await;

        assert!(matches!(&session, Session::AwaitingConfirm { gap, .. } if gap.len() == 1));
        assert_eq!(h.last_text().await, "fiction is missing 1 books:\nGamma\nBackfill them?");
    }

    #[tokio::test(start_paused = true)]
    async fn declining_sends_nothing() {
        let h = Harness::new(library());
        let session = confirming(&h, "[]").await;

        let done = session
            .step(Input::Choice(Choice::CheckConfirm(false)), &h.reply(None))
            .await
            .unwrap();

        assert!(done.is_none());
        assert!(h.messenger.documents().await.is_empty());
        assert_eq!(h.last_text().await, "Cancelled.");
    }

    #[tokio::test(start_paused = true)]
    async fn corrupt_remote_index_ends_conversation_with_error() {
        let h = Harness::new(library());
        std::fs::write(&h.services.remote_index, "{not json").unwrap();
        let session = Session::begin(&h.reply(None)).await;
        let session = session.step(Input::Text("@backup".into()), &h.reply(None)).await.unwrap().unwrap();

        let err = session
            .step(Input::Choice(Choice::CheckCategory(0)), &h.reply(None))
            .await
            .unwrap_err();

        assert!(matches!(&*err, ErrorKind::RemoteIndex));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_backfill_between_items() {
        let h = Harness::new(library());
        let session = confirming(&h, "[]").await;
        h.services.deliverer.control().stop.request(shelfcast_transport::UserId(1));

        let done = session
            .step(Input::Choice(Choice::CheckConfirm(true)), &h.reply(None))
            .await
            .unwrap();

        assert!(done.is_none());
        assert!(h.messenger.documents().await.is_empty());
        // Once stopped, nothing more goes out at all.
        assert!(h.last_text().await.starts_with("fiction is missing 3 books"));
    }
}
