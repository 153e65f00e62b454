//! Book selection conversations.
//!
//! Two flows share this state machine. A counted upload picks a category,
//! then either "all" or a number of books, then the books themselves one
//! screen at a time. An anchor upload picks a category, searches for a book
//! by keyword and uploads everything after it.
//!
//! [`Session::step`] is the whole transition table. Input a state doesn't
//! expect gets a hint and leaves the state as it was.

use crate::choice::{Choice, Quantity};
use crate::destination::parse_destination;
use crate::error::{ErrorKind, Result};
use crate::flow::{self, DESTINATION_PROMPT, Input, Reply, Services};
use crate::shortid::ShortIdIndex;
use exn::ResultExt;
use shelfcast_delivery::{BatchSummary, DeliveryOutcome, Route};
use shelfcast_inventory::{DocumentRef, strip_extension};
use shelfcast_transport::{Button, ChatId, Keyboard};
use std::time::Duration;
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Count,
    Anchor,
}

/// Book-by-book picking within one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picking {
    pub destination: ChatId,
    pub categories: Vec<String>,
    pub category: String,
    /// Successful uploads still wanted.
    pub remaining: u32,
    /// Every filename picked so far, delivered or not.
    pub picked: Vec<String>,
    pub index: ShortIdIndex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    AwaitingDestination {
        mode: Mode,
    },
    AwaitingCategory {
        mode: Mode,
        destination: ChatId,
        categories: Vec<String>,
    },
    AwaitingCount {
        destination: ChatId,
        categories: Vec<String>,
        category: String,
    },
    AwaitingBookPick(Picking),
    AwaitingSearchKeyword {
        destination: ChatId,
        category: String,
    },
    AwaitingStartBookPick {
        destination: ChatId,
        category: String,
        /// The category's documents in upload order, as they were listed
        /// when the search ran.
        documents: Vec<String>,
    },
}

impl Session {
    pub async fn begin(mode: Mode, reply: &Reply<'_>) -> Self {
        let session = Self::AwaitingDestination { mode };
        session.render(reply).await;
        session
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AwaitingDestination { .. } => "awaiting_destination",
            Self::AwaitingCategory { .. } => "awaiting_category",
            Self::AwaitingCount { .. } => "awaiting_count",
            Self::AwaitingBookPick(_) => "awaiting_book_pick",
            Self::AwaitingSearchKeyword { .. } => "awaiting_search_keyword",
            Self::AwaitingStartBookPick { .. } => "awaiting_start_book_pick",
        }
    }

    /// Apply one operator input. `None` means the conversation is over.
    #[instrument(skip_all, fields(state = self.name()))]
    pub async fn step(self, input: Input, reply: &Reply<'_>) -> Result<Option<Self>> {
        use Session::*;
        let services = reply.services;
        match (self, input) {
            (AwaitingDestination { mode }, Input::Text(text)) => {
                let Some(destination) = parse_destination(&text) else {
                    reply.say(&format!("That isn't a channel id or username.\n{DESTINATION_PROMPT}")).await;
                    return Ok(Some(AwaitingDestination { mode }));
                };
                let categories = services.inventory().categories().await.or_raise(|| ErrorKind::Inventory)?;
                if categories.is_empty() {
                    reply.say("No categories found in the local library.").await;
                    return Ok(None);
                }
                AwaitingCategory {
                    mode,
                    destination,
                    categories,
                }
                .enter(reply)
                .await
            },
            (
                AwaitingCategory {
                    mode: Mode::Count,
                    destination,
                    categories,
                },
                Input::Choice(Choice::Category(i)),
            ) if i < categories.len() => {
                let category = categories[i].clone();
                AwaitingCount {
                    destination,
                    categories,
                    category,
                }
                .enter(reply)
                .await
            },
            (
                AwaitingCategory {
                    mode: Mode::Anchor,
                    destination,
                    categories,
                },
                Input::Choice(Choice::AnchorCategory(i)),
            ) if i < categories.len() => {
                let category = categories[i].clone();
                AwaitingSearchKeyword { destination, category }.enter(reply).await
            },
            (AwaitingCount { destination, categories, .. }, Input::Choice(Choice::BackToCategories)) => {
                AwaitingCategory {
                    mode: Mode::Count,
                    destination,
                    categories,
                }
                .enter(reply)
                .await
            },
            (AwaitingCount { destination, category, .. }, Input::Choice(Choice::Count(Quantity::All))) => {
                let documents = documents(services, &category).await?;
                reply
                    .show(&format!("Uploading every book in {category} ({} in total)...", documents.len()), None)
                    .await;
                let summary = services
                    .deliverer
                    .deliver_all(&documents, &route(&destination, reply), Duration::ZERO)
                    .await;
                reply.say(&finished(&category, &summary)).await;
                Ok(None)
            },
            (
                AwaitingCount {
                    destination,
                    categories,
                    category,
                },
                Input::Choice(Choice::Count(Quantity::Exactly(n))),
            ) => {
                let picking = Picking {
                    destination,
                    categories,
                    category,
                    remaining: n,
                    picked: Vec::new(),
                    index: ShortIdIndex::default(),
                };
                picking.offer(reply).await
            },
            (AwaitingBookPick(picking), Input::Choice(Choice::BackToCount)) => {
                AwaitingCount {
                    destination: picking.destination,
                    categories: picking.categories,
                    category: picking.category,
                }
                .enter(reply)
                .await
            },
            (AwaitingBookPick(mut picking), Input::Choice(Choice::Book(id))) => {
                let Some(filename) = picking.index.resolve(&id).map(str::to_string) else {
                    reply.say("Couldn't tell which book that was, please pick again.").await;
                    return Ok(Some(AwaitingBookPick(picking)));
                };
                services.deliverer.control().retry.reset();
                let doc = DocumentRef::new(picking.category.clone(), filename.clone());
                match services.deliverer.deliver(&doc, &route(&picking.destination, reply)).await {
                    DeliveryOutcome::Aborted => {
                        reply.say("Stopped.").await;
                        return Ok(None);
                    },
                    DeliveryOutcome::Sent { .. } => picking.remaining = picking.remaining.saturating_sub(1),
                    DeliveryOutcome::Skipped { .. } | DeliveryOutcome::Failed { .. } => {},
                }
                picking.picked.push(filename);
                if picking.remaining == 0 {
                    reply.say("All selected books have been uploaded.").await;
                    return Ok(None);
                }
                picking.offer(reply).await
            },
            (AwaitingSearchKeyword { destination, category }, Input::Text(text)) => {
                let keyword = text.trim();
                let documents = documents(services, &category).await?;
                let extension = services.inventory().sidecar_extension();
                let width = services.selection.label_width;
                let matches: Vec<Button> = documents
                    .iter()
                    .enumerate()
                    .map(|(i, doc)| (i, strip_extension(&doc.filename, extension)))
                    .filter(|(_, title)| !keyword.is_empty() && title.contains(keyword))
                    .take(services.selection.page_size)
                    .map(|(i, title)| Button::new(flow::label(title, width), Choice::StartBook(i)))
                    .collect();
                if matches.is_empty() {
                    reply
                        .say(&format!("No titles in {category} contain \"{keyword}\". Try another keyword:"))
                        .await;
                    return Ok(Some(AwaitingSearchKeyword { destination, category }));
                }
                reply.show("Pick the book to start after:", Some(&Keyboard::column(matches))).await;
                Ok(Some(AwaitingStartBookPick {
                    destination,
                    category,
                    documents: documents.into_iter().map(|doc| doc.filename).collect(),
                }))
            },
            (
                AwaitingStartBookPick {
                    destination,
                    category,
                    documents,
                },
                Input::Choice(Choice::StartBook(i)),
            ) if i < documents.len() => {
                let anchor = strip_extension(&documents[i], services.inventory().sidecar_extension());
                let after: Vec<DocumentRef> = documents[i + 1..]
                    .iter()
                    .map(|filename| DocumentRef::new(category.clone(), filename.clone()))
                    .collect();
                if after.is_empty() {
                    reply
                        .show(&format!("{anchor} is already the last book, there is nothing after it to upload."), None)
                        .await;
                    return Ok(None);
                }
                reply.show(&format!("Uploading the {} books after {anchor}...", after.len()), None).await;
                let summary = services
                    .deliverer
                    .deliver_all(&after, &route(&destination, reply), Duration::ZERO)
                    .await;
                reply.say(&finished(&category, &summary)).await;
                Ok(None)
            },
            (state, input) => {
                tracing::debug!(?input, "Input not expected here");
                reply.say(state.hint()).await;
                Ok(Some(state))
            },
        }
    }

    async fn enter(self, reply: &Reply<'_>) -> Result<Option<Self>> {
        self.render(reply).await;
        Ok(Some(self))
    }

    async fn render(&self, reply: &Reply<'_>) {
        let selection = &reply.services.selection;
        match self {
            Self::AwaitingDestination { .. } => reply.show(DESTINATION_PROMPT, None).await,
            Self::AwaitingCategory {
                mode,
                destination,
                categories,
            } => {
                let token: fn(usize) -> Choice = match mode {
                    Mode::Count => Choice::Category,
                    Mode::Anchor => Choice::AnchorCategory,
                };
                let keyboard = flow::category_keyboard(categories, token);
                reply
                    .show(&format!("Uploading to {destination}\nChoose a category:"), Some(&keyboard))
                    .await;
            },
            Self::AwaitingCount { category, .. } => {
                let keyboard = flow::count_keyboard(&selection.count_options);
                reply
                    .show(&format!("Category: {category}\nHow many books should be uploaded?"), Some(&keyboard))
                    .await;
            },
            Self::AwaitingBookPick(picking) => {
                let text = format!(
                    "Category: {}\nPick the books to upload ({} to go):",
                    picking.category, picking.remaining
                );
                reply.show(&text, Some(&picking.keyboard(reply.services))).await;
            },
            Self::AwaitingSearchKeyword { category, .. } => {
                reply
                    .show(&format!("Category: {category}\nSend a keyword from the title of the book to start after:"), None)
                    .await;
            },
            Self::AwaitingStartBookPick { .. } => reply.say(self.hint()).await,
        }
    }

    fn hint(&self) -> &'static str {
        match self {
            Self::AwaitingDestination { .. } => "Please send a channel id or username, or /cancel.",
            Self::AwaitingCategory { .. } => "Please pick a category from the buttons above, or /cancel.",
            Self::AwaitingCount { .. } => "Please pick how many books to upload, or /cancel.",
            Self::AwaitingBookPick(_) => "Please pick a book from the list above, or /cancel.",
            Self::AwaitingSearchKeyword { .. } => "Please send a keyword from the book title, or /cancel.",
            Self::AwaitingStartBookPick { .. } => "Please pick the starting book from the list above, or /cancel.",
        }
    }
}

impl Picking {
    /// Show the next screen of unpicked candidates.
    async fn offer(mut self, reply: &Reply<'_>) -> Result<Option<Session>> {
        let documents = documents(reply.services, &self.category).await?;
        let candidates = documents
            .iter()
            .map(|doc| doc.filename.as_str())
            .filter(|filename| !self.picked.iter().any(|p| p == filename));
        self.index.rebuild(candidates, reply.services.selection.page_size);
        if self.index.is_empty() {
            reply.say(&format!("No more books to pick in {}.", self.category)).await;
            return Ok(None);
        }
        Session::AwaitingBookPick(self).enter(reply).await
    }

    fn keyboard(&self, services: &Services) -> Keyboard {
        let extension = services.inventory().sidecar_extension();
        let width = services.selection.label_width;
        Keyboard::column(self.index.slots().iter().map(|(id, filename)| {
            Button::new(flow::label(strip_extension(filename, extension), width), Choice::Book(id.clone()))
        }))
        .row([Button::new("Back to count", Choice::BackToCount)])
    }
}

async fn documents(services: &Services, category: &str) -> Result<Vec<DocumentRef>> {
    let filenames = services.inventory().documents(category).await.or_raise(|| ErrorKind::Inventory)?;
    Ok(filenames.into_iter().map(|filename| DocumentRef::new(category, filename)).collect())
}

fn route(destination: &ChatId, reply: &Reply<'_>) -> Route {
    Route {
        destination: destination.clone(),
        operator: reply.chat.clone(),
    }
}

fn finished(category: &str, summary: &BatchSummary) -> String {
    if summary.stopped {
        format!("Stopped uploading {category}.\n{summary}")
    } else {
        format!("Finished uploading {category}.\n{summary}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shortid::fingerprint;
    use crate::testing::{Harness, library};
    use tokio::time::Instant;

    async fn step(h: &Harness, session: Session, input: Input) -> Option<Session> {
        session.step(input, &h.reply(None)).await.unwrap()
    }

    async fn choose(h: &Harness, session: Session, choice: Choice) -> Option<Session> {
        step(h, session, Input::Choice(choice)).await
    }

    async fn counting_in(h: &Harness, category: usize) -> Session {
        let session = Session::begin(Mode::Count, &h.reply(None)).await;
        let session = step(h, session, Input::Text("https://t.me/shelf".into())).await.unwrap();
        choose(h, session, Choice::Category(category)).await.unwrap()
    }

    async fn searching_fiction(h: &Harness) -> Session {
        let session = Session::begin(Mode::Anchor, &h.reply(None)).await;
        let session = step(h, session, Input::Text("@shelf".into())).await.unwrap();
        choose(h, session, Choice::AnchorCategory(0)).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn destination_then_categories() {
        let h = Harness::new(library());
        let session = Session::begin(Mode::Count, &h.reply(None)).await;
        assert_eq!(h.last_text().await, DESTINATION_PROMPT);

        let session = step(&h, session, Input::Text("https://t.me/shelf".into())).await.unwrap();
        assert_eq!(
            session,
            Session::AwaitingCategory {
                mode: Mode::Count,
                destination: ChatId::new("@shelf"),
                categories: vec!["fiction".into(), "poetry".into()],
            }
        );
        let keyboard = h.messenger.last_keyboard().await.unwrap();
        assert_eq!(keyboard.buttons().map(|b| b.data.as_str()).collect::<Vec<_>>(), ["cat_0", "cat_1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn bad_destination_reprompts() {
        let h = Harness::new(library());
        let session = Session::begin(Mode::Count, &h.reply(None)).await;
        let session = step(&h, session, Input::Text("two words".into())).await.unwrap();
        assert_eq!(session, Session::AwaitingDestination { mode: Mode::Count });
        assert!(h.last_text().await.ends_with(DESTINATION_PROMPT));
    }

    #[tokio::test(start_paused = true)]
    async fn all_of_empty_category() {
        let h = Harness::new(library());
        let session = counting_in(&h, 1).await;

        let done = choose(&h, session, Choice::Count(Quantity::All)).await;

        assert!(done.is_none());
        assert!(h.sent_files().await.is_empty());
        assert_eq!(h.last_text().await, "Finished uploading poetry.\n0 sent, 0 skipped, 0 failed");
    }

    #[tokio::test(start_paused = true)]
    async fn all_of_category() {
        let h = Harness::new(library());
        let session = counting_in(&h, 0).await;

        let done = choose(&h, session, Choice::Count(Quantity::All)).await;

        assert!(done.is_none());
        assert_eq!(h.sent_files().await, ["Alpha.epub", "Beta.epub", "Gamma.epub"]);
        assert_eq!(h.last_text().await, "Finished uploading fiction.\n3 sent, 1 skipped, 0 failed");
    }

    #[tokio::test(start_paused = true)]
    async fn back_navigation_keeps_earlier_choices() {
        let h = Harness::new(library());
        let session = counting_in(&h, 0).await;

        let session = choose(&h, session, Choice::BackToCategories).await.unwrap();
        assert!(matches!(&session, Session::AwaitingCategory { destination, .. } if destination.as_str() == "@shelf"));

        let session = choose(&h, session, Choice::Category(0)).await.unwrap();
        let session = choose(&h, session, Choice::Count(Quantity::Exactly(2))).await.unwrap();
        assert!(matches!(&session, Session::AwaitingBookPick(p) if p.index.len() == 4));

        let session = choose(&h, session, Choice::BackToCount).await.unwrap();
        assert!(matches!(&session, Session::AwaitingCount { category, .. } if category == "fiction"));
    }

    #[tokio::test(start_paused = true)]
    async fn only_successful_picks_count() {
        let h = Harness::new(library());
        let session = counting_in(&h, 0).await;
        let session = choose(&h, session, Choice::Count(Quantity::Exactly(2))).await.unwrap();

        let session = choose(&h, session, Choice::Book(fingerprint("Alpha.txt"))).await.unwrap();
        let Session::AwaitingBookPick(picking) = &session else {
            panic!("expected another pick, got {session:?}");
        };
        assert_eq!(picking.remaining, 1);
        assert_eq!(picking.index.resolve(&fingerprint("Alpha.txt")), None);
        let labels: Vec<String> = h.messenger.last_keyboard().await.unwrap().buttons().map(|b| b.label.clone()).collect();
        assert_eq!(labels, ["Beta", "Gamma", "Lost", "Back to count"]);

        // No artifact: skipped, so it doesn't use up the count.
        let session = choose(&h, session, Choice::Book(fingerprint("Lost.txt"))).await.unwrap();
        assert!(matches!(&session, Session::AwaitingBookPick(p) if p.remaining == 1 && p.picked.len() == 2));

        let done = choose(&h, session, Choice::Book(fingerprint("Beta.txt"))).await;
        assert!(done.is_none());
        assert_eq!(h.sent_files().await, ["Alpha.epub", "Beta.epub"]);
        assert_eq!(h.last_text().await, "All selected books have been uploaded.");
    }

    #[tokio::test(start_paused = true)]
    async fn picking_ends_when_candidates_run_out() {
        let h = Harness::new(library());
        let session = counting_in(&h, 0).await;
        let mut session = choose(&h, session, Choice::Count(Quantity::Exactly(10))).await;
        for filename in ["Alpha.txt", "Beta.txt", "Gamma.txt", "Lost.txt"] {
            session = choose(&h, session.unwrap(), Choice::Book(fingerprint(filename))).await;
        }
        assert!(session.is_none());
        assert_eq!(h.last_text().await, "No more books to pick in fiction.");
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_book_reprompts() {
        let h = Harness::new(library());
        let session = counting_in(&h, 0).await;
        let session = choose(&h, session, Choice::Count(Quantity::Exactly(1))).await.unwrap();

        let again = choose(&h, session.clone(), Choice::Book("deadbeef".into())).await.unwrap();

        assert_eq!(again, session);
        assert!(h.sent_files().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn each_pick_starts_with_fresh_retry_state() {
        let h = Harness::new(library());
        let session = counting_in(&h, 0).await;
        let session = choose(&h, session, Choice::Count(Quantity::Exactly(1))).await.unwrap();
        h.services.deliverer.control().retry.mark_recovered(3);
        let started = Instant::now();

        choose(&h, session, Choice::Book(fingerprint("Alpha.txt"))).await;

        // No post-retry pause carried over from before the pick.
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_input_keeps_state() {
        let h = Harness::new(library());
        let session = counting_in(&h, 0).await;
        let inputs = [
            Input::Text("3".into()),
            Input::Invalid("bogus".into()),
            Input::Choice(Choice::StartBook(0)),
        ];
        for input in inputs {
            let again = step(&h, session.clone(), input).await.unwrap();
            assert_eq!(again, session);
            assert_eq!(h.last_text().await, "Please pick how many books to upload, or /cancel.");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn anchor_uploads_what_follows() {
        let h = Harness::new(library());
        let session = searching_fiction(&h).await;
        assert!(matches!(&session, Session::AwaitingSearchKeyword { category, .. } if category == "fiction"));

        let session = step(&h, session, Input::Text(" Alp ".into())).await.unwrap();
        let keyboard = h.messenger.last_keyboard().await.unwrap();
        assert_eq!(keyboard.buttons().map(|b| b.data.as_str()).collect::<Vec<_>>(), ["startbook_0"]);

        let done = choose(&h, session, Choice::StartBook(0)).await;

        assert!(done.is_none());
        assert_eq!(h.sent_files().await, ["Beta.epub", "Gamma.epub"]);
        assert_eq!(h.last_text().await, "Finished uploading fiction.\n2 sent, 1 skipped, 0 failed");
    }

    #[tokio::test(start_paused = true)]
    async fn anchor_on_last_book() {
        let h = Harness::new(library());
        let session = searching_fiction(&h).await;
        let session = step(&h, session, Input::Text("Lost".into())).await.unwrap();

        let done = choose(&h, session, Choice::StartBook(3)).await;

        assert!(done.is_none());
        assert!(h.sent_files().await.is_empty());
        assert_eq!(h.last_text().await, "Lost is already the last book, there is nothing after it to upload.");
    }

    #[tokio::test(start_paused = true)]
    async fn keyword_without_matches_reprompts() {
        let h = Harness::new(library());
        let session = searching_fiction(&h).await;

        let again = step(&h, session.clone(), Input::Text("Zeta".into())).await.unwrap();

        assert_eq!(again, session);
        assert_eq!(h.last_text().await, "No titles in fiction contain \"Zeta\". Try another keyword:");
    }

    #[tokio::test(start_paused = true)]
    async fn counted_tokens_ignored_in_anchor_mode() {
        let h = Harness::new(library());
        let session = Session::begin(Mode::Anchor, &h.reply(None)).await;
        let session = step(&h, session, Input::Text("@shelf".into())).await.unwrap();

        let again = choose(&h, session.clone(), Choice::Category(0)).await.unwrap();

        assert_eq!(again, session);
    }
}
