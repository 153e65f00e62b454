//! Event dispatch.
//!
//! Each chat has at most one conversation, kept behind its own async mutex
//! so a chat's events are handled one at a time while other chats proceed.
//! `/stop` never waits for that mutex: it has to reach the stop flag while
//! a batch is still holding the conversation.

use crate::choice::Choice;
use crate::flow::{self, Input, Reply, Services};
use crate::{reconcile, selection};
use shelfcast_delivery::StopRequest;
use shelfcast_transport::{ChatId, Event, EventKind};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::instrument;

const GREETING: &str = "Hi! I upload books from the local library to your channels.";
const MENU_PROMPT: &str = "Choose an action:";

#[derive(Debug)]
pub enum Conversation {
    Upload(selection::Session),
    Reconcile(reconcile::Session),
}

type Slot = Arc<Mutex<Option<Conversation>>>;

pub struct Dispatcher {
    services: Arc<Services>,
    conversations: Mutex<HashMap<ChatId, Slot>>,
}

impl Dispatcher {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            services,
            conversations: Mutex::default(),
        }
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn is_stopped(&self) -> bool {
        self.services.deliverer.control().stop.is_set()
    }

    #[instrument(skip_all, fields(chat = %event.chat, user = %event.user))]
    pub async fn handle(&self, event: Event) {
        if is_stop(&event) {
            return self.stop(&event).await;
        }

        let chat = event.chat.clone();
        let slot = self.slot(&chat).await;
        let idle = {
            let mut conversation = slot.lock().await;
            self.advance(event, &mut *conversation).await;
            conversation.is_none()
        };
        if idle {
            self.release(&chat, &slot).await;
        }
    }

    async fn advance(&self, event: Event, conversation: &mut Option<Conversation>) {
        let (input, origin) = match event.kind {
            EventKind::Command(name) => {
                let reply = Reply {
                    services: &self.services,
                    chat: &event.chat,
                    origin: None,
                };
                *conversation = command(&name, conversation.take(), &reply).await;
                return;
            },
            EventKind::Text(text) => (Input::Text(text), None),
            EventKind::Choice {
                callback_id,
                data,
                message,
            } => {
                self.services.notifier().ack(&callback_id).await;
                (Input::from_choice_data(&data), Some(message))
            },
        };
        let reply = Reply {
            services: &self.services,
            chat: &event.chat,
            origin,
        };

        if let Input::Choice(choice @ (Choice::MenuUpload | Choice::MenuUploadFrom | Choice::MenuCheckFill)) = &input {
            *conversation = Some(start(choice, &reply).await);
            return;
        }
        let Some(current) = conversation.take() else {
            reply.show(MENU_PROMPT, Some(&flow::main_menu())).await;
            return;
        };
        tracing::debug!(conversation = ?current, "Continuing conversation");
        let stepped = match current {
            Conversation::Upload(session) => session.step(input, &reply).await.map(|s| s.map(Conversation::Upload)),
            Conversation::Reconcile(session) => {
                session.step(input, &reply).await.map(|s| s.map(Conversation::Reconcile))
            },
        };
        match stepped {
            Ok(next) => *conversation = next,
            Err(e) => {
                tracing::error!(error = ?e, "Conversation failed");
                reply.say(&format!("Something went wrong: {}. Start again from the menu.", &*e)).await;
            },
        }
    }

    async fn slot(&self, chat: &ChatId) -> Slot {
        self.conversations.lock().await.entry(chat.clone()).or_default().clone()
    }

    /// Forget an idle chat's slot, unless another event already holds it.
    async fn release(&self, chat: &ChatId, slot: &Slot) {
        let mut conversations = self.conversations.lock().await;
        let unshared = Arc::strong_count(slot) == 2 && conversations.get(chat).is_some_and(|s| Arc::ptr_eq(s, slot));
        if unshared && slot.try_lock().is_ok_and(|conversation| conversation.is_none()) {
            conversations.remove(chat);
        }
    }

    async fn stop(&self, event: &Event) {
        let text = match self.services.deliverer.control().stop.request(event.user) {
            StopRequest::Granted { newly: true } => {
                "Stopping. The current batch ends after the item in progress and the bot shuts down."
            },
            StopRequest::Granted { newly: false } => "Already stopping.",
            StopRequest::Refused { .. } => "Not allowed: only the operator who first used /stop can stop the bot.",
        };
        // Sent directly: the executor refuses to run once the flag is set.
        let messenger = self.services.notifier().messenger();
        if let Err(e) = messenger.send_message(&event.chat, text, None).await {
            tracing::warn!(error = ?e, "Couldn't answer /stop");
        }
    }
}

/// `/stop` is never queued behind a chat's other events.
pub fn is_stop(event: &Event) -> bool {
    matches!(&event.kind, EventKind::Command(name) if name == "stop")
}

async fn command(name: &str, current: Option<Conversation>, reply: &Reply<'_>) -> Option<Conversation> {
    match name {
        "start" => {
            reply.show(&format!("{GREETING}\n{MENU_PROMPT}"), Some(&flow::main_menu())).await;
            None
        },
        "upload" => Some(start(&Choice::MenuUpload, reply).await),
        "upload_from" => Some(start(&Choice::MenuUploadFrom, reply).await),
        "check_and_fill" => Some(start(&Choice::MenuCheckFill, reply).await),
        "cancel" => {
            reply.say(if current.is_some() { "Cancelled." } else { "Nothing to cancel." }).await;
            None
        },
        _ => {
            reply.show(MENU_PROMPT, Some(&flow::main_menu())).await;
            current
        },
    }
}

async fn start(choice: &Choice, reply: &Reply<'_>) -> Conversation {
    match choice {
        Choice::MenuUploadFrom => Conversation::Upload(selection::Session::begin(selection::Mode::Anchor, reply).await),
        Choice::MenuCheckFill => Conversation::Reconcile(reconcile::Session::begin(reply).await),
        _ => Conversation::Upload(selection::Session::begin(selection::Mode::Count, reply).await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::DESTINATION_PROMPT;
    use crate::testing::{Harness, library};
    use shelfcast_transport::{MessageId, Recorded, UserId};
    use std::time::Duration;

    fn typed(text: &str) -> Event {
        Event {
            chat: ChatId::new("42"),
            user: UserId(7),
            kind: EventKind::from_text(text),
        }
    }

    fn pressed(data: &str) -> Event {
        Event {
            chat: ChatId::new("42"),
            user: UserId(7),
            kind: EventKind::Choice {
                callback_id: format!("cb-{data}"),
                data: data.to_string(),
                message: MessageId(1),
            },
        }
    }

    fn dispatcher(h: &Harness) -> Dispatcher {
        Dispatcher::new(h.services.clone())
    }

    async fn menu_tokens(h: &Harness) -> Vec<String> {
        let keyboard = h.messenger.last_keyboard().await.unwrap();
        keyboard.buttons().map(|b| b.data.clone()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn start_shows_menu() {
        let h = Harness::new(library());
        dispatcher(&h).handle(typed("/start")).await;

        assert!(h.last_text().await.starts_with(GREETING));
        assert_eq!(menu_tokens(&h).await, ["menu_upload", "menu_uploadfrom", "menu_checkfill"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stray_input_gets_menu() {
        let h = Harness::new(library());
        let d = dispatcher(&h);

        d.handle(typed("hello")).await;
        assert_eq!(h.last_text().await, MENU_PROMPT);

        d.handle(typed("/frobnicate")).await;
        assert_eq!(menu_tokens(&h).await, ["menu_upload", "menu_uploadfrom", "menu_checkfill"]);
    }

    #[tokio::test(start_paused = true)]
    async fn upload_everything_through_events() {
        let h = Harness::new(library());
        let d = dispatcher(&h);

        d.handle(pressed("menu_upload")).await;
        assert_eq!(h.last_text().await, DESTINATION_PROMPT);
        d.handle(typed("@shelf")).await;
        d.handle(pressed("cat_0")).await;
        d.handle(pressed("count_all")).await;

        assert_eq!(
            h.messenger.documents().await,
            [
                (ChatId::new("@shelf"), "Alpha.epub".to_string()),
                (ChatId::new("@shelf"), "Beta.epub".to_string()),
                (ChatId::new("@shelf"), "Gamma.epub".to_string()),
            ]
        );
        let answered = h.messenger.recorded().await.into_iter().filter(|r| matches!(r, Recorded::Answer { .. })).count();
        assert_eq!(answered, 3);

        // Conversation is over; the next text gets the menu.
        d.handle(typed("@shelf")).await;
        assert_eq!(h.last_text().await, MENU_PROMPT);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_chats_are_forgotten() {
        let h = Harness::new(library());
        let d = dispatcher(&h);

        d.handle(typed("hello")).await;
        assert!(d.conversations.lock().await.is_empty());

        d.handle(typed("/upload")).await;
        assert_eq!(d.conversations.lock().await.len(), 1);

        d.handle(typed("/cancel")).await;
        assert!(d.conversations.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn held_slot_is_not_forgotten() {
        let h = Harness::new(library());
        let d = dispatcher(&h);
        let chat = ChatId::new("42");
        let held = d.slot(&chat).await;

        d.handle(typed("hello")).await;

        assert!(d.conversations.lock().await.contains_key(&chat));
        drop(held);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_forgets_conversation() {
        let h = Harness::new(library());
        let d = dispatcher(&h);

        d.handle(typed("/check_and_fill")).await;
        d.handle(typed("/cancel")).await;
        assert_eq!(h.last_text().await, "Cancelled.");

        d.handle(typed("/cancel")).await;
        assert_eq!(h.last_text().await, "Nothing to cancel.");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_step_resets_conversation() {
        let h = Harness::new(library());
        std::fs::write(&h.services.remote_index, "not json").unwrap();
        let d = dispatcher(&h);

        d.handle(typed("/check_and_fill")).await;
        d.handle(typed("@shelf")).await;
        d.handle(pressed("checkcat_0")).await;
        assert!(h.last_text().await.starts_with("Something went wrong: couldn't read the channel title index"));

        d.handle(pressed("checkcat_0")).await;
        assert_eq!(h.last_text().await, MENU_PROMPT);
    }

    #[tokio::test(start_paused = true)]
    async fn first_to_stop_owns_it() {
        let h = Harness::new(library());
        let d = dispatcher(&h);

        d.handle(typed("/stop")).await;
        assert!(d.is_stopped());
        assert!(h.last_text().await.starts_with("Stopping."));

        let mut other = typed("/stop");
        other.user = UserId(8);
        d.handle(other).await;
        assert!(h.last_text().await.starts_with("Not allowed"));

        d.handle(typed("/stop")).await;
        assert_eq!(h.last_text().await, "Already stopping.");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_does_not_wait_for_busy_conversation() {
        let h = Harness::new(library());
        let d = dispatcher(&h);
        let slot = d.slot(&ChatId::new("42")).await;
        let _busy = slot.lock().await;

        let handled = tokio::time::timeout(Duration::from_secs(1), d.handle(typed("/stop"))).await;

        assert!(handled.is_ok());
        assert!(d.is_stopped());
    }
}
