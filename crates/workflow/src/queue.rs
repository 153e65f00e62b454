//! Per-chat event queues.
//!
//! Events from one chat are handled strictly in arrival order by a worker
//! task that only lives while the chat has events waiting. `/stop` skips the
//! queue so it can reach a batch that is still running.

use crate::dispatcher::{Dispatcher, is_stop};
use shelfcast_transport::{ChatId, Event};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;

type Lanes = Arc<Mutex<HashMap<ChatId, UnboundedSender<Event>>>>;

pub struct ChatQueues {
    dispatcher: Arc<Dispatcher>,
    lanes: Lanes,
}

impl ChatQueues {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            lanes: Lanes::default(),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Queue `event` behind earlier events from the same chat, spawning a
    /// worker for the chat onto `tasks` when it has none.
    pub async fn submit(&self, event: Event, tasks: &mut JoinSet<()>) {
        if is_stop(&event) {
            let dispatcher = self.dispatcher.clone();
            tasks.spawn(async move { dispatcher.handle(event).await });
            return;
        }

        // Held across the send so a worker can't deregister in between.
        let mut lanes = self.lanes.lock().await;
        let chat = event.chat.clone();
        let event = match lanes.get(&chat) {
            Some(sender) => match sender.send(event) {
                Ok(()) => return,
                // Worker died without deregistering.
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };
        let (sender, receiver) = mpsc::unbounded_channel();
        if sender.send(event).is_err() {
            return;
        }
        lanes.insert(chat.clone(), sender);
        tasks.spawn(drain(self.dispatcher.clone(), self.lanes.clone(), chat, receiver));
    }

    /// Chats with a live worker.
    pub async fn active(&self) -> usize {
        self.lanes.lock().await.len()
    }
}

async fn drain(dispatcher: Arc<Dispatcher>, lanes: Lanes, chat: ChatId, mut receiver: UnboundedReceiver<Event>) {
    loop {
        let next = match receiver.try_recv() {
            Ok(event) => Some(event),
            Err(_) => {
                let mut lanes = lanes.lock().await;
                let next = receiver.try_recv().ok();
                if next.is_none() {
                    lanes.remove(&chat);
                }
                next
            },
        };
        let Some(event) = next else {
            tracing::trace!(%chat, "Chat queue drained");
            return;
        };
        dispatcher.handle(event).await;
    }
}
