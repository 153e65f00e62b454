use crate::flow::{Reply, Services};
use shelfcast_config::{Delivery, Selection};
use shelfcast_delivery::{BatchControl, Deliverer, Executor, Ledger, Notifier, RetryPolicy};
use shelfcast_inventory::MockInventory;
use shelfcast_transport::{ChatId, MessageId, MockMessenger};
use std::sync::Arc;

pub struct Harness {
    pub services: Arc<Services>,
    pub messenger: Arc<MockMessenger>,
    pub operator: ChatId,
    pub dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(inventory: MockInventory) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let messenger = Arc::new(MockMessenger::default());
        let control = Arc::new(BatchControl::default());
        let executor = Arc::new(Executor::new(RetryPolicy::default(), control, messenger.clone()));
        let notifier = Notifier::new(executor, messenger.clone());
        let ledger = Arc::new(Ledger::new(dir.path().join("sent_titles.json")));
        let deliverer = Deliverer::new(Arc::new(inventory), notifier, ledger, &Delivery::default());
        let services = Services {
            deliverer: Arc::new(deliverer),
            selection: Selection::default(),
            remote_index: dir.path().join("channel_titles.json"),
        };
        Self {
            services: Arc::new(services),
            messenger,
            operator: ChatId::new("42"),
            dir,
        }
    }

    pub fn reply(&self, origin: Option<MessageId>) -> Reply<'_> {
        Reply {
            services: &self.services,
            chat: &self.operator,
            origin,
        }
    }

    pub async fn last_text(&self) -> String {
        self.messenger.texts().await.pop().unwrap_or_default()
    }

    pub async fn sent_files(&self) -> Vec<String> {
        self.messenger.documents().await.into_iter().map(|(_, name)| name).collect()
    }
}

/// Two categories: `fiction` with four books, one of them missing its
/// artifact, and an empty `poetry`.
pub fn library() -> MockInventory {
    MockInventory::default()
        .with_sidecars([
            ("fiction", "Alpha.txt", "Title: Alpha"),
            ("fiction", "Beta.txt", "Title: Beta"),
            ("fiction", "Gamma.txt", "Title: Gamma"),
            ("fiction", "Lost.txt", "Title: Lost"),
        ])
        .with_artifacts([
            ("fiction", "Alpha.epub", b"a".as_slice()),
            ("fiction", "Beta.epub", b"b".as_slice()),
            ("fiction", "Gamma.epub", b"c".as_slice()),
        ])
        .with_sidecars([("poetry", ".keep", "")])
}
