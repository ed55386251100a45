//! Behavioral tests for the console core
//!
//! BDD-style tests using the given-when-then naming convention. Each test
//! drives the public surface through fake sockets and in-memory storage.

#![allow(clippy::unwrap_used)]
#![allow(clippy::indexing_slicing)]


use std::rc::Rc;

use crate::clock::ManualClock;
use crate::config::ClientConfig;
use crate::feeds::terminal::RecordingSink;
use crate::feeds::{ChatFeed, TerminalFeed};
use crate::store::{MemoryStorage, Store};
use crate::transport::TransportManager;
use crate::transport::fake::{FakeConnector, FakeSocket};

/// 2026-10-14 09:30:00 UTC.
pub const START_MILLIS: i64 = 1_791_970_200_000;

/// Everything a page needs, wired over fakes.
pub struct Console {
    pub storage: MemoryStorage,
    pub config: Rc<ClientConfig>,
    pub store: Store,
    pub connector: FakeConnector,
    pub transport: TransportManager,
    pub clock: Rc<ManualClock>,
    pub sink: Rc<RecordingSink>,
}

impl Console {
    pub fn new() -> Self {
        Self::over(MemoryStorage::new())
    }

    /// Console over existing storage, as after a page reload.
    pub fn over(storage: MemoryStorage) -> Self {
        let config = Rc::new(ClientConfig::default().with_origin("http://localhost:8000"));
        let store = Store::open(Rc::new(storage.clone()), &config);
        let connector = FakeConnector::new();
        let transport = TransportManager::new(Rc::new(connector.clone()), Rc::clone(&config));
        Self {
            storage,
            config,
            store,
            connector,
            transport,
            clock: Rc::new(ManualClock::new(START_MILLIS)),
            sink: Rc::new(RecordingSink::new()),
        }
    }

    pub fn terminal(&self) -> Rc<TerminalFeed> {
        TerminalFeed::new(
            self.store.clone(),
            self.transport.clone(),
            self.clock.clone(),
            self.sink.clone(),
        )
    }

    pub fn chat(&self) -> Rc<ChatFeed> {
        ChatFeed::new(self.store.clone(), self.transport.clone())
    }

    pub fn terminal_socket(&self) -> FakeSocket {
        self.connector.latest_for("/ws/terminal").unwrap()
    }

    pub fn chat_socket(&self) -> FakeSocket {
        self.connector.latest_for("/ws/ai").unwrap()
    }

    /// Persisted snapshot as written to storage.
    pub fn snapshot(&self) -> serde_json::Value {
        let raw = self
            .storage
            .get(&self.config.storage.snapshot_key)
            .unwrap_or_else(|| "{}".to_string());
        serde_json::from_str(&raw).unwrap()
    }
}
