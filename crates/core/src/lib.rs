//! Client core of the X-Recon security console.
//!
//! This crate keeps the console's state and its two live feeds consistent.
//! Key pieces:
//!
//! - **Store**: reactive key/value state with size-bounded durable persistence
//! - **Transport manager**: named duplex channels with detach-before-close
//! - **Feeds**: the terminal and chat stream interpreters
//! - **Router**: single-flight view transitions
//!
//! Everything runs on one thread. Browser APIs stay behind the
//! [`StorageBackend`], [`Connector`], [`Backend`] and [`View`] seams, so the
//! whole crate is testable on the host.
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use xrecon_core::{
//!     ClientConfig, MemoryStorage, RecordingSink, Store, SystemClock, TerminalFeed,
//!     TransportManager, transport::fake::FakeConnector,
//! };
//!
//! let config = Rc::new(ClientConfig::default());
//! let store = Store::open(Rc::new(MemoryStorage::new()), &config);
//! let transport = TransportManager::new(Rc::new(FakeConnector::new()), config);
//! let feed = TerminalFeed::new(store, transport, Rc::new(SystemClock), Rc::new(RecordingSink::new()));
//!
//! feed.connect()?;
//! feed.execute_scan("scanme.nmap.org", &["port_scanner.py"])?;
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod feeds;
pub mod models;
pub mod prefs;
pub mod result;
pub mod router;
pub mod session;
pub mod store;
pub mod transport;

#[cfg(test)]
mod tests;

// Re-export main types
pub use backend::{Backend, ScriptedBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CHAT_CHANNEL, ClientConfig, TERMINAL_CHANNEL};
pub use error::{
    ApiError, CommandError, ConfigError, Error, PersistenceError, RouteError, TransportError,
};
pub use feeds::terminal::RecordingSink;
pub use feeds::{ChatFeed, TerminalFeed, TerminalSink};
pub use models::{ChatMessage, EntryKind, Notice, NoticeLevel, ScanRecord, TerminalEntry};
pub use prefs::{AiModel, Preferences, Theme};
pub use result::{Result, ResultExt};
pub use router::{NavigationOutcome, Router, View, routes};
pub use session::{ChatSession, DashboardSession, ReportsSession, Spawner};
pub use store::{MemoryStorage, Observer, StorageBackend, Store, Subscription, keys};
pub use transport::{
    ChannelHandlers, ChannelState, CloseInfo, Connection, ConnectionHandle, Connector, EventSink,
    TransportEvent, TransportManager,
};
