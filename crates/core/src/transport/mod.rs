//! Named duplex channels over pluggable connections.
//!
//! The manager owns the map from channel name to at most one live connection
//! and forwards lifecycle events to the handlers registered at `open`. It does
//! not interpret payloads and never retries: a failed or closed channel stays
//! down until a caller opens it again.
//!
//! # Detachment
//! Every `open` gets a fresh generation number. Connections deliver events
//! through an [`EventSink`] stamped with that generation, and the manager
//! drops any event whose generation no longer matches the channel's entry.
//! `close` and replacement remove the entry *before* the old connection is
//! told to close, so no stale handler can observe its close sequence.
//!
//! A connection that never opens leaves its channel in
//! [`ChannelState::Connecting`]; no timeout is applied.

pub mod fake;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, error, info};

use crate::config::ClientConfig;
use crate::error::TransportError;

/// Close frame details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// Lifecycle event raised by a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Message(String),
    Error(String),
    Close(CloseInfo),
}

/// Observable state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

type OpenHandler = Box<dyn Fn()>;
type TextHandler = Box<dyn Fn(&str)>;
type CloseHandler = Box<dyn Fn(&CloseInfo)>;

/// Callbacks for one channel. Every handler is optional.
#[derive(Default)]
pub struct ChannelHandlers {
    on_open: Option<OpenHandler>,
    on_message: Option<TextHandler>,
    on_error: Option<TextHandler>,
    on_close: Option<CloseHandler>,
}

impl ChannelHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_open(mut self, f: impl Fn() + 'static) -> Self {
        self.on_open = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_message(mut self, f: impl Fn(&str) + 'static) -> Self {
        self.on_message = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&str) + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_close(mut self, f: impl Fn(&CloseInfo) + 'static) -> Self {
        self.on_close = Some(Box::new(f));
        self
    }

    fn dispatch(&self, event: &TransportEvent) {
        match event {
            TransportEvent::Open => {
                if let Some(f) = &self.on_open {
                    f();
                }
            }
            TransportEvent::Message(text) => {
                if let Some(f) = &self.on_message {
                    f(text);
                }
            }
            TransportEvent::Error(reason) => {
                if let Some(f) = &self.on_error {
                    f(reason);
                }
            }
            TransportEvent::Close(info) => {
                if let Some(f) = &self.on_close {
                    f(info);
                }
            }
        }
    }
}

/// One underlying duplex connection.
pub trait Connection {
    /// Send a text frame.
    ///
    /// # Errors
    /// Returns `TransportError::SendFailed` when the frame cannot be queued.
    fn send(&self, payload: &str) -> Result<(), TransportError>;

    /// Begin the close sequence. Must not fail.
    fn close(&self);
}

/// Factory for connections.
pub trait Connector {
    /// Start connecting to `url`; lifecycle events go to `events`.
    ///
    /// # Errors
    /// Returns `TransportError::ConnectionFailed` when the connection cannot
    /// even be constructed (e.g. a malformed URL rejected by the platform).
    fn connect(&self, url: &str, events: EventSink) -> Result<Box<dyn Connection>, TransportError>;
}

struct ChannelEntry {
    generation: u64,
    connection: Option<Rc<dyn Connection>>,
    handlers: Rc<ChannelHandlers>,
    state: ChannelState,
}

#[derive(Default)]
struct ManagerInner {
    channels: HashMap<String, ChannelEntry>,
    next_generation: u64,
}

/// Event entry point handed to a connection.
#[derive(Clone)]
pub struct EventSink {
    manager: Weak<RefCell<ManagerInner>>,
    channel: Rc<str>,
    generation: u64,
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("channel", &self.channel)
            .field("generation", &self.generation)
            .finish()
    }
}

impl EventSink {
    /// Deliver `event` to the channel's handlers.
    ///
    /// Returns false when the sink has been detached (channel closed or
    /// replaced) and the event was dropped.
    pub fn emit(&self, event: TransportEvent) -> bool {
        let Some(inner) = self.manager.upgrade() else {
            return false;
        };
        let handlers = {
            let mut inner = inner.borrow_mut();
            let Some(entry) = inner.channels.get_mut(&*self.channel) else {
                debug!(channel = %self.channel, "Dropping event for closed channel");
                return false;
            };
            if entry.generation != self.generation {
                debug!(channel = %self.channel, "Dropping event from replaced connection");
                return false;
            }
            match &event {
                TransportEvent::Open => entry.state = ChannelState::Open,
                TransportEvent::Close(_) => entry.state = ChannelState::Closed,
                TransportEvent::Message(_) | TransportEvent::Error(_) => {}
            }
            Rc::clone(&entry.handlers)
        };

        match &event {
            TransportEvent::Open => info!(channel = %self.channel, "WebSocket connected"),
            TransportEvent::Message(text) => {
                debug!(channel = %self.channel, bytes = text.len(), "WebSocket message");
            }
            TransportEvent::Error(reason) => {
                error!(channel = %self.channel, %reason, "WebSocket error");
            }
            TransportEvent::Close(close) => {
                info!(channel = %self.channel, code = close.code, "WebSocket closed");
            }
        }
        handlers.dispatch(&event);
        true
    }

    /// Whether events from this sink still reach handlers.
    pub fn is_attached(&self) -> bool {
        self.manager.upgrade().is_some_and(|inner| {
            inner
                .borrow()
                .channels
                .get(&*self.channel)
                .is_some_and(|entry| entry.generation == self.generation)
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

/// Identifies one `open` of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    pub channel: String,
    pub generation: u64,
}

/// Owner of all named channels.
#[derive(Clone)]
pub struct TransportManager {
    inner: Rc<RefCell<ManagerInner>>,
    connector: Rc<dyn Connector>,
    config: Rc<ClientConfig>,
}

impl fmt::Debug for TransportManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        let mut channels: Vec<&String> = inner.channels.keys().collect();
        channels.sort();
        f.debug_struct("TransportManager")
            .field("channels", &channels)
            .finish()
    }
}

impl TransportManager {
    pub fn new(connector: Rc<dyn Connector>, config: Rc<ClientConfig>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ManagerInner::default())),
            connector,
            config,
        }
    }

    /// Open `channel`, replacing (and closing) any existing connection under
    /// the same name. The old connection's handlers are detached first.
    ///
    /// # Errors
    /// Returns `TransportError::UnknownChannel`/`InvalidUrl` when no URL can
    /// be derived, or the connector's error; the channel is left closed.
    pub fn open(
        &self,
        channel: &str,
        handlers: ChannelHandlers,
    ) -> Result<ConnectionHandle, TransportError> {
        let url = self.config.socket_url(channel)?;

        if let Some(old) = self.detach(channel) {
            info!(channel, "Replacing existing connection");
            old.close();
        }

        let generation = {
            let mut inner = self.inner.borrow_mut();
            let generation = inner.next_generation;
            inner.next_generation = inner.next_generation.saturating_add(1);
            inner.channels.insert(
                channel.to_string(),
                ChannelEntry {
                    generation,
                    connection: None,
                    handlers: Rc::new(handlers),
                    state: ChannelState::Connecting,
                },
            );
            generation
        };

        let sink = EventSink {
            manager: Rc::downgrade(&self.inner),
            channel: Rc::from(channel),
            generation,
        };

        info!(channel, %url, "Connecting");
        let connection: Rc<dyn Connection> = match self.connector.connect(&url, sink) {
            Ok(connection) => Rc::from(connection),
            Err(e) => {
                error!(channel, error = %e, "Failed to connect");
                let mut inner = self.inner.borrow_mut();
                if inner
                    .channels
                    .get(channel)
                    .is_some_and(|entry| entry.generation == generation)
                {
                    inner.channels.remove(channel);
                }
                return Err(e);
            }
        };

        let stale = {
            let mut inner = self.inner.borrow_mut();
            match inner.channels.get_mut(channel) {
                Some(entry) if entry.generation == generation => {
                    entry.connection = Some(Rc::clone(&connection));
                    false
                }
                _ => true,
            }
        };
        if stale {
            // A handler closed or reopened the channel while we were connecting.
            connection.close();
        }

        Ok(ConnectionHandle {
            channel: channel.to_string(),
            generation,
        })
    }

    /// Send a text frame on `channel`.
    ///
    /// # Errors
    /// Returns `TransportError::NotConnected` when the channel has no open
    /// connection, or the connection's send error.
    pub fn send(&self, channel: &str, payload: &str) -> Result<(), TransportError> {
        let connection = {
            let inner = self.inner.borrow();
            inner
                .channels
                .get(channel)
                .filter(|entry| entry.state == ChannelState::Open)
                .and_then(|entry| entry.connection.clone())
        };
        let Some(connection) = connection else {
            debug!(channel, "Send rejected, channel not open");
            return Err(TransportError::not_connected(channel));
        };
        debug!(channel, bytes = payload.len(), "Sending frame");
        connection.send(payload)
    }

    /// Close `channel`. Returns false when it was not open.
    pub fn close(&self, channel: &str) -> bool {
        match self.detach(channel) {
            Some(connection) => {
                info!(channel, "Closing connection");
                connection.close();
                true
            }
            None => self.inner.borrow_mut().channels.remove(channel).is_some(),
        }
    }

    pub fn close_all(&self) {
        let entries: Vec<(String, ChannelEntry)> =
            self.inner.borrow_mut().channels.drain().collect();
        for (channel, entry) in entries {
            if let Some(connection) = entry.connection {
                info!(channel = %channel, "Closing connection");
                connection.close();
            }
        }
    }

    pub fn state(&self, channel: &str) -> Option<ChannelState> {
        self.inner
            .borrow()
            .channels
            .get(channel)
            .map(|entry| entry.state)
    }

    pub fn is_ready(&self, channel: &str) -> bool {
        self.state(channel) == Some(ChannelState::Open)
    }

    /// Whether `handle` still refers to the live connection of its channel.
    pub fn is_current(&self, handle: &ConnectionHandle) -> bool {
        self.inner
            .borrow()
            .channels
            .get(&handle.channel)
            .is_some_and(|entry| entry.generation == handle.generation)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Remove the entry for `channel`, returning its connection if one was attached.
    fn detach(&self, channel: &str) -> Option<Rc<dyn Connection>> {
        let mut inner = self.inner.borrow_mut();
        let connection = inner
            .channels
            .get_mut(channel)
            .and_then(|entry| entry.connection.take());
        if connection.is_some() {
            inner.channels.remove(channel);
        }
        connection
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use std::cell::Cell;

    use super::fake::FakeConnector;
    use super::*;
    use crate::config::{CHAT_CHANNEL, TERMINAL_CHANNEL};

    fn manager() -> (FakeConnector, TransportManager) {
        let connector = FakeConnector::new();
        let config = ClientConfig::default().with_origin("http://localhost:8000");
        let manager = TransportManager::new(Rc::new(connector.clone()), Rc::new(config));
        (connector, manager)
    }

    fn counting_handlers(opens: &Rc<Cell<u32>>, closes: &Rc<Cell<u32>>) -> ChannelHandlers {
        let opens = Rc::clone(opens);
        let closes = Rc::clone(closes);
        ChannelHandlers::new()
            .on_open(move || opens.set(opens.get() + 1))
            .on_close(move |_| closes.set(closes.get() + 1))
    }

    #[test]
    fn test_open_connects_to_derived_url() {
        let (connector, manager) = manager();
        manager.open(TERMINAL_CHANNEL, ChannelHandlers::new()).unwrap();
        assert_eq!(connector.last().unwrap().url(), "ws://localhost:8000/ws/terminal");
        assert_eq!(manager.state(TERMINAL_CHANNEL), Some(ChannelState::Connecting));
    }

    #[test]
    fn test_lifecycle_events_reach_handlers() {
        let (connector, manager) = manager();
        let received = Rc::new(RefCell::new(Vec::new()));
        let errors = Rc::new(RefCell::new(Vec::new()));
        let (msg_log, err_log) = (Rc::clone(&received), Rc::clone(&errors));
        manager
            .open(
                TERMINAL_CHANNEL,
                ChannelHandlers::new()
                    .on_message(move |m| msg_log.borrow_mut().push(m.to_string()))
                    .on_error(move |e| err_log.borrow_mut().push(e.to_string())),
            )
            .unwrap();

        let socket = connector.last().unwrap();
        socket.open();
        assert!(manager.is_ready(TERMINAL_CHANNEL));
        socket.message("line one");
        socket.message("line two");
        socket.error("reset by peer");
        socket.remote_close(1006, "abnormal");

        assert_eq!(*received.borrow(), vec!["line one", "line two"]);
        assert_eq!(*errors.borrow(), vec!["reset by peer"]);
        assert_eq!(manager.state(TERMINAL_CHANNEL), Some(ChannelState::Closed));
    }

    #[test]
    fn test_send_without_connection_is_not_connected() {
        let (_, manager) = manager();
        assert_eq!(
            manager.send(TERMINAL_CHANNEL, "stop_scan"),
            Err(TransportError::not_connected(TERMINAL_CHANNEL))
        );
    }

    #[test]
    fn test_send_before_open_is_not_connected() {
        let (connector, manager) = manager();
        manager.open(TERMINAL_CHANNEL, ChannelHandlers::new()).unwrap();
        assert!(manager.send(TERMINAL_CHANNEL, "stop_scan").is_err());
        assert!(connector.last().unwrap().sent().is_empty());
    }

    #[test]
    fn test_send_after_open_writes_frame() {
        let (connector, manager) = manager();
        manager.open(TERMINAL_CHANNEL, ChannelHandlers::new()).unwrap();
        connector.last().unwrap().open();
        manager.send(TERMINAL_CHANNEL, "cmd:whoami").unwrap();
        assert_eq!(connector.last().unwrap().sent(), vec!["cmd:whoami"]);
    }

    #[test]
    fn test_replacement_detaches_old_handlers_before_close() {
        let (connector, manager) = manager();
        let (old_opens, old_closes) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));
        manager
            .open(TERMINAL_CHANNEL, counting_handlers(&old_opens, &old_closes))
            .unwrap();
        let old_socket = connector.last().unwrap();
        old_socket.open();

        let (new_opens, new_closes) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));
        let handle = manager
            .open(TERMINAL_CHANNEL, counting_handlers(&new_opens, &new_closes))
            .unwrap();

        assert!(old_socket.is_closed());
        assert_eq!(old_closes.get(), 0, "old close handler must not fire");
        assert!(!old_socket.message("late frame"));
        assert!(!old_socket.remote_close(1000, "late"));
        assert_eq!(new_closes.get(), 0);

        assert_eq!(manager.state(TERMINAL_CHANNEL), Some(ChannelState::Connecting));
        connector.last().unwrap().open();
        assert_eq!(new_opens.get(), 1);
        assert!(manager.is_current(&handle));
    }

    #[test]
    fn test_close_detaches_and_removes() {
        let (connector, manager) = manager();
        let (opens, closes) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));
        let handle = manager
            .open(TERMINAL_CHANNEL, counting_handlers(&opens, &closes))
            .unwrap();
        let socket = connector.last().unwrap();
        socket.open();

        assert!(manager.close(TERMINAL_CHANNEL));
        assert!(socket.is_closed());
        assert_eq!(closes.get(), 0);
        assert_eq!(manager.state(TERMINAL_CHANNEL), None);
        assert!(!manager.is_current(&handle));
        assert!(!manager.close(TERMINAL_CHANNEL));
    }

    #[test]
    fn test_close_all_closes_every_channel() {
        let (connector, manager) = manager();
        manager.open(TERMINAL_CHANNEL, ChannelHandlers::new()).unwrap();
        manager.open(CHAT_CHANNEL, ChannelHandlers::new()).unwrap();
        manager.close_all();
        assert!(connector.sockets().iter().all(|s| s.is_closed()));
        assert_eq!(manager.state(TERMINAL_CHANNEL), None);
        assert_eq!(manager.state(CHAT_CHANNEL), None);
    }

    #[test]
    fn test_channels_are_independent() {
        let (connector, manager) = manager();
        manager.open(TERMINAL_CHANNEL, ChannelHandlers::new()).unwrap();
        manager.open(CHAT_CHANNEL, ChannelHandlers::new()).unwrap();
        let sockets = connector.sockets();
        sockets[1].open();
        assert!(manager.is_ready(CHAT_CHANNEL));
        assert!(!manager.is_ready(TERMINAL_CHANNEL));
        assert!(!sockets[0].is_closed());
    }

    #[test]
    fn test_connector_failure_leaves_channel_absent() {
        let (connector, manager) = manager();
        connector.refuse_connections(true);
        let result = manager.open(TERMINAL_CHANNEL, ChannelHandlers::new());
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
        assert_eq!(manager.state(TERMINAL_CHANNEL), None);
    }

    #[test]
    fn test_unknown_channel_rejected() {
        let (connector, manager) = manager();
        let result = manager.open("metrics", ChannelHandlers::new());
        assert_eq!(result, Err(TransportError::UnknownChannel("metrics".to_string())));
        assert!(connector.sockets().is_empty());
    }

    #[test]
    fn test_handler_may_reopen_channel_on_close() {
        let (connector, manager) = manager();
        let reopened = Rc::new(Cell::new(false));
        let (mgr, flag) = (manager.clone(), Rc::clone(&reopened));
        manager
            .open(
                TERMINAL_CHANNEL,
                ChannelHandlers::new().on_close(move |_| {
                    flag.set(mgr.open(TERMINAL_CHANNEL, ChannelHandlers::new()).is_ok());
                }),
            )
            .unwrap();
        connector.last().unwrap().remote_close(1001, "going away");
        assert!(reopened.get());
        assert_eq!(connector.sockets().len(), 2);
    }
}
