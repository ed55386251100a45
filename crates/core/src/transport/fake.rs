//! In-process connector for tests and offline demos.
//!
//! Every `connect` creates a [`FakeSocket`] the test drives by hand: it
//! decides when the socket opens, what arrives, and when the peer hangs up.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{CloseInfo, Connection, Connector, EventSink, TransportEvent};
use crate::error::TransportError;

/// Test-side handle to one fake connection.
#[derive(Debug, Clone)]
pub struct FakeSocket {
    url: Rc<str>,
    sink: EventSink,
    sent: Rc<RefCell<Vec<String>>>,
    ready: Rc<Cell<bool>>,
    closed: Rc<Cell<bool>>,
}

impl FakeSocket {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Complete the handshake. Returns whether the event was delivered.
    pub fn open(&self) -> bool {
        self.ready.set(true);
        self.sink.emit(TransportEvent::Open)
    }

    pub fn message(&self, text: &str) -> bool {
        self.sink.emit(TransportEvent::Message(text.to_string()))
    }

    pub fn error(&self, reason: &str) -> bool {
        self.sink.emit(TransportEvent::Error(reason.to_string()))
    }

    /// Peer-initiated close.
    pub fn remote_close(&self, code: u16, reason: &str) -> bool {
        self.ready.set(false);
        self.closed.set(true);
        self.sink.emit(TransportEvent::Close(CloseInfo::new(code, reason)))
    }

    /// Frames written by the client, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.sent.borrow().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub fn is_attached(&self) -> bool {
        self.sink.is_attached()
    }
}

struct FakeConnection(FakeSocket);

impl Connection for FakeConnection {
    fn send(&self, payload: &str) -> Result<(), TransportError> {
        if self.0.closed.get() || !self.0.ready.get() {
            return Err(TransportError::SendFailed("socket is not open".to_string()));
        }
        self.0.sent.borrow_mut().push(payload.to_string());
        Ok(())
    }

    fn close(&self) {
        if self.0.closed.replace(true) {
            return;
        }
        self.0.ready.set(false);
        // A real socket reports its own close; a detached sink swallows it.
        self.0
            .sink
            .emit(TransportEvent::Close(CloseInfo::new(1000, "client closed")));
    }
}

#[derive(Default)]
struct FakeConnectorInner {
    sockets: Vec<FakeSocket>,
    refuse: bool,
}

/// Connector producing [`FakeSocket`]s.
#[derive(Clone, Default)]
pub struct FakeConnector {
    inner: Rc<RefCell<FakeConnectorInner>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `connect` calls fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.borrow_mut().refuse = refuse;
    }

    /// Every socket created so far, oldest first.
    pub fn sockets(&self) -> Vec<FakeSocket> {
        self.inner.borrow().sockets.clone()
    }

    pub fn last(&self) -> Option<FakeSocket> {
        self.inner.borrow().sockets.last().cloned()
    }

    /// Most recent socket whose URL ends with `path`.
    pub fn latest_for(&self, path: &str) -> Option<FakeSocket> {
        self.inner
            .borrow()
            .sockets
            .iter()
            .rev()
            .find(|s| s.url.ends_with(path))
            .cloned()
    }
}

impl Connector for FakeConnector {
    fn connect(&self, url: &str, events: EventSink) -> Result<Box<dyn Connection>, TransportError> {
        if self.inner.borrow().refuse {
            return Err(TransportError::ConnectionFailed(format!("refused: {url}")));
        }
        let socket = FakeSocket {
            url: Rc::from(url),
            sink: events,
            sent: Rc::new(RefCell::new(Vec::new())),
            ready: Rc::new(Cell::new(false)),
            closed: Rc::new(Cell::new(false)),
        };
        self.inner.borrow_mut().sockets.push(socket.clone());
        Ok(Box::new(FakeConnection(socket)))
    }
}
