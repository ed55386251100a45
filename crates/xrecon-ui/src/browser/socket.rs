//! `web_sys::WebSocket` connector.
//!
//! Socket callbacks forward into the [`EventSink`] the manager handed out, so
//! events of a replaced or closed connection are dropped by the core.

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{CloseEvent, Event, MessageEvent, WebSocket};
use xrecon_core::{CloseInfo, Connection, Connector, EventSink, TransportError, TransportEvent};

use crate::error::describe;

/// Opens browser WebSockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

struct Callbacks {
    _open: Closure<dyn FnMut()>,
    _message: Closure<dyn FnMut(MessageEvent)>,
    _error: Closure<dyn FnMut(Event)>,
    _close: Closure<dyn FnMut(CloseEvent)>,
}

struct BrowserConnection {
    socket: WebSocket,
    _callbacks: Callbacks,
}

impl Connector for WebSocketConnector {
    fn connect(&self, url: &str, events: EventSink) -> Result<Box<dyn Connection>, TransportError> {
        let socket =
            WebSocket::new(url).map_err(|e| TransportError::ConnectionFailed(describe(&e)))?;

        let sink = events.clone();
        let open = Closure::wrap(Box::new(move || {
            sink.emit(TransportEvent::Open);
        }) as Box<dyn FnMut()>);

        let sink = events.clone();
        let message = Closure::wrap(Box::new(move |event: MessageEvent| {
            match event.data().as_string() {
                Some(text) => {
                    sink.emit(TransportEvent::Message(text));
                }
                None => tracing::debug!(channel = sink.channel(), "Ignoring binary frame"),
            }
        }) as Box<dyn FnMut(MessageEvent)>);

        let sink = events.clone();
        let error = Closure::wrap(Box::new(move |_: Event| {
            sink.emit(TransportEvent::Error("WebSocket error".to_string()));
        }) as Box<dyn FnMut(Event)>);

        let sink = events;
        let close = Closure::wrap(Box::new(move |event: CloseEvent| {
            sink.emit(TransportEvent::Close(CloseInfo::new(
                event.code(),
                event.reason(),
            )));
        }) as Box<dyn FnMut(CloseEvent)>);

        socket.set_onopen(Some(open.as_ref().unchecked_ref()));
        socket.set_onmessage(Some(message.as_ref().unchecked_ref()));
        socket.set_onerror(Some(error.as_ref().unchecked_ref()));
        socket.set_onclose(Some(close.as_ref().unchecked_ref()));

        Ok(Box::new(BrowserConnection {
            socket,
            _callbacks: Callbacks {
                _open: open,
                _message: message,
                _error: error,
                _close: close,
            },
        }))
    }
}

impl Connection for BrowserConnection {
    fn send(&self, payload: &str) -> Result<(), TransportError> {
        self.socket
            .send_with_str(payload)
            .map_err(|e| TransportError::SendFailed(describe(&e)))
    }

    fn close(&self) {
        if let Err(e) = self.socket.close() {
            tracing::warn!(error = %describe(&e), "WebSocket close failed");
        }
    }
}

impl Drop for BrowserConnection {
    fn drop(&mut self) {
        // The callbacks are freed with this value; the socket must not call them afterwards.
        self.socket.set_onopen(None);
        self.socket.set_onmessage(None);
        self.socket.set_onerror(None);
        self.socket.set_onclose(None);
    }
}
