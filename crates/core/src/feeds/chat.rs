//! Chat feed: assembles streamed assistant answers.
//!
//! Fragments accumulate in a draft that is separate from `chatHistory`. The
//! draft is mirrored on the volatile `chatDraft` key for display and moved
//! into history, in one piece, when the `[END]` sentinel arrives.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::format::format_reply;
use crate::config::{CHAT_CHANNEL, Limits};
use crate::error::{CommandError, TransportError};
use crate::models::{ChatMessage, Sender, counters};
use crate::result::ResultExt;
use crate::store::{Store, keys};
use crate::transport::{ChannelHandlers, ConnectionHandle, TransportManager};

/// Frame marking the end of one assistant answer.
pub const END_SENTINEL: &str = "[END]";

/// Interpreter for the `ai-chat` channel.
#[derive(Debug)]
pub struct ChatFeed {
    store: Store,
    transport: TransportManager,
    limits: Limits,
    draft: RefCell<Option<String>>,
}

impl ChatFeed {
    pub fn new(store: Store, transport: TransportManager) -> Rc<Self> {
        let limits = transport.config().limits;
        Rc::new(Self {
            store,
            transport,
            limits,
            draft: RefCell::new(None),
        })
    }

    pub fn handlers(self: &Rc<Self>) -> ChannelHandlers {
        let (open, message, error, close) = (
            Rc::downgrade(self),
            Rc::downgrade(self),
            Rc::downgrade(self),
            Rc::downgrade(self),
        );
        ChannelHandlers::new()
            .on_open(move || {
                if let Some(feed) = open.upgrade() {
                    feed.set_online(true);
                }
            })
            .on_message(move |frame| {
                if let Some(feed) = message.upgrade() {
                    feed.handle_fragment(frame);
                }
            })
            .on_error(move |_| {
                if let Some(feed) = error.upgrade() {
                    feed.set_online(false);
                }
            })
            .on_close(move |_| {
                if let Some(feed) = close.upgrade() {
                    feed.handle_close();
                }
            })
    }

    /// Open (or replace) the `ai-chat` channel.
    ///
    /// # Errors
    /// Returns the transport error when the channel cannot be opened.
    pub fn connect(self: &Rc<Self>) -> Result<ConnectionHandle, TransportError> {
        self.transport.open(CHAT_CHANNEL, self.handlers())
    }

    /// Close the `ai-chat` channel. An answer still streaming is committed
    /// as it stands, so the next answer starts from an empty draft.
    pub fn disconnect(&self) {
        self.transport.close(CHAT_CHANNEL);
        self.handle_close();
    }

    pub fn is_online(&self) -> bool {
        self.transport.is_ready(CHAT_CHANNEL)
    }

    /// Append a user question to history and send it.
    ///
    /// # Errors
    /// `EmptyInput` for blank text, `Transport` when the channel is not open.
    pub fn send(&self, question: &str) -> Result<(), CommandError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(CommandError::EmptyInput);
        }
        if !self.is_online() {
            return Err(TransportError::not_connected(CHAT_CHANNEL).into());
        }

        self.store.batch(|store| {
            let _ = store
                .push_bounded(
                    keys::CHAT_HISTORY,
                    &ChatMessage::user(question),
                    self.limits.chat_history,
                )
                .tap_err(|e| warn!(error = %e, "Failed to record question"));
            store.increment_counter(keys::STATS, counters::AI_REQUESTS);
        });
        self.transport.send(CHAT_CHANNEL, question)?;
        self.store.set(keys::CHAT_TYPING, json!(true), false);
        debug!(chars = question.len(), "Question sent");
        Ok(())
    }

    /// Feed one raw frame from the channel.
    pub fn handle_fragment(&self, frame: &str) {
        if frame == END_SENTINEL {
            self.finish();
            return;
        }
        let text = {
            let mut draft = self.draft.borrow_mut();
            let text = draft.get_or_insert_with(String::new);
            text.push_str(frame);
            text.clone()
        };
        let _ = self
            .store
            .set_as(keys::CHAT_DRAFT, &ChatMessage::assistant(text), false)
            .tap_err(|e| warn!(error = %e, "Failed to publish draft"));
    }

    /// Raw text of the answer being streamed, if any.
    pub fn draft(&self) -> Option<String> {
        self.draft.borrow().clone()
    }

    /// HTML of the answer being streamed, rendered from the full draft.
    pub fn rendered_draft(&self) -> Option<String> {
        self.draft.borrow().as_deref().map(format_reply)
    }

    /// Finalized messages, oldest first.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.store.get_as(keys::CHAT_HISTORY)
    }

    /// Empty history and drop any in-progress answer.
    pub fn clear(&self) {
        self.draft.borrow_mut().take();
        self.store.batch(|store| {
            store.set(keys::CHAT_HISTORY, json!([]), true);
            store.set(keys::CHAT_DRAFT, Value::Null, false);
            store.set(keys::CHAT_TYPING, json!(false), false);
        });
    }

    /// Plain-text transcript of the history, `None` when it is empty.
    pub fn export_transcript(&self, date_label: &str) -> Option<String> {
        let messages = self.messages();
        if messages.is_empty() {
            return None;
        }
        let mut text = format!("=== X-Recon AI Chat Export ===\nDate: {date_label}\n\n");
        for message in &messages {
            let speaker = match message.sender {
                Sender::User => "You",
                Sender::Assistant => "X-AI",
            };
            text.push_str(&format!("[{speaker}]\n{}\n\n", message.text));
        }
        Some(text)
    }

    fn finish(&self) {
        let draft = self.draft.borrow_mut().take();
        self.store.batch(|store| {
            store.set(keys::CHAT_TYPING, json!(false), false);
            let Some(text) = draft else {
                debug!("End marker without an answer");
                return;
            };
            info!(chars = text.len(), "Answer complete");
            let _ = store
                .push_bounded(
                    keys::CHAT_HISTORY,
                    &ChatMessage::assistant(text),
                    self.limits.chat_history,
                )
                .tap_err(|e| warn!(error = %e, "Failed to record answer"));
            store.set(keys::CHAT_DRAFT, Value::Null, false);
        });
    }

    fn handle_close(&self) {
        // Keep whatever arrived before the drop.
        if self.draft.borrow().is_some() {
            self.finish();
        }
        self.store.set(keys::CHAT_TYPING, json!(false), false);
        self.set_online(false);
    }

    fn set_online(&self, online: bool) {
        self.store.set(keys::CHAT_ONLINE, json!(online), false);
    }
}
