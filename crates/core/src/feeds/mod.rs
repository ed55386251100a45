//! Stream interpreters turning raw channel frames into store entries.

pub mod chat;
pub mod classify;
pub mod format;
pub mod terminal;

use tracing::warn;

use crate::models::{Notice, NoticeLevel};
use crate::result::ResultExt;
use crate::store::{Store, keys};

pub use chat::ChatFeed;
pub use terminal::{TerminalFeed, TerminalSink};

/// Publish a dismissable notice on the volatile `notice` key.
pub fn post_notice(store: &Store, message: &str, level: NoticeLevel) {
    let _ = store
        .set_as(keys::NOTICE, &Notice::new(message, level), false)
        .tap_err(|e| warn!(error = %e, "Failed to post notice"));
}
