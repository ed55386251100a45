//! Terminal feed: scan output, operator commands and scan lifecycle.
//!
//! Every line goes to the [`TerminalSink`] for display. Lines that belong to
//! the session are also appended to `terminalHistory`; connection errors,
//! the restore notice and replayed history are display-only.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::classify::classify;
use super::post_notice;
use crate::clock::Clock;
use crate::config::{Limits, TERMINAL_CHANNEL};
use crate::error::{CommandError, TransportError};
use crate::models::{
    EntryKind, NoticeLevel, PendingScan, ScanRecord, ScanStatus, TerminalEntry, counters,
};
use crate::result::ResultExt;
use crate::store::{Store, keys};
use crate::transport::{ChannelHandlers, ConnectionHandle, TransportManager};

const RESTORED_NOTICE: &str = "Session restored. Previous output preserved.";

/// Display surface for terminal lines.
pub trait TerminalSink {
    fn show(&self, entry: &TerminalEntry);

    /// Drop every displayed line.
    fn reset(&self);
}

/// Sink buffering lines in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    lines: RefCell<Vec<TerminalEntry>>,
    resets: Cell<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<TerminalEntry> {
        self.lines.borrow().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lines.borrow().iter().map(|l| l.message.clone()).collect()
    }

    pub fn resets(&self) -> usize {
        self.resets.get()
    }
}

impl TerminalSink for RecordingSink {
    fn show(&self, entry: &TerminalEntry) {
        self.lines.borrow_mut().push(entry.clone());
    }

    fn reset(&self) {
        self.lines.borrow_mut().clear();
        self.resets.set(self.resets.get().saturating_add(1));
    }
}

/// Validate a scan request and stage it under `pendingScan` for the
/// dashboard to pick up.
///
/// # Errors
/// Returns `CommandError::EmptyTarget` or `CommandError::NoModules`.
pub fn stage_pending_scan<S: AsRef<str>>(
    store: &Store,
    clock: &dyn Clock,
    target: &str,
    modules: &[S],
) -> Result<PendingScan, CommandError> {
    let pending = PendingScan {
        target: validated_target(target)?.to_string(),
        modules: validated_modules(modules)?,
        timestamp: clock.now_millis(),
    };
    store
        .set_as(keys::PENDING_SCAN, &pending, false)
        .or_default_logged("Failed to stage pending scan");
    Ok(pending)
}

fn validated_target(target: &str) -> Result<&str, CommandError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(CommandError::EmptyTarget);
    }
    Ok(target)
}

fn validated_modules<S: AsRef<str>>(modules: &[S]) -> Result<Vec<String>, CommandError> {
    if modules.is_empty() {
        return Err(CommandError::NoModules);
    }
    Ok(modules.iter().map(|m| m.as_ref().to_string()).collect())
}

/// Interpreter for the `terminal` channel.
pub struct TerminalFeed {
    store: Store,
    transport: TransportManager,
    clock: Rc<dyn Clock>,
    sink: Rc<dyn TerminalSink>,
    limits: Limits,
    max_pending_age_ms: i64,
    deferred: RefCell<Option<PendingScan>>,
    on_complete: RefCell<Option<Rc<dyn Fn()>>>,
}

impl std::fmt::Debug for TerminalFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalFeed")
            .field("limits", &self.limits)
            .field("deferred", &self.deferred.borrow())
            .finish_non_exhaustive()
    }
}

impl TerminalFeed {
    pub fn new(
        store: Store,
        transport: TransportManager,
        clock: Rc<dyn Clock>,
        sink: Rc<dyn TerminalSink>,
    ) -> Rc<Self> {
        let limits = transport.config().limits;
        let max_pending_age_ms = transport.config().timing.pending_scan_max_age_ms;
        Rc::new(Self {
            store,
            transport,
            clock,
            sink,
            limits,
            max_pending_age_ms,
            deferred: RefCell::new(None),
            on_complete: RefCell::new(None),
        })
    }

    /// Register a callback run after each scan completes.
    pub fn set_on_complete(&self, hook: impl Fn() + 'static) {
        *self.on_complete.borrow_mut() = Some(Rc::new(hook));
    }

    /// Handlers routing channel events into this feed. They hold only a weak
    /// reference, so a dropped feed simply stops reacting.
    pub fn handlers(self: &Rc<Self>) -> ChannelHandlers {
        let (open, message, close) = (Rc::downgrade(self), Rc::downgrade(self), Rc::downgrade(self));
        ChannelHandlers::new()
            .on_open(move || {
                if let Some(feed) = open.upgrade() {
                    feed.handle_open();
                }
            })
            .on_message(move |line| {
                if let Some(feed) = message.upgrade() {
                    feed.handle_line(line);
                }
            })
            .on_close(move |_| {
                if let Some(feed) = close.upgrade() {
                    feed.handle_close();
                }
            })
    }

    /// Open (or replace) the `terminal` channel.
    ///
    /// # Errors
    /// Returns the transport error when the channel cannot be opened.
    pub fn connect(self: &Rc<Self>) -> Result<ConnectionHandle, TransportError> {
        self.transport.open(TERMINAL_CHANNEL, self.handlers())
    }

    /// Close the `terminal` channel without reporting a lost connection.
    ///
    /// A scan still waiting for the channel to open is dropped with it.
    pub fn disconnect(&self) {
        if let Some(pending) = self.deferred.borrow_mut().take() {
            debug!(scan_target = %pending.target, "Dropping deferred scan");
        }
        self.transport.close(TERMINAL_CHANNEL);
        self.store.set(keys::IS_CONNECTED, json!(false), false);
    }

    /// Reset the sink and replay persisted history to it, followed by a
    /// restore notice.
    ///
    /// Nothing is written back to the store. Returns the number of replayed
    /// entries; an empty history shows nothing.
    pub fn restore(&self) -> usize {
        self.sink.reset();
        let history = self.history();
        if history.is_empty() {
            return 0;
        }
        for entry in &history {
            self.sink.show(entry);
        }
        self.emit(RESTORED_NOTICE, EntryKind::Info, "📋", false);
        debug!(entries = history.len(), "Restored terminal history");
        history.len()
    }

    /// Persisted entries that still decode, oldest first.
    pub fn history(&self) -> Vec<TerminalEntry> {
        match self.store.get(keys::TERMINAL_HISTORY) {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| {
                    serde_json::from_value(item)
                        .into_option_logged("Skipping undecodable terminal entry")
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.store.get_as(keys::IS_SCANNING)
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_ready(TERMINAL_CHANNEL)
    }

    /// Classify and record one server line.
    pub fn handle_line(&self, raw: &str) {
        let line = classify(raw);
        self.emit(&line.message, line.kind, line.prefix, true);
        if line.completes_scan {
            self.complete_scan();
        }
    }

    pub fn handle_open(&self) {
        self.emit("Connected to X-Recon Core.", EntryKind::Success, "SYSTEM", true);
        self.store.set(keys::IS_CONNECTED, json!(true), false);

        let deferred = self.deferred.borrow_mut().take();
        if let Some(pending) = deferred {
            info!(scan_target = %pending.target, "Running deferred scan");
            let _ = self
                .execute_scan(&pending.target, &pending.modules)
                .tap_err(|e| warn!(error = %e, "Deferred scan did not start"));
        }
    }

    pub fn handle_close(&self) {
        self.emit("Connection lost. Please refresh.", EntryKind::Error, "ERROR", true);
        self.store.set(keys::IS_CONNECTED, json!(false), false);
    }

    /// Start a scan of `target` with the given module ids.
    ///
    /// The start frame is sent before anything is recorded, so a rejected
    /// send leaves history and counters untouched.
    ///
    /// # Errors
    /// - `EmptyTarget` / `NoModules` for an invalid request
    /// - `Transport` when the channel is not open
    /// - `ScanInProgress` while another scan runs
    pub fn execute_scan<S: AsRef<str>>(
        &self,
        target: &str,
        modules: &[S],
    ) -> Result<(), CommandError> {
        let target = validated_target(target).tap_err(|_| {
            post_notice(&self.store, "Please enter a target", NoticeLevel::Error);
        })?;
        let modules = validated_modules(modules).tap_err(|_| {
            post_notice(
                &self.store,
                "Please select at least one scan type",
                NoticeLevel::Error,
            );
        })?;
        self.ensure_connected("Terminal not connected. Please refresh the page.")?;
        if self.is_scanning() {
            self.emit(
                "A scan is already running. Please wait...",
                EntryKind::Warning,
                "⚠️",
                true,
            );
            return Err(CommandError::ScanInProgress);
        }

        self.send(&format!("start_scan:{target}|{}", modules.join(",")))?;
        info!(scan_target = target, modules = ?modules, "Scan started");

        self.store.batch(|store| {
            store.set(keys::LAST_TARGET, json!(target), true);
            store.set(keys::IS_SCANNING, json!(true), false);
            self.emit(
                &format!("Initiating scan on target: {target}"),
                EntryKind::Warning,
                "🎯",
                true,
            );
            self.emit(
                &format!("Modules: {}", modules.join(", ")),
                EntryKind::Info,
                "📦",
                true,
            );
            let record = ScanRecord {
                target: target.to_string(),
                modules,
                timestamp: self.clock.now_millis(),
                status: ScanStatus::Running,
            };
            let _ = store
                .push_bounded(keys::SCAN_HISTORY, &record, self.limits.scan_history)
                .tap_err(|e| warn!(error = %e, "Failed to record scan"));
            store.increment_counter(keys::STATS, counters::TOTAL_SCANS);
        });
        Ok(())
    }

    /// Ask the backend to stop the running scan.
    ///
    /// # Errors
    /// `Transport` when the channel is not open, `NoActiveScan` when idle.
    pub fn stop_scan(&self) -> Result<(), CommandError> {
        self.ensure_connected("Terminal not connected.")?;
        if !self.is_scanning() {
            self.emit("No scan is currently running.", EntryKind::Warning, "⚠️", true);
            return Err(CommandError::NoActiveScan);
        }

        self.send("stop_scan")?;
        info!("Scan stopped by operator");
        self.store.batch(|store| {
            store.set(keys::IS_SCANNING, json!(false), false);
            self.mark_last_running(ScanStatus::Stopped);
            self.emit("Scan stopped by user.", EntryKind::Warning, "⏹️", true);
        });
        Ok(())
    }

    /// Echo and forward a raw shell command.
    ///
    /// # Errors
    /// `EmptyInput` for blank text, `Transport` when the channel is not open.
    pub fn send_command(&self, text: &str) -> Result<(), CommandError> {
        let command = text.trim();
        if command.is_empty() {
            return Err(CommandError::EmptyInput);
        }
        self.ensure_connected("Terminal not connected. Please refresh.")?;
        self.emit(command, EntryKind::User, "$", true);
        self.send(&format!("cmd:{command}"))
    }

    /// Empty the persisted history and the display.
    pub fn clear(&self) {
        self.store.clear_terminal_history();
        self.sink.reset();
        self.emit("Terminal cleared.", EntryKind::Success, "▶", false);
    }

    /// Take the staged `pendingScan`, if any, and run it once.
    ///
    /// A hand-off older than the configured age is discarded. When the
    /// channel is not open yet the scan is deferred until it opens. Returns
    /// whether a scan was started or deferred.
    pub fn consume_pending_scan(&self) -> bool {
        let Some(pending) = self.store.get_opt::<PendingScan>(keys::PENDING_SCAN) else {
            return false;
        };
        self.store.set(keys::PENDING_SCAN, Value::Null, false);

        let age = self.clock.now_millis().saturating_sub(pending.timestamp);
        if age >= self.max_pending_age_ms {
            debug!(age, "Discarding stale pending scan");
            return false;
        }

        if self.is_connected() {
            let _ = self
                .execute_scan(&pending.target, &pending.modules)
                .tap_err(|e| warn!(error = %e, "Pending scan did not start"));
        } else {
            *self.deferred.borrow_mut() = Some(pending);
            self.emit(
                "Waiting for connection to start scan...",
                EntryKind::Warning,
                "⏳",
                true,
            );
        }
        true
    }

    pub fn has_deferred_scan(&self) -> bool {
        self.deferred.borrow().is_some()
    }

    fn complete_scan(&self) {
        info!("Scan completed");
        self.store.batch(|store| {
            store.set(keys::IS_SCANNING, json!(false), false);
            self.mark_last_running(ScanStatus::Completed);
            self.emit("Scan completed successfully!", EntryKind::Success, "✅", true);
        });
        post_notice(&self.store, "Scan completed!", NoticeLevel::Success);

        let hook = self.on_complete.borrow().clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn mark_last_running(&self, status: ScanStatus) {
        let mut records: Vec<ScanRecord> = self.store.get_as(keys::SCAN_HISTORY);
        let Some(record) = records
            .iter_mut()
            .rev()
            .find(|r| r.status == ScanStatus::Running)
        else {
            return;
        };
        record.status = status;
        let _ = self
            .store
            .set_as(keys::SCAN_HISTORY, &records, true)
            .tap_err(|e| warn!(error = %e, "Failed to update scan history"));
    }

    fn ensure_connected(&self, message: &str) -> Result<(), CommandError> {
        if self.is_connected() {
            return Ok(());
        }
        self.emit(message, EntryKind::Error, "ERR", false);
        Err(TransportError::not_connected(TERMINAL_CHANNEL).into())
    }

    fn send(&self, payload: &str) -> Result<(), CommandError> {
        self.transport.send(TERMINAL_CHANNEL, payload).map_err(|e| {
            self.emit(&format!("Send failed: {e}"), EntryKind::Error, "ERR", false);
            CommandError::from(e)
        })
    }

    fn emit(&self, message: &str, kind: EntryKind, prefix: &str, persist: bool) {
        let entry = TerminalEntry::new(message, kind, prefix, self.clock.time_label());
        self.sink.show(&entry);
        if persist {
            let _ = self
                .store
                .push_bounded(keys::TERMINAL_HISTORY, &entry, self.limits.terminal_history)
                .tap_err(|e| warn!(error = %e, "Failed to record terminal line"));
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;
    use crate::clock::ManualClock;
    use crate::config::ClientConfig;
    use crate::transport::fake::FakeConnector;

    struct Fixture {
        store: Store,
        connector: FakeConnector,
        sink: Rc<RecordingSink>,
        feed: Rc<TerminalFeed>,
    }

    fn fixture() -> Fixture {
        let store = Store::in_memory();
        let connector = FakeConnector::new();
        let config = ClientConfig::default().with_origin("http://localhost:8000");
        let transport = TransportManager::new(Rc::new(connector.clone()), Rc::new(config));
        let sink = Rc::new(RecordingSink::new());
        let feed = TerminalFeed::new(
            store.clone(),
            transport,
            Rc::new(ManualClock::new(3_723_000)),
            sink.clone(),
        );
        Fixture {
            store,
            connector,
            sink,
            feed,
        }
    }

    #[test]
    fn test_line_is_classified_and_persisted() {
        let f = fixture();
        f.feed.handle_line(">> Resolving scanme.nmap.org");

        let history = f.feed.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, "Resolving scanme.nmap.org");
        assert_eq!(history[0].prefix, "▶");
        assert_eq!(history[0].timestamp, "01:02:03");
        assert_eq!(f.sink.lines(), history);
    }

    #[test]
    fn test_open_and_close_lines() {
        let f = fixture();
        f.feed.connect().unwrap();
        let socket = f.connector.last().unwrap();

        socket.open();
        assert_eq!(f.store.get(keys::IS_CONNECTED), Some(json!(true)));
        socket.remote_close(1006, "");
        assert_eq!(f.store.get(keys::IS_CONNECTED), Some(json!(false)));

        assert_eq!(
            f.sink.messages(),
            vec!["Connected to X-Recon Core.", "Connection lost. Please refresh."]
        );
        assert_eq!(f.feed.history()[1].kind, EntryKind::Error);
    }

    #[test]
    fn test_disconnect_reports_nothing() {
        let f = fixture();
        f.feed.connect().unwrap();
        f.connector.last().unwrap().open();
        f.feed.disconnect();
        assert_eq!(f.sink.messages(), vec!["Connected to X-Recon Core."]);
        assert_eq!(f.store.get(keys::IS_CONNECTED), Some(json!(false)));
    }

    #[test]
    fn test_empty_target_posts_notice() {
        let f = fixture();
        let result = f.feed.execute_scan("   ", &["port_scanner.py"]);
        assert_eq!(result, Err(CommandError::EmptyTarget));
        assert_eq!(f.store.get(keys::NOTICE).unwrap()["level"], "error");
    }

    #[test]
    fn test_clear_resets_display_and_history() {
        let f = fixture();
        f.feed.handle_line("one");
        f.feed.clear();
        assert!(f.feed.history().is_empty());
        assert_eq!(f.sink.resets(), 1);
        assert_eq!(f.sink.messages(), vec!["Terminal cleared."]);
    }

    #[test]
    fn test_restore_with_empty_history_shows_nothing() {
        let f = fixture();
        assert_eq!(f.feed.restore(), 0);
        assert!(f.sink.lines().is_empty());
    }

    #[test]
    fn test_history_skips_undecodable_entries() {
        let f = fixture();
        f.store.set(
            keys::TERMINAL_HISTORY,
            json!([
                {"message": "ok", "kind": "info", "prefix": "INFO", "timestamp": "10:00:00"},
                {"garbage": true},
                {"message": "legacy", "type": "success", "prefix": "✓", "time": "10:00:01"}
            ]),
            false,
        );
        let history = f.feed.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].kind, EntryKind::Success);
    }
}
