//! Console wiring and the store-to-signal bridge.
//!
//! The core is `!Send` and lives behind a [`ConsoleHandle`]. Components read
//! state only through [`Signals`], which mirror store keys and are updated by
//! store observers.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use gloo_timers::callback::{Interval, Timeout};
use leptos::prelude::*;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{error, info, warn};
use wasm_bindgen_futures::spawn_local;
use xrecon_core::feeds::post_notice;
use xrecon_core::models::{ReportEntry, ServerStats, StatsCounters};
use xrecon_core::router::route_from_hash;
use xrecon_core::{
    Backend, ChatFeed, ChatMessage, ChatSession, ClientConfig, Clock, DashboardSession,
    NavigationOutcome, Notice, NoticeLevel, Preferences, ReportsSession, ResultExt, RouteError,
    Router, ScanRecord, Spawner, Store, SystemClock, TerminalEntry, TerminalFeed, TerminalSink,
    Theme, TransportManager, View, keys, routes,
};

use crate::browser::{BrowserStorage, HttpBackend, WebSocketConnector, location};
use crate::error::{Result, UiError};

/// Copyable handle to the console for components and event handlers.
pub type ConsoleHandle = StoredValue<Rc<Console>, LocalStorage>;

/// Runs detached futures on the page's event loop.
pub fn spawner() -> Spawner {
    Rc::new(spawn_local::<LocalBoxFuture<'static, ()>>)
}

/// Reactive mirrors of the store keys the pages render.
#[derive(Debug, Clone, Copy)]
pub struct Signals {
    pub current_view: RwSignal<String>,
    pub theme: RwSignal<String>,
    pub stats: RwSignal<StatsCounters>,
    pub server_stats: RwSignal<ServerStats>,
    pub reports: RwSignal<Vec<ReportEntry>>,
    pub scan_history: RwSignal<Vec<ScanRecord>>,
    pub last_target: RwSignal<String>,
    pub is_connected: RwSignal<bool>,
    pub is_scanning: RwSignal<bool>,
    pub is_loading: RwSignal<bool>,
    pub chat_history: RwSignal<Vec<ChatMessage>>,
    pub chat_draft: RwSignal<Option<ChatMessage>>,
    pub chat_typing: RwSignal<bool>,
    pub chat_online: RwSignal<bool>,
    pub notice: RwSignal<Option<Notice>>,
    /// Lines on the terminal display, fed by [`SignalSink`].
    pub terminal_lines: RwSignal<Vec<TerminalEntry>>,
}

impl Signals {
    fn new() -> Self {
        Self {
            current_view: RwSignal::new(String::new()),
            theme: RwSignal::new(String::new()),
            stats: RwSignal::new(StatsCounters::default()),
            server_stats: RwSignal::new(ServerStats::default()),
            reports: RwSignal::new(Vec::new()),
            scan_history: RwSignal::new(Vec::new()),
            last_target: RwSignal::new(String::new()),
            is_connected: RwSignal::new(false),
            is_scanning: RwSignal::new(false),
            is_loading: RwSignal::new(false),
            chat_history: RwSignal::new(Vec::new()),
            chat_draft: RwSignal::new(None),
            chat_typing: RwSignal::new(false),
            chat_online: RwSignal::new(false),
            notice: RwSignal::new(None),
            terminal_lines: RwSignal::new(Vec::new()),
        }
    }

    fn bind_all(&self, store: &Store) {
        bind(store, keys::CURRENT_VIEW, self.current_view);
        bind(store, keys::THEME, self.theme);
        bind(store, keys::STATS, self.stats);
        bind(store, keys::SERVER_STATS, self.server_stats);
        bind(store, keys::REPORTS, self.reports);
        bind(store, keys::SCAN_HISTORY, self.scan_history);
        bind(store, keys::LAST_TARGET, self.last_target);
        bind(store, keys::IS_CONNECTED, self.is_connected);
        bind(store, keys::IS_SCANNING, self.is_scanning);
        bind(store, keys::IS_LOADING, self.is_loading);
        bind(store, keys::CHAT_HISTORY, self.chat_history);
        bind(store, keys::CHAT_DRAFT, self.chat_draft);
        bind(store, keys::CHAT_TYPING, self.chat_typing);
        bind(store, keys::CHAT_ONLINE, self.chat_online);
        bind(store, keys::NOTICE, self.notice);
    }
}

/// Seed `signal` from `key` and keep it in step with every later change.
fn bind<T>(store: &Store, key: &'static str, signal: RwSignal<T>)
where
    T: DeserializeOwned + Default + Send + Sync + 'static,
{
    signal.set(store.get_as(key));
    store.subscribe_fn(key, move |new, _| {
        let value = match new {
            Value::Null => T::default(),
            other => serde_json::from_value(other.clone())
                .or_default_logged(&format!("Signal for '{key}' did not decode")),
        };
        signal.set(value);
    });
}

/// Terminal display backed by a signal, trimmed to the history cap.
#[derive(Debug, Clone, Copy)]
pub struct SignalSink {
    lines: RwSignal<Vec<TerminalEntry>>,
    cap: usize,
}

impl SignalSink {
    pub fn new(lines: RwSignal<Vec<TerminalEntry>>, cap: usize) -> Self {
        Self { lines, cap }
    }
}

impl TerminalSink for SignalSink {
    fn show(&self, entry: &TerminalEntry) {
        let cap = self.cap;
        self.lines.update(|lines| {
            lines.push(entry.clone());
            let excess = lines.len().saturating_sub(cap);
            lines.drain(..excess);
        });
    }

    fn reset(&self) {
        self.lines.set(Vec::new());
    }
}

/// Page without live resources.
#[derive(Debug, Default)]
pub struct StaticPage;

#[async_trait(?Send)]
impl View<()> for StaticPage {
    async fn mount(&self, _target: &()) -> std::result::Result<(), RouteError> {
        Ok(())
    }
}

/// Everything the console holds for the life of the page.
pub struct Console {
    pub config: Rc<ClientConfig>,
    pub store: Store,
    pub transport: TransportManager,
    pub clock: Rc<dyn Clock>,
    pub prefs: Preferences,
    pub terminal: Rc<TerminalFeed>,
    pub chat: Rc<ChatFeed>,
    pub dashboard: Rc<DashboardSession>,
    pub reports: Rc<ReportsSession>,
    pub router: Router<()>,
    pub signals: Signals,
    notice_timer: RefCell<Option<Timeout>>,
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

/// Configuration from the page: inline `#xrecon-config` TOML when present,
/// defaults otherwise, always pointed at the page origin. A rejected inline
/// document is returned next to the defaults used in its place.
pub fn page_config() -> (ClientConfig, Option<UiError>) {
    let inline = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id("xrecon-config"))
        .and_then(|el| el.text_content());
    let (config, problem) = match inline {
        Some(source) => match ClientConfig::from_toml_str(&source) {
            Ok(config) => (config, None),
            Err(e) => (ClientConfig::default(), Some(UiError::from(e))),
        },
        None => (ClientConfig::default(), None),
    };
    match location::origin() {
        Ok(origin) => (config.with_origin(origin), problem),
        Err(e) => (config, problem.or(Some(e))),
    }
}

impl Console {
    /// Build the console over browser storage, sockets and HTTP.
    pub fn new(config: ClientConfig) -> Rc<Self> {
        let config = Rc::new(config);
        let store = Store::open(Rc::new(BrowserStorage::new()), &config);
        let transport = TransportManager::new(Rc::new(WebSocketConnector), Rc::clone(&config));
        let clock: Rc<dyn Clock> = Rc::new(SystemClock);
        let signals = Signals::new();

        let sink = Rc::new(SignalSink::new(
            signals.terminal_lines,
            config.limits.terminal_history,
        ));
        let terminal = TerminalFeed::new(store.clone(), transport.clone(), Rc::clone(&clock), sink);
        let chat = ChatFeed::new(store.clone(), transport.clone());

        let backend: Rc<dyn Backend> = Rc::new(HttpBackend::new(Rc::clone(&config)));
        let dashboard =
            DashboardSession::new(store.clone(), Rc::clone(&terminal), Rc::clone(&backend));
        dashboard.refresh_on_completion(spawner());
        let reports = ReportsSession::new(store.clone(), backend);

        let router = Router::new(store.clone(), (), config.default_view.clone())
            .with_view(routes::DASHBOARD, dashboard.clone())
            .with_view(routes::SCANNER, Rc::new(StaticPage))
            .with_view(routes::REPORTS, reports.clone())
            .with_view(routes::AI, ChatSession::new(Rc::clone(&chat)))
            .with_view(routes::SETTINGS, Rc::new(StaticPage));

        signals.bind_all(&store);
        let prefs = Preferences::new(store.clone(), config.storage.clone());

        Rc::new(Self {
            config,
            store,
            transport,
            clock,
            prefs,
            terminal,
            chat,
            dashboard,
            reports,
            router,
            signals,
            notice_timer: RefCell::new(None),
        })
    }

    /// Attach the page listeners and show the route in the location hash.
    ///
    /// # Errors
    /// Returns `UiError` when a window listener cannot be attached.
    pub fn start(self: &Rc<Self>) -> Result<()> {
        self.watch_theme();
        self.watch_notices();
        self.poll_stats();

        let console = Rc::downgrade(self);
        location::on_hash_change(move |hash| {
            if let Some(console) = console.upgrade() {
                console.navigate(&hash);
            }
        })?;

        let store = self.store.clone();
        location::on_window_event("pagehide", move || {
            let _ = store
                .flush()
                .tap_err(|e| warn!(error = %e, "Failed to persist state on exit"));
        })?;

        info!(origin = %self.config.origin, "Console started");
        self.navigate(&location::current_hash());
        Ok(())
    }

    /// Navigate to the view named by `hash`, writing the view actually shown
    /// back to the location.
    pub fn navigate(self: &Rc<Self>, hash: &str) {
        let requested = route_from_hash(hash, &self.config.default_view);
        let console = Rc::clone(self);
        spawn_local(async move {
            match console.router.navigate(&requested).await {
                Ok(NavigationOutcome::Redirected { view, .. }) => location::set_route(&view),
                Ok(_) => {}
                Err(e) => {
                    error!(view = %requested, error = %e, "Navigation failed");
                    post_notice(&console.store, &e.to_string(), NoticeLevel::Error);
                }
            }
        });
    }

    /// Surface a rejected user action as an error notice.
    pub fn notify_failure<E: std::fmt::Display>(&self, result: std::result::Result<(), E>) {
        if let Err(e) = result {
            post_notice(&self.store, &e.to_string(), NoticeLevel::Error);
        }
    }

    fn watch_theme(&self) {
        let theme = self.prefs.theme();
        apply_theme(theme);
        self.store.set(keys::THEME, Value::from(theme.as_str()), false);
        self.store.subscribe_fn(keys::THEME, |new, _| {
            if let Some(name) = new.as_str() {
                apply_theme(name.parse().unwrap_or_default());
            }
        });
    }

    fn watch_notices(self: &Rc<Self>) {
        let console = Rc::downgrade(self);
        let millis = self.config.timing.notice_ms;
        self.store.subscribe_fn(keys::NOTICE, move |new, _| {
            if new.is_null() {
                return;
            }
            let Some(console) = console.upgrade() else {
                return;
            };
            let store = console.store.clone();
            let timer = Timeout::new(millis, move || {
                store.set(keys::NOTICE, Value::Null, false);
            });
            // Replacing the handle cancels the previous dismissal.
            *console.notice_timer.borrow_mut() = Some(timer);
        });
    }

    fn poll_stats(self: &Rc<Self>) {
        let console: Weak<Self> = Rc::downgrade(self);
        Interval::new(self.config.timing.stats_poll_ms, move || {
            let Some(console) = console.upgrade() else {
                return;
            };
            if console.router.active().as_deref() != Some(routes::DASHBOARD) {
                return;
            }
            spawn_local(async move {
                let _ = console.dashboard.refresh_stats().await;
            });
        })
        .forget();
    }
}

fn apply_theme(theme: Theme) {
    let Some(body) = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.body())
    else {
        return;
    };
    body.set_class_name(theme.body_class().unwrap_or_default());
}
