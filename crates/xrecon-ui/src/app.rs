//! Root component
//!
//! Builds the console from the page configuration, then renders the shell:
//! navigation, connection status, the active view and the notice toast.

use leptos::prelude::*;
use tracing::{error, warn};
use xrecon_core::{Notice, NoticeLevel, routes};

use crate::logging;
use crate::pages::{AiChat, Dashboard, Reports, Scanner, Settings};
use crate::state::{Console, ConsoleHandle, page_config};

/// Main application component
///
/// Owns the console for the life of the page. Views are selected by the
/// `currentView` store key, which the router writes after each navigation.
#[component]
pub fn App() -> impl IntoView {
    let (config, problem) = page_config();
    logging::init(&config.log_filter);
    if let Some(e) = problem {
        warn!(error = %e, "Falling back to default configuration");
    }

    let console = Console::new(config);
    if let Err(e) = console.start() {
        error!(error = %e, "Console failed to attach page listeners");
    }
    let signals = console.signals;
    let console: ConsoleHandle = StoredValue::new_local(console);

    view! {
        <div class="app-container">
            <header class="app-header">
                <h1>"X-RECON"</h1>
                <nav class="app-nav">
                    {routes::ALL
                        .into_iter()
                        .map(|route| {
                            view! {
                                <a
                                    href=format!("#{route}")
                                    class:active=move || signals.current_view.get() == route
                                >
                                    {nav_label(route)}
                                </a>
                            }
                        })
                        .collect_view()}
                </nav>
                <div class="connection-status" class:online=move || signals.is_connected.get()>
                    {move || if signals.is_connected.get() { "Connected" } else { "Disconnected" }}
                </div>
            </header>
            <main class="app-main">
                {move || match signals.current_view.get().as_str() {
                    routes::SCANNER => view! { <Scanner console=console /> }.into_any(),
                    routes::REPORTS => view! { <Reports console=console /> }.into_any(),
                    routes::AI => view! { <AiChat console=console /> }.into_any(),
                    routes::SETTINGS => view! { <Settings console=console /> }.into_any(),
                    _ => view! { <Dashboard console=console /> }.into_any(),
                }}
            </main>
            <NoticeToast notice=signals.notice />
            <footer class="app-footer">
                <p>"X-Recon Reconnaissance Console - Leptos 0.7 CSR"</p>
            </footer>
        </div>
    }
}

fn nav_label(route: &str) -> &'static str {
    match route {
        routes::SCANNER => "Scanner",
        routes::REPORTS => "Reports",
        routes::AI => "AI Assistant",
        routes::SETTINGS => "Settings",
        _ => "Dashboard",
    }
}

const fn notice_class(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "notice notice-info",
        NoticeLevel::Success => "notice notice-success",
        NoticeLevel::Error => "notice notice-error",
    }
}

/// The current notice, if any. Dismissal is timed by the console.
#[component]
fn NoticeToast(notice: RwSignal<Option<Notice>>) -> impl IntoView {
    move || {
        notice.get().map(|notice| {
            view! {
                <div class=notice_class(notice.level) role="status">
                    {notice.message}
                </div>
            }
        })
    }
}
