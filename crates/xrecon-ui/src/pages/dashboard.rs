//! Dashboard page component
//!
//! Server stats, the live terminal and its command line.

use leptos::ev::SubmitEvent;
use leptos::html::Div;
use leptos::prelude::*;

use crate::state::ConsoleHandle;

/// Dashboard page component
#[component]
pub fn Dashboard(console: ConsoleHandle) -> impl IntoView {
    let signals = console.with_value(|c| c.signals);
    let command = RwSignal::new(String::new());
    let terminal_ref = NodeRef::<Div>::new();

    // Keep the newest line in view.
    Effect::new(move |_| {
        signals.terminal_lines.track();
        if let Some(el) = terminal_ref.get() {
            el.set_scroll_top(el.scroll_height());
        }
    });

    let on_submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        let text = command.get_untracked();
        console.with_value(|c| {
            let result = c.terminal.send_command(&text);
            if result.is_ok() {
                command.set(String::new());
            }
            c.notify_failure(result);
        });
    };

    view! {
        <div class="dashboard-page">
            <section class="stats-grid">
                <StatCard
                    label="Total Scans"
                    value=Signal::derive(move || signals.server_stats.get().total_scans.to_string())
                />
                <StatCard
                    label="Targets"
                    value=Signal::derive(move || signals.server_stats.get().targets.to_string())
                />
                <StatCard
                    label="Vulnerabilities"
                    value=Signal::derive(move || signals.server_stats.get().vulns.to_string())
                />
                <StatCard
                    label="AI Requests"
                    value=Signal::derive(move || signals.server_stats.get().ai_requests.to_string())
                />
            </section>

            <section class="session-counters">
                {move || {
                    let stats = signals.stats.get();
                    format!(
                        "This console: {} scans, {} targets, {} AI requests",
                        stats.total_scans,
                        stats.targets,
                        stats.ai_requests,
                    )
                }}
            </section>

            <section class="terminal">
                <header class="terminal-header">
                    <span class="terminal-title">"root@x-recon:~#"</span>
                    <span class="scan-state" class:running=move || signals.is_scanning.get()>
                        {move || if signals.is_scanning.get() { "Scanning" } else { "Idle" }}
                    </span>
                    <button
                        class="btn-danger"
                        disabled=move || !signals.is_scanning.get()
                        on:click=move |_| console.with_value(|c| c.notify_failure(c.terminal.stop_scan()))
                    >
                        "Stop"
                    </button>
                    <button class="btn-secondary" on:click=move |_| console.with_value(|c| c.terminal.clear())>
                        "Clear"
                    </button>
                </header>
                <div class="terminal-output" node_ref=terminal_ref>
                    {move || {
                        signals
                            .terminal_lines
                            .get()
                            .into_iter()
                            .map(|entry| {
                                view! {
                                    <div class=entry.kind.css_class()>
                                        <span class="terminal-time">{entry.timestamp}</span>
                                        <span class="terminal-prefix">{entry.prefix}</span>
                                        <span class="terminal-message">{entry.message}</span>
                                    </div>
                                }
                            })
                            .collect_view()
                    }}
                </div>
                <form class="terminal-input" on:submit=on_submit>
                    <span class="terminal-prompt">"$"</span>
                    <input
                        type="text"
                        placeholder="Enter command..."
                        on:input=move |ev| command.set(event_target_value(&ev))
                        prop:value=move || command.get()
                    />
                </form>
            </section>
        </div>
    }
}

/// Single headline number.
#[component]
fn StatCard(label: &'static str, value: Signal<String>) -> impl IntoView {
    view! {
        <div class="stat-card">
            <span class="stat-value">{move || value.get()}</span>
            <span class="stat-label">{label}</span>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_component_exists() {
        let _component = Dashboard;
    }
}
