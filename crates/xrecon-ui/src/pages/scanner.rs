//! Scanner page component
//!
//! Picks a target and modules, stages the job under `pendingScan` and hands
//! over to the dashboard, which launches it once its terminal is open.

use leptos::ev::SubmitEvent;
use leptos::prelude::*;
use tracing::info;
use xrecon_core::feeds::post_notice;
use xrecon_core::feeds::terminal::stage_pending_scan;
use xrecon_core::models::ScanStatus;
use xrecon_core::{NoticeLevel, routes};

use super::format_millis;
use crate::browser::location;
use crate::state::ConsoleHandle;

/// A selectable scan module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanModule {
    /// Identifier sent to the scanner.
    pub id: &'static str,
    pub label: &'static str,
    pub default_on: bool,
}

pub const MODULES: [ScanModule; 8] = [
    ScanModule { id: "port_scanner.py", label: "Port Scanner", default_on: true },
    ScanModule { id: "service_detector.py", label: "Service Detection", default_on: true },
    ScanModule { id: "subdomain_scanner.py", label: "Subdomain Enumeration", default_on: false },
    ScanModule { id: "dir_bruteforcer.py", label: "Directory Bruteforce", default_on: false },
    ScanModule { id: "email_harvester.py", label: "Email Harvester", default_on: false },
    ScanModule { id: "cve_lookup.py", label: "CVE Lookup", default_on: false },
    ScanModule { id: "dns_scanner.py", label: "DNS Scanner", default_on: false },
    ScanModule { id: "nmap_scanner.py", label: "Nmap Scan", default_on: false },
];

/// Module ids checked when the page opens.
pub fn default_selection() -> Vec<&'static str> {
    MODULES.iter().filter(|m| m.default_on).map(|m| m.id).collect()
}

/// `selected` in display order, whatever order the boxes were ticked in.
pub fn ordered_selection(selected: &[&str]) -> Vec<&'static str> {
    MODULES
        .iter()
        .map(|m| m.id)
        .filter(|id| selected.contains(id))
        .collect()
}

const fn status_label(status: ScanStatus) -> &'static str {
    match status {
        ScanStatus::Running => "Running",
        ScanStatus::Completed => "Completed",
        ScanStatus::Stopped => "Stopped",
    }
}

/// Scanner page component
#[component]
pub fn Scanner(console: ConsoleHandle) -> impl IntoView {
    let signals = console.with_value(|c| c.signals);
    let target = RwSignal::new(signals.last_target.get_untracked());
    let selected = RwSignal::new(default_selection());

    let on_submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        let target_text = target.get_untracked();
        let modules = selected.with_untracked(|s| ordered_selection(s));
        console.with_value(|c| {
            match stage_pending_scan(&c.store, c.clock.as_ref(), &target_text, &modules) {
                Ok(pending) => {
                    info!(scan_target = %pending.target, modules = pending.modules.len(), "Scan staged");
                    location::set_route(routes::DASHBOARD);
                }
                Err(e) => post_notice(&c.store, &e.to_string(), NoticeLevel::Error),
            }
        });
    };

    view! {
        <div class="scanner-page">
            <form class="scan-form" on:submit=on_submit>
                <label class="form-field">
                    <span>"Target"</span>
                    <input
                        type="text"
                        placeholder="example.com or 192.168.1.1"
                        on:input=move |ev| target.set(event_target_value(&ev))
                        prop:value=move || target.get()
                    />
                </label>
                <fieldset class="module-grid">
                    <legend>"Modules"</legend>
                    {MODULES
                        .into_iter()
                        .map(|module| {
                            view! {
                                <label class="module-option">
                                    <input
                                        type="checkbox"
                                        prop:checked=move || selected.with(|s| s.contains(&module.id))
                                        on:change=move |ev| {
                                            let on = event_target_checked(&ev);
                                            selected.update(|s| {
                                                s.retain(|id| *id != module.id);
                                                if on {
                                                    s.push(module.id);
                                                }
                                            });
                                        }
                                    />
                                    <span>{module.label}</span>
                                </label>
                            }
                        })
                        .collect_view()}
                </fieldset>
                <button type="submit" class="btn-primary">"Launch Scan"</button>
            </form>

            <section class="scan-history">
                <h2>"Scan History"</h2>
                <Show
                    when=move || signals.scan_history.with(|h| !h.is_empty())
                    fallback=|| view! { <p class="empty">"No scans yet"</p> }
                >
                    <ul>
                        {move || {
                            signals
                                .scan_history
                                .get()
                                .into_iter()
                                .rev()
                                .map(|record| {
                                    view! {
                                        <li class="scan-record">
                                            <span class="scan-target">{record.target}</span>
                                            <span class="scan-modules">{record.modules.join(", ")}</span>
                                            <span class="scan-status">{status_label(record.status)}</span>
                                            <span class="scan-time">{format_millis(record.timestamp)}</span>
                                        </li>
                                    }
                                })
                                .collect_view()
                        }}
                    </ul>
                </Show>
            </section>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanner_component_exists() {
        let _component = Scanner;
    }

    #[test]
    fn test_default_selection() {
        assert_eq!(default_selection(), vec!["port_scanner.py", "service_detector.py"]);
    }

    #[test]
    fn test_selection_follows_display_order() {
        let picked = ordered_selection(&["nmap_scanner.py", "port_scanner.py", "not_a_module.py"]);
        assert_eq!(picked, vec!["port_scanner.py", "nmap_scanner.py"]);
    }
}
