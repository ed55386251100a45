//! Reports page component

use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;
use xrecon_core::ReportsSession;
use xrecon_core::backend::{filter_reports, report_file_url, report_icon};

use crate::state::ConsoleHandle;

/// Run `job` against the reports session off the event handler.
fn with_reports<F, Fut>(console: ConsoleHandle, job: F)
where
    F: FnOnce(Rc<ReportsSession>) -> Fut,
    Fut: std::future::Future<Output = ()> + 'static,
{
    let session = console.with_value(|c| Rc::clone(&c.reports));
    spawn_local(job(session));
}

fn confirmed(question: &str) -> bool {
    window().confirm_with_message(question).unwrap_or(false)
}

/// Reports page component
///
/// The list is loaded when the view is mounted; this page only filters and
/// deletes.
#[component]
pub fn Reports(console: ConsoleHandle) -> impl IntoView {
    let signals = console.with_value(|c| c.signals);
    let search = RwSignal::new(String::new());

    let refresh = move |_| {
        with_reports(console, |session| async move {
            let _ = session.load().await;
        });
    };
    let delete_all = move |_| {
        if signals.reports.with_untracked(Vec::is_empty) || !confirmed("Delete all reports?") {
            return;
        }
        with_reports(console, |session| async move {
            let _ = session.delete_all().await;
        });
    };

    view! {
        <div class="reports-page">
            <header class="reports-header">
                <h1>"Reports"</h1>
                <input
                    type="search"
                    placeholder="Filter reports..."
                    on:input=move |ev| search.set(event_target_value(&ev))
                    prop:value=move || search.get()
                />
                <button class="btn-secondary" on:click=refresh disabled=move || signals.is_loading.get()>
                    "Refresh"
                </button>
                <button class="btn-danger" on:click=delete_all>"Delete All"</button>
            </header>

            <Show when=move || signals.is_loading.get()>
                <p class="loading">"Loading reports..."</p>
            </Show>

            <ul class="report-list">
                {move || {
                    let reports = signals.reports.get();
                    let term = search.get();
                    let visible = filter_reports(&reports, &term);
                    if visible.is_empty() {
                        return view! { <li class="empty">"No reports found"</li> }.into_any();
                    }
                    visible
                        .into_iter()
                        .map(|report| {
                            let href = console
                                .with_value(|c| report_file_url(&c.config, &report.filename))
                                .map(String::from)
                                .unwrap_or_default();
                            let name = report.filename.clone();
                            view! {
                                <li class="report-item">
                                    <span class="report-icon">{report_icon(&report.filename)}</span>
                                    <a class="report-name" href=href target="_blank">{report.filename.clone()}</a>
                                    <span class="report-size">{report.size.to_string()}</span>
                                    <span class="report-created">{report.created.clone()}</span>
                                    <button
                                        class="btn-danger btn-small"
                                        on:click=move |_| {
                                            if !confirmed(&format!("Delete {name}?")) {
                                                return;
                                            }
                                            let name = name.clone();
                                            with_reports(console, |session| async move {
                                                let _ = session.delete(&name).await;
                                            });
                                        }
                                    >
                                        "Delete"
                                    </button>
                                </li>
                            }
                        })
                        .collect_view()
                        .into_any()
                }}
            </ul>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_component_exists() {
        let _component = Reports;
    }
}
