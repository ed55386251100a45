//! Settings page component

use leptos::ev::Event;
use leptos::prelude::*;
use xrecon_core::{AiModel, Theme};

use crate::state::ConsoleHandle;

/// Settings page component
#[component]
pub fn Settings(console: ConsoleHandle) -> impl IntoView {
    let signals = console.with_value(|c| c.signals);
    let model = RwSignal::new(console.with_value(|c| c.prefs.model()));

    let on_theme = move |ev: Event| {
        let Ok(theme) = event_target_value(&ev).parse::<Theme>() else {
            return;
        };
        console.with_value(|c| c.notify_failure(c.prefs.set_theme(theme)));
    };
    let on_model = move |ev: Event| {
        let Ok(choice) = event_target_value(&ev).parse::<AiModel>() else {
            return;
        };
        model.set(choice);
        console.with_value(|c| c.notify_failure(c.prefs.set_model(choice)));
    };

    view! {
        <div class="settings-page">
            <h1>"Settings"</h1>
            <section class="settings-group">
                <label class="form-field">
                    <span>"Theme"</span>
                    <select on:change=on_theme prop:value=move || signals.theme.get()>
                        {Theme::ALL
                            .into_iter()
                            .map(|theme| view! { <option value=theme.as_str()>{theme.as_str()}</option> })
                            .collect_view()}
                    </select>
                </label>
                <label class="form-field">
                    <span>"AI Model"</span>
                    <select on:change=on_model prop:value=move || model.get().as_str()>
                        {AiModel::ALL
                            .into_iter()
                            .map(|m| view! { <option value=m.as_str()>{m.label()}</option> })
                            .collect_view()}
                    </select>
                </label>
            </section>
            <section class="settings-group">
                <button class="btn-secondary" on:click=move |_| console.with_value(|c| c.terminal.clear())>
                    "Clear Terminal History"
                </button>
                <button class="btn-secondary" on:click=move |_| console.with_value(|c| c.chat.clear())>
                    "Clear Chat History"
                </button>
            </section>
        </div>
    }
}
