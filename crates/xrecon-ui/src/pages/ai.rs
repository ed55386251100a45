//! AI assistant page component
//!
//! Streamed answers are rendered from the full draft on every fragment, so
//! markup split across frames is never shown half-formatted.

use leptos::ev::SubmitEvent;
use leptos::html::Div;
use leptos::prelude::*;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::HtmlAnchorElement;
use xrecon_core::feeds::format::format_reply;
use xrecon_core::feeds::post_notice;
use xrecon_core::models::Sender;
use xrecon_core::{ChatMessage, NoticeLevel};

use crate::error::{Result, UiError};
use crate::state::ConsoleHandle;

/// Download name for a transcript exported at `millis`.
pub fn export_filename(millis: u64) -> String {
    format!("xrecon-chat-{millis}.txt")
}

/// Offer `text` as a plain-text download.
fn download(text: &str, filename: &str) -> Result<()> {
    let document = window().document().ok_or(UiError::NoDocument)?;
    let anchor = document
        .create_element("a")?
        .dyn_into::<HtmlAnchorElement>()
        .map_err(|_| UiError::Js("created element is not an anchor".to_string()))?;
    let encoded: String = js_sys::encode_uri_component(text).into();
    anchor.set_href(&format!("data:text/plain;charset=utf-8,{encoded}"));
    anchor.set_download(filename);
    anchor.click();
    Ok(())
}

fn now_label() -> String {
    js_sys::Date::new_0()
        .to_locale_string("en-US", &JsValue::UNDEFINED)
        .into()
}

#[component]
fn Message(message: ChatMessage) -> impl IntoView {
    match message.sender {
        Sender::User => view! {
            <div class="chat-message user">
                <span class="chat-author">"You"</span>
                <div class="chat-text">{message.text}</div>
            </div>
        }
        .into_any(),
        Sender::Assistant => view! {
            <div class="chat-message assistant">
                <span class="chat-author">"X-AI"</span>
                <div class="chat-text" inner_html=format_reply(&message.text)></div>
            </div>
        }
        .into_any(),
    }
}

/// AI assistant page component
#[component]
pub fn AiChat(console: ConsoleHandle) -> impl IntoView {
    let signals = console.with_value(|c| c.signals);
    let question = RwSignal::new(String::new());
    let log_ref = NodeRef::<Div>::new();

    Effect::new(move |_| {
        signals.chat_history.track();
        signals.chat_draft.track();
        if let Some(el) = log_ref.get() {
            el.set_scroll_top(el.scroll_height());
        }
    });

    let on_submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        let text = question.get_untracked();
        console.with_value(|c| {
            let result = c.chat.send(&text);
            if result.is_ok() {
                question.set(String::new());
            }
            c.notify_failure(result);
        });
    };

    let export = move |_| {
        console.with_value(|c| {
            let Some(transcript) = c.chat.export_transcript(&now_label()) else {
                post_notice(&c.store, "No messages to export", NoticeLevel::Info);
                return;
            };
            // Whole milliseconds since the epoch fit in a u64.
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let filename = export_filename(js_sys::Date::now() as u64);
            if let Err(e) = download(&transcript, &filename) {
                tracing::warn!(error = %e, "Transcript download failed");
                post_notice(&c.store, "Export failed", NoticeLevel::Error);
            }
        });
    };

    view! {
        <div class="ai-page">
            <header class="ai-header">
                <h1>"X-AI Assistant"</h1>
                <span class="ai-status" class:online=move || signals.chat_online.get()>
                    {move || if signals.chat_online.get() { "Online" } else { "Offline" }}
                </span>
                <button class="btn-secondary" on:click=export>"Export"</button>
                <button class="btn-secondary" on:click=move |_| console.with_value(|c| c.chat.clear())>
                    "Clear"
                </button>
            </header>

            <div class="chat-log" node_ref=log_ref>
                {move || {
                    signals
                        .chat_history
                        .get()
                        .into_iter()
                        .map(|message| view! { <Message message=message /> })
                        .collect_view()
                }}
                {move || signals.chat_draft.get().map(|draft| view! { <Message message=draft /> })}
                <Show when=move || signals.chat_typing.get() && signals.chat_draft.with(Option::is_none)>
                    <div class="typing-indicator">"X-AI is thinking..."</div>
                </Show>
            </div>

            <form class="chat-input" on:submit=on_submit>
                <input
                    type="text"
                    placeholder="Ask about targets, findings or tooling..."
                    on:input=move |ev| question.set(event_target_value(&ev))
                    prop:value=move || question.get()
                />
                <button type="submit" class="btn-primary" disabled=move || !signals.chat_online.get()>
                    "Send"
                </button>
            </form>
        </div>
    }
}
