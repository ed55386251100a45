//! Hash-based navigation surface (`#dashboard`, `#ai`, ...).

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;

use crate::error::{Result, UiError, describe};

/// Current `location.hash`, empty when there is none.
pub fn current_hash() -> String {
    web_sys::window()
        .and_then(|w| w.location().hash().ok())
        .unwrap_or_default()
}

/// Page origin such as `http://127.0.0.1:8000`.
///
/// # Errors
/// Returns `UiError::NoWindow` outside a browser page.
pub fn origin() -> Result<String> {
    let window = web_sys::window().ok_or(UiError::NoWindow)?;
    window.location().origin().map_err(UiError::from)
}

/// Point the location at `view`. The browser fires `hashchange` when the
/// value differs from the current one.
pub fn set_route(view: &str) {
    let Some(window) = web_sys::window() else {
        return;
    };
    if let Err(e) = window.location().set_hash(view) {
        tracing::warn!(view, error = %describe(&e), "Failed to update location hash");
    }
}

/// Call `on_change` with the new hash on every `hashchange` for the life of
/// the page.
///
/// # Errors
/// Returns `UiError::Listener` when the listener cannot be attached.
pub fn on_hash_change(on_change: impl Fn(String) + 'static) -> Result<()> {
    on_window_event("hashchange", move || on_change(current_hash()))
}

/// Run `handler` on every `event` dispatched to the window for the life of
/// the page.
///
/// # Errors
/// Returns `UiError::Listener` when the listener cannot be attached.
pub fn on_window_event(event: &str, handler: impl Fn() + 'static) -> Result<()> {
    let window = web_sys::window().ok_or(UiError::NoWindow)?;
    let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut()>);
    window
        .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
        .map_err(|e| UiError::Listener(format!("{event}: {}", describe(&e))))?;

    // Lives as long as the page.
    closure.forget();
    Ok(())
}
