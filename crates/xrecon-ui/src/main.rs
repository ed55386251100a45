//! WASM entry point for the X-Recon console
//!
//! Trunk compiles this to WASM; it mounts the App component to the body.

use leptos::prelude::*;
use xrecon_ui::App;

fn main() {
    // Set up panic hook for better error messages in browser console
    console_error_panic_hook::set_once();

    mount_to_body(|| {
        view! {
            <App />
        }
    })
}
