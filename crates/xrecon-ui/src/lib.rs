//! Leptos 0.7 CSR console for the X-Recon scanner
//!
//! The page shell over `xrecon-core`: browser implementations of the core's
//! storage, socket and HTTP seams, a store-to-signal bridge, and one
//! component per view.
//!
//! ## Module Structure
//! - `app`: Root component, navigation and notices
//! - `browser`: `localStorage`, WebSocket, HTTP and location hash
//! - `pages`: One component per routed view
//! - `state`: Console wiring and reactive mirrors of the store
//! - `logging`: Tracing output to the browser console
//! - `error`: Error types and handling

#![forbid(unsafe_code)]

pub mod app;
pub mod browser;
pub mod error;
pub mod logging;
pub mod pages;
pub mod state;

// Re-export main App component for convenience - Trunk will auto-mount it
pub use app::App;
