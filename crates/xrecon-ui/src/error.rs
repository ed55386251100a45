//! Error types for the browser shell
//!
//! Browser APIs report failures as `JsValue`s; they are flattened to strings
//! here so the errors stay `Clone + PartialEq` like the core's.

use thiserror::Error;
use wasm_bindgen::JsValue;
use xrecon_core::ConfigError;

/// Errors raised while wiring the console into the page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UiError {
    #[error("browser window is not available")]
    NoWindow,

    #[error("page document is not available")]
    NoDocument,

    #[error("failed to register listener: {0}")]
    Listener(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Js(String),
}

/// Result type alias for shell operations
pub type Result<T> = std::result::Result<T, UiError>;

/// Best-effort description of a thrown JS value.
pub fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

impl From<JsValue> for UiError {
    fn from(value: JsValue) -> Self {
        Self::Js(describe(&value))
    }
}
