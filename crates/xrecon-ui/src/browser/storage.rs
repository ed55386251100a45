//! `localStorage` backend for the store.

use wasm_bindgen::JsCast;
use xrecon_core::{PersistenceError, StorageBackend};

use crate::error::describe;

/// Storage over `window.localStorage`. Every call fails with
/// `PersistenceError::Unavailable` when the page has no local storage
/// (private mode, sandboxed frames).
#[derive(Debug, Clone)]
pub struct BrowserStorage {
    storage: Option<web_sys::Storage>,
}

impl BrowserStorage {
    pub fn new() -> Self {
        let storage = web_sys::window().and_then(|w| w.local_storage().ok().flatten());
        if storage.is_none() {
            tracing::warn!("localStorage unavailable, state will not survive a reload");
        }
        Self { storage }
    }

    fn storage(&self) -> Result<&web_sys::Storage, PersistenceError> {
        self.storage.as_ref().ok_or(PersistenceError::Unavailable)
    }
}

impl Default for BrowserStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for BrowserStorage {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.storage()?
            .get_item(key)
            .map_err(|e| PersistenceError::Backend(describe(&e)))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.storage()?.set_item(key, value).map_err(|e| {
            let quota = e
                .dyn_ref::<js_sys::Error>()
                .is_some_and(|err| String::from(err.name()) == "QuotaExceededError");
            if quota {
                PersistenceError::QuotaExceeded {
                    key: key.to_string(),
                }
            } else {
                PersistenceError::Backend(describe(&e))
            }
        })
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.storage()?
            .remove_item(key)
            .map_err(|e| PersistenceError::Backend(describe(&e)))
    }
}
