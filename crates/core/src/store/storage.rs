//! Durable key/value storage seam.
//!
//! The browser shell implements this over `localStorage`; the in-memory
//! implementation backs tests and headless use.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::PersistenceError;

/// String key/value storage with whole-value writes.
pub trait StorageBackend {
    /// Read a value. `Ok(None)` means the key is absent.
    ///
    /// # Errors
    /// Returns `PersistenceError` when the backend cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    /// Returns `PersistenceError::QuotaExceeded` when the backend is full.
    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    /// Remove a value. Removing an absent key succeeds.
    ///
    /// # Errors
    /// Returns `PersistenceError` when the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    entries: RefCell<HashMap<String, String>>,
    quota: Cell<Option<usize>>,
    writes: Cell<usize>,
}

/// Shared in-memory storage. Clones see the same entries, so a test can
/// build a second store over a clone to simulate a reload.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Rc<MemoryInner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects writes once the total stored bytes would exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        let storage = Self::default();
        storage.inner.quota.set(Some(bytes));
        storage
    }

    pub fn set_quota(&self, bytes: Option<usize>) {
        self.inner.quota.set(bytes);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.inner.writes.get()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.entries.borrow().get(key).cloned()
    }

    /// Insert a value directly, bypassing the quota.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.entries.borrow_mut().insert(key.into(), value.into());
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.get(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut entries = self.inner.entries.borrow_mut();
        if let Some(quota) = self.inner.quota.get() {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len().saturating_add(v.len()))
                .sum();
            if others.saturating_add(key.len()).saturating_add(value.len()) > quota {
                return Err(PersistenceError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        self.inner.writes.set(self.inner.writes.get().saturating_add(1));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.inner.entries.borrow_mut().remove(key);
        Ok(())
    }
}
