//! Reactive key/value store with size-bounded durable persistence.
//!
//! The store is the single source of truth for console state. It is a cheap
//! `Rc` handle: every consumer gets a clone of the same instance, and every
//! mutation runs on the one UI thread.
//!
//! # Notification contract
//! - Observers of a key are called synchronously, in subscription order, with
//!   `(new, old)`. An absent old value is `Value::Null`.
//! - The observer list is snapshotted when a notification starts: observers
//!   added during the round are first called on the next mutation, observers
//!   removed during the round are skipped immediately.
//! - An observer may call `set` on the key it observes. The nested
//!   notification runs to completion before the outer round continues, so
//!   observers later in the outer round see the outer (older) value as their
//!   `new` argument. Unbounded self-triggering is the caller's bug.
//!
//! # Persistence contract
//! Writes are whole-snapshot and best effort: a failed write is logged and the
//! in-memory mutation stands.

pub mod keys;
pub mod storage;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::PersistenceError;
use crate::prefs::Theme;
use crate::result::ResultExt;

pub use storage::{MemoryStorage, StorageBackend};

/// Callback invoked with `(new, old)` on every change of a key.
pub type Observer = Rc<dyn Fn(&Value, &Value)>;

struct Registration {
    id: u64,
    callback: Observer,
    active: Cell<bool>,
}

#[derive(Default)]
struct StoreInner {
    values: HashMap<String, Value>,
    observers: HashMap<String, Vec<Rc<Registration>>>,
    next_id: u64,
    batch_depth: usize,
    dirty: bool,
}

/// Handle removing one observer registration.
///
/// Dropping the handle keeps the observer registered; call `unsubscribe` to
/// remove it. Unsubscribing twice is harmless.
#[derive(Debug, Clone)]
pub struct Subscription {
    store: Weak<RefCell<StoreInner>>,
    key: String,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        let Some(inner) = self.store.upgrade() else {
            return;
        };
        let mut inner = inner.borrow_mut();
        if let Some(list) = inner.observers.get_mut(&self.key) {
            list.retain(|reg| {
                if reg.id == self.id {
                    reg.active.set(false);
                    false
                } else {
                    true
                }
            });
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// The console state store.
#[derive(Clone)]
pub struct Store {
    inner: Rc<RefCell<StoreInner>>,
    storage: Rc<dyn StorageBackend>,
    snapshot_key: Rc<str>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("snapshot_key", &self.snapshot_key)
            .field("keys", &self.inner.borrow().values.len())
            .finish()
    }
}

impl Store {
    /// Build a store and load the durable subset from `storage`.
    ///
    /// A missing or unreadable snapshot is not an error: the store starts
    /// from defaults and logs a warning.
    pub fn open(storage: Rc<dyn StorageBackend>, config: &ClientConfig) -> Self {
        let theme = Theme::load(storage.as_ref(), &config.storage.theme_key);
        let mut values: HashMap<String, Value> =
            keys::defaults(theme.as_str(), &config.default_view)
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();

        let saved = load_snapshot(storage.as_ref(), &config.storage.snapshot_key);
        debug!(
            keys = ?saved.keys().collect::<Vec<_>>(),
            "Loaded persisted state"
        );
        for (key, value) in saved {
            if keys::is_durable(&key) {
                values.insert(key, value);
            }
        }

        Self {
            inner: Rc::new(RefCell::new(StoreInner {
                values,
                ..StoreInner::default()
            })),
            storage,
            snapshot_key: Rc::from(config.storage.snapshot_key.as_str()),
        }
    }

    /// Store over fresh in-memory storage with the default configuration.
    pub fn in_memory() -> Self {
        Self::open(Rc::new(MemoryStorage::new()), &ClientConfig::default())
    }

    pub fn storage(&self) -> Rc<dyn StorageBackend> {
        Rc::clone(&self.storage)
    }

    /// Current value of `key`, if any.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.borrow().values.get(key).cloned()
    }

    /// Decode the value of `key`, falling back to `T::default()` when it is
    /// absent or does not decode.
    pub fn get_as<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.get(key) {
            None | Some(Value::Null) => T::default(),
            Some(value) => serde_json::from_value(value)
                .or_default_logged(&format!("Stored value for '{key}' did not decode")),
        }
    }

    /// Decode the value of `key` when it is present and not null.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => serde_json::from_value(value)
                .into_option_logged(&format!("Stored value for '{key}' did not decode")),
        }
    }

    /// Replace the value of `key` and notify its observers.
    ///
    /// When `persist` is true and `key` is durable, the durable snapshot is
    /// written before observers run.
    pub fn set(&self, key: &str, value: Value, persist: bool) {
        let old = self
            .inner
            .borrow_mut()
            .values
            .insert(key.to_string(), value.clone())
            .unwrap_or(Value::Null);

        if persist && keys::is_durable(key) {
            self.persist();
        }
        self.notify(key, &value, &old);
    }

    /// Serialize `value` and `set` it.
    ///
    /// # Errors
    /// Returns `PersistenceError::Serialization` if `value` does not serialize;
    /// the store is left unchanged in that case.
    pub fn set_as<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        persist: bool,
    ) -> Result<(), PersistenceError> {
        let value =
            serde_json::to_value(value).map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        self.set(key, value, persist);
        Ok(())
    }

    /// Register `callback` for changes of `key`.
    ///
    /// Observers form a set: registering the same `Rc` again is a no-op and
    /// returns a handle to the existing registration, so one `unsubscribe`
    /// removes it.
    pub fn subscribe(&self, key: &str, callback: Observer) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let existing = inner
            .observers
            .get(key)
            .and_then(|list| list.iter().find(|reg| Rc::ptr_eq(&reg.callback, &callback)))
            .map(|reg| reg.id);

        let id = match existing {
            Some(id) => id,
            None => {
                let id = inner.next_id;
                inner.next_id = inner.next_id.saturating_add(1);
                inner
                    .observers
                    .entry(key.to_string())
                    .or_default()
                    .push(Rc::new(Registration {
                        id,
                        callback,
                        active: Cell::new(true),
                    }));
                id
            }
        };

        Subscription {
            store: Rc::downgrade(&self.inner),
            key: key.to_string(),
            id,
        }
    }

    /// Register a fresh closure for changes of `key`.
    pub fn subscribe_fn(&self, key: &str, callback: impl Fn(&Value, &Value) + 'static) -> Subscription {
        self.subscribe(key, Rc::new(callback))
    }

    /// Number of live registrations for `key`.
    pub fn observer_count(&self, key: &str) -> usize {
        self.inner
            .borrow()
            .observers
            .get(key)
            .map_or(0, Vec::len)
    }

    /// Append `entry` to the sequence under `key`, evicting from the front
    /// until at most `cap` entries remain, then `set` with persistence.
    ///
    /// A non-array value under `key` is treated as empty.
    pub fn append_bounded(&self, key: &str, entry: Value, cap: usize) {
        let mut items = match self.get(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        items.push(entry);
        if items.len() > cap {
            let excess = items.len().saturating_sub(cap);
            items.drain(..excess);
        }
        self.set(key, Value::Array(items), true);
    }

    /// Serialize `entry` and `append_bounded` it.
    ///
    /// # Errors
    /// Returns `PersistenceError::Serialization` if `entry` does not serialize.
    pub fn push_bounded<T: Serialize>(
        &self,
        key: &str,
        entry: &T,
        cap: usize,
    ) -> Result<(), PersistenceError> {
        let entry =
            serde_json::to_value(entry).map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        self.append_bounded(key, entry, cap);
        Ok(())
    }

    /// Increment the numeric `field` of the object under `key` by one.
    ///
    /// Observers of `key` receive the whole updated object. Returns false and
    /// changes nothing when the field is missing or not a number.
    pub fn increment_counter(&self, key: &str, field: &str) -> bool {
        let change = {
            let mut inner = self.inner.borrow_mut();
            let Some(Value::Object(object)) = inner.values.get_mut(key) else {
                return false;
            };
            let old = Value::Object(object.clone());
            let Some(slot) = object.get_mut(field) else {
                return false;
            };
            let Some(next) = incremented(slot) else {
                return false;
            };
            *slot = next;
            (Value::Object(object.clone()), old)
        };

        let (new, old) = change;
        if keys::is_durable(key) {
            self.persist();
        }
        self.notify(key, &new, &old);
        true
    }

    /// Write `value` at a dotted path such as `stats.vulns`, creating
    /// intermediate objects as needed.
    ///
    /// Observers of the root key receive the whole updated root value.
    pub fn set_path(&self, path: &str, value: Value) {
        let mut segments = path.split('.').filter(|s| !s.is_empty());
        let Some(root) = segments.next() else {
            return;
        };
        let rest: Vec<&str> = segments.collect();
        if rest.is_empty() {
            self.set(root, value, true);
            return;
        }

        let old = self.get(root).unwrap_or(Value::Null);
        let mut new = old.clone();
        let mut cursor = &mut new;
        for segment in &rest {
            if !cursor.is_object() {
                *cursor = Value::Object(Map::new());
            }
            let Some(object) = cursor.as_object_mut() else {
                return;
            };
            cursor = object.entry((*segment).to_string()).or_insert(Value::Null);
        }
        *cursor = value;

        self.inner
            .borrow_mut()
            .values
            .insert(root.to_string(), new.clone());
        if keys::is_durable(root) {
            self.persist();
        }
        self.notify(root, &new, &old);
    }

    pub fn clear_terminal_history(&self) {
        self.set(keys::TERMINAL_HISTORY, Value::Array(Vec::new()), true);
    }

    /// Run `f` with durable writes deferred; at most one snapshot is written
    /// when the outermost batch ends. Notifications are not deferred.
    pub fn batch<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        {
            let mut inner = self.inner.borrow_mut();
            inner.batch_depth = inner.batch_depth.saturating_add(1);
        }
        let result = f(self);
        let flush = {
            let mut inner = self.inner.borrow_mut();
            inner.batch_depth = inner.batch_depth.saturating_sub(1);
            let flush = inner.batch_depth == 0 && inner.dirty;
            if flush {
                inner.dirty = false;
            }
            flush
        };
        if flush {
            let _ = self
                .write_snapshot()
                .tap_err(|e| warn!(error = %e, "Failed to persist state"));
        }
        result
    }

    /// Write the durable snapshot now.
    ///
    /// # Errors
    /// Returns the backend's `PersistenceError`; in-memory state is unaffected.
    pub fn flush(&self) -> Result<(), PersistenceError> {
        self.write_snapshot()
    }

    fn persist(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.batch_depth > 0 {
                inner.dirty = true;
                return;
            }
        }
        let _ = self
            .write_snapshot()
            .tap_err(|e| warn!(error = %e, "Failed to persist state"));
    }

    fn write_snapshot(&self) -> Result<(), PersistenceError> {
        let snapshot: Map<String, Value> = {
            let inner = self.inner.borrow();
            keys::DURABLE
                .iter()
                .filter_map(|key| {
                    inner
                        .values
                        .get(*key)
                        .filter(|v| !(*key == keys::DASHBOARD_STATE && v.is_null()))
                        .map(|v| ((*key).to_string(), v.clone()))
                })
                .collect()
        };
        let encoded = serde_json::to_string(&snapshot)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        self.storage.write(&self.snapshot_key, &encoded)
    }

    fn notify(&self, key: &str, new: &Value, old: &Value) {
        let round: Vec<Rc<Registration>> = self
            .inner
            .borrow()
            .observers
            .get(key)
            .cloned()
            .unwrap_or_default();
        for reg in round {
            if reg.active.get() {
                (reg.callback)(new, old);
            }
        }
    }
}

fn incremented(value: &Value) -> Option<Value> {
    if let Some(n) = value.as_u64() {
        return Some(Value::from(n.saturating_add(1)));
    }
    if let Some(n) = value.as_i64() {
        return Some(Value::from(n.saturating_add(1)));
    }
    value.as_f64().map(|n| Value::from(n + 1.0))
}

fn load_snapshot(storage: &dyn StorageBackend, key: &str) -> Map<String, Value> {
    let raw = match storage.read(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Map::new(),
        Err(e) => {
            warn!(error = %e, "Failed to load persisted state");
            return Map::new();
        }
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(kind = ?other, "Persisted state is not an object, ignoring");
            Map::new()
        }
        Err(e) => {
            warn!(error = %e, "Failed to parse persisted state");
            Map::new()
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;
    use serde_json::json;

    fn store_over(storage: &MemoryStorage) -> Store {
        Store::open(Rc::new(storage.clone()), &ClientConfig::default())
    }

    fn recorder() -> (Rc<RefCell<Vec<(Value, Value)>>>, Observer) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let observer: Observer = Rc::new(move |new: &Value, old: &Value| {
            sink.borrow_mut().push((new.clone(), old.clone()));
        });
        (seen, observer)
    }

    #[test]
    fn test_defaults_present() {
        let store = Store::in_memory();
        assert_eq!(store.get(keys::CURRENT_VIEW), Some(json!("dashboard")));
        assert_eq!(store.get(keys::THEME), Some(json!("cyberpunk")));
        assert_eq!(store.get(keys::TERMINAL_HISTORY), Some(json!([])));
        assert_eq!(store.get(keys::STATS).unwrap()["totalScans"], 0);
        assert_eq!(store.get(keys::DASHBOARD_STATE), Some(Value::Null));
        assert_eq!(store.get("nonexistent"), None);
    }

    #[test]
    fn test_set_notifies_with_new_and_old() {
        let store = Store::in_memory();
        let (seen, observer) = recorder();
        store.subscribe(keys::LAST_TARGET, observer);

        store.set(keys::LAST_TARGET, json!("example.com"), true);

        assert_eq!(*seen.borrow(), vec![(json!("example.com"), json!(""))]);
    }

    #[test]
    fn test_old_value_of_absent_key_is_null() {
        let store = Store::in_memory();
        let (seen, observer) = recorder();
        store.subscribe("custom", observer);
        store.set("custom", json!(1), false);
        assert_eq!(seen.borrow()[0].1, Value::Null);
    }

    #[test]
    fn test_notification_order_is_subscription_order() {
        let store = Store::in_memory();
        let order = Rc::new(RefCell::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            store.subscribe_fn(keys::IS_LOADING, move |_, _| order.borrow_mut().push(label));
        }
        store.set(keys::IS_LOADING, json!(true), false);
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_duplicate_subscription_is_deduplicated() {
        let store = Store::in_memory();
        let (seen, observer) = recorder();
        let first = store.subscribe(keys::LAST_TARGET, Rc::clone(&observer));
        let _second = store.subscribe(keys::LAST_TARGET, observer);
        assert_eq!(store.observer_count(keys::LAST_TARGET), 1);

        store.set(keys::LAST_TARGET, json!("a"), false);
        assert_eq!(seen.borrow().len(), 1);

        first.unsubscribe();
        store.set(keys::LAST_TARGET, json!("b"), false);
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(store.observer_count(keys::LAST_TARGET), 0);
    }

    #[test]
    fn test_unsubscribe_removes_only_its_registration() {
        let store = Store::in_memory();
        let (a_seen, a) = recorder();
        let (b_seen, b) = recorder();
        let a_sub = store.subscribe(keys::LAST_TARGET, a);
        store.subscribe(keys::LAST_TARGET, b);

        a_sub.unsubscribe();
        a_sub.unsubscribe();
        store.set(keys::LAST_TARGET, json!("x"), false);

        assert!(a_seen.borrow().is_empty());
        assert_eq!(b_seen.borrow().len(), 1);
    }

    #[test]
    fn test_observer_removed_mid_round_is_skipped() {
        let store = Store::in_memory();
        let (late_seen, late) = recorder();
        let late_sub: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let handle = Rc::clone(&late_sub);
        store.subscribe_fn(keys::IS_LOADING, move |_, _| {
            if let Some(sub) = handle.borrow().as_ref() {
                sub.unsubscribe();
            }
        });
        *late_sub.borrow_mut() = Some(store.subscribe(keys::IS_LOADING, late));

        store.set(keys::IS_LOADING, json!(true), false);
        assert!(late_seen.borrow().is_empty());
    }

    #[test]
    fn test_reentrant_set_on_same_key_runs_nested_round_first() {
        let store = Store::in_memory();
        let log = Rc::new(RefCell::new(Vec::new()));

        let inner_store = store.clone();
        let first_log = Rc::clone(&log);
        store.subscribe_fn(keys::LAST_TARGET, move |new, _| {
            first_log.borrow_mut().push(format!("first:{new}"));
            if new == &json!("raw") {
                inner_store.set(keys::LAST_TARGET, json!("normalized"), false);
            }
        });
        let second_log = Rc::clone(&log);
        store.subscribe_fn(keys::LAST_TARGET, move |new, _| {
            second_log.borrow_mut().push(format!("second:{new}"));
        });

        store.set(keys::LAST_TARGET, json!("raw"), false);

        assert_eq!(
            *log.borrow(),
            vec![
                "first:\"raw\"",
                "first:\"normalized\"",
                "second:\"normalized\"",
                "second:\"raw\"",
            ]
        );
        assert_eq!(store.get(keys::LAST_TARGET), Some(json!("normalized")));
    }

    #[test]
    fn test_durable_round_trip_through_reload() {
        let storage = MemoryStorage::new();
        let store = store_over(&storage);
        store.set(keys::LAST_TARGET, json!("scanme.nmap.org"), true);
        store.set(keys::CHAT_HISTORY, json!([{"sender": "user", "text": "hi"}]), true);
        store.set(keys::DASHBOARD_STATE, json!({"panel": "terminal"}), true);

        let reloaded = store_over(&storage);
        assert_eq!(reloaded.get(keys::LAST_TARGET), Some(json!("scanme.nmap.org")));
        assert_eq!(
            reloaded.get(keys::CHAT_HISTORY),
            Some(json!([{"sender": "user", "text": "hi"}]))
        );
        assert_eq!(reloaded.get(keys::DASHBOARD_STATE), Some(json!({"panel": "terminal"})));
    }

    #[test]
    fn test_volatile_keys_not_persisted() {
        let storage = MemoryStorage::new();
        let store = store_over(&storage);
        store.set(keys::IS_CONNECTED, json!(true), true);
        store.set(keys::CURRENT_VIEW, json!("ai"), true);
        assert_eq!(storage.write_count(), 0);

        let reloaded = store_over(&storage);
        assert_eq!(reloaded.get(keys::IS_CONNECTED), Some(json!(false)));
        assert_eq!(reloaded.get(keys::CURRENT_VIEW), Some(json!("dashboard")));
    }

    #[test]
    fn test_persist_false_skips_write() {
        let storage = MemoryStorage::new();
        let store = store_over(&storage);
        store.set(keys::LAST_TARGET, json!("quiet"), false);
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn test_null_dashboard_state_omitted_from_snapshot() {
        let storage = MemoryStorage::new();
        let store = store_over(&storage);
        store.set(keys::LAST_TARGET, json!("t"), true);
        let snapshot: Value = serde_json::from_str(&storage.get("xrecon_state").unwrap()).unwrap();
        assert!(snapshot.get(keys::DASHBOARD_STATE).is_none());
        assert_eq!(snapshot[keys::LAST_TARGET], "t");
    }

    #[test]
    fn test_corrupt_snapshot_falls_back_to_defaults() {
        let storage = MemoryStorage::new();
        storage.insert("xrecon_state", "{not json");
        let store = store_over(&storage);
        assert_eq!(store.get(keys::TERMINAL_HISTORY), Some(json!([])));
        assert_eq!(store.get(keys::STATS).unwrap()["vulns"], 0);
    }

    #[test]
    fn test_snapshot_ignores_volatile_keys() {
        let storage = MemoryStorage::new();
        storage.insert("xrecon_state", r#"{"isConnected": true, "lastTarget": "kept"}"#);
        let store = store_over(&storage);
        assert_eq!(store.get(keys::IS_CONNECTED), Some(json!(false)));
        assert_eq!(store.get(keys::LAST_TARGET), Some(json!("kept")));
    }

    #[test]
    fn test_quota_failure_keeps_in_memory_value() {
        let storage = MemoryStorage::with_quota(16);
        let store = store_over(&storage);
        let (seen, observer) = recorder();
        store.subscribe(keys::LAST_TARGET, observer);

        store.set(keys::LAST_TARGET, json!("a-target-name-far-too-long-for-quota"), true);

        assert_eq!(
            store.get(keys::LAST_TARGET),
            Some(json!("a-target-name-far-too-long-for-quota"))
        );
        assert_eq!(seen.borrow().len(), 1);
        assert!(storage.get("xrecon_state").is_none());
        assert!(matches!(
            store.flush(),
            Err(PersistenceError::QuotaExceeded { .. })
        ));
    }

    #[test]
    fn test_append_bounded_evicts_oldest_first() {
        let store = Store::in_memory();
        for i in 0..5 {
            store.append_bounded(keys::SCAN_HISTORY, json!(i), 3);
        }
        assert_eq!(store.get(keys::SCAN_HISTORY), Some(json!([2, 3, 4])));
    }

    #[test]
    fn test_append_bounded_on_non_array_starts_fresh() {
        let store = Store::in_memory();
        store.set("odd", json!("scalar"), false);
        store.append_bounded("odd", json!(1), 10);
        assert_eq!(store.get("odd"), Some(json!([1])));
    }

    #[test]
    fn test_increment_counter_notifies_with_whole_object() {
        let storage = MemoryStorage::new();
        let store = store_over(&storage);
        let (seen, observer) = recorder();
        store.subscribe(keys::STATS, observer);

        assert!(store.increment_counter(keys::STATS, "totalScans"));
        assert!(store.increment_counter(keys::STATS, "totalScans"));

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].0["totalScans"], 2);
        assert_eq!(seen[1].0["vulns"], 0);
        assert_eq!(seen[1].1["totalScans"], 1);
        assert_eq!(store_over(&storage).get(keys::STATS).unwrap()["totalScans"], 2);
    }

    #[test]
    fn test_increment_unknown_counter_is_noop() {
        let store = Store::in_memory();
        let (seen, observer) = recorder();
        store.subscribe(keys::STATS, observer);
        assert!(!store.increment_counter(keys::STATS, "bogus"));
        assert!(!store.increment_counter(keys::LAST_TARGET, "len"));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_set_path_updates_nested_field() {
        let storage = MemoryStorage::new();
        let store = store_over(&storage);
        let (seen, observer) = recorder();
        store.subscribe(keys::STATS, observer);

        store.set_path("stats.vulns", json!(7));

        assert_eq!(store.get(keys::STATS).unwrap()["vulns"], 7);
        assert_eq!(seen.borrow()[0].0["vulns"], 7);
        assert_eq!(seen.borrow()[0].1["vulns"], 0);
        assert_eq!(store_over(&storage).get(keys::STATS).unwrap()["vulns"], 7);
    }

    #[test]
    fn test_set_path_creates_intermediate_objects() {
        let store = Store::in_memory();
        store.set_path("dashboardState.panels.terminal", json!(true));
        assert_eq!(
            store.get(keys::DASHBOARD_STATE),
            Some(json!({"panels": {"terminal": true}}))
        );
    }

    #[test]
    fn test_batch_coalesces_writes() {
        let storage = MemoryStorage::new();
        let store = store_over(&storage);
        store.batch(|s| {
            s.set(keys::LAST_TARGET, json!("one"), true);
            s.increment_counter(keys::STATS, "totalScans");
            s.append_bounded(keys::SCAN_HISTORY, json!({"target": "one"}), 50);
        });
        assert_eq!(storage.write_count(), 1);
        assert_eq!(store_over(&storage).get(keys::LAST_TARGET), Some(json!("one")));
    }

    #[test]
    fn test_get_as_falls_back_on_bad_shape() {
        let store = Store::in_memory();
        store.set(keys::CHAT_HISTORY, json!("not a list"), false);
        let history: Vec<crate::models::ChatMessage> = store.get_as(keys::CHAT_HISTORY);
        assert!(history.is_empty());
    }

    #[test]
    fn test_clear_terminal_history() {
        let store = Store::in_memory();
        store.append_bounded(keys::TERMINAL_HISTORY, json!({"message": "x"}), 100);
        store.clear_terminal_history();
        assert_eq!(store.get(keys::TERMINAL_HISTORY), Some(json!([])));
    }
}
