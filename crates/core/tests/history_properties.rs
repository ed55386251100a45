//! Property-based tests for bounded histories and reply rendering.
//!
//! Uses proptest to validate:
//! - Bounded appends keep exactly the newest entries, in order
//! - Durable values survive a reload unchanged
//! - Rendered replies never carry raw markup from the input

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::rc::Rc;

use proptest::prelude::*;
use serde_json::{Value, json};
use xrecon_core::feeds::classify::classify;
use xrecon_core::feeds::format::format_reply;
use xrecon_core::{ClientConfig, MemoryStorage, Store, keys};

fn store_over(storage: &MemoryStorage) -> Store {
    Store::open(Rc::new(storage.clone()), &ClientConfig::default())
}

proptest! {
    /// Property: after any number of appends, at most `cap` entries remain
    /// and they are the most recent ones, oldest first.
    #[test]
    fn prop_bounded_append_keeps_newest(
        entries in prop::collection::vec(0u32..10_000, 0..150),
        cap in 1usize..60,
    ) {
        let store = Store::in_memory();
        for entry in &entries {
            store.append_bounded(keys::SCAN_HISTORY, json!(entry), cap);
        }

        let kept: Vec<u32> = store.get_as(keys::SCAN_HISTORY);
        let skip = entries.len().saturating_sub(cap);
        let expected: Vec<u32> = entries.iter().skip(skip).copied().collect();
        prop_assert!(kept.len() <= cap);
        prop_assert_eq!(kept, expected);
    }

    /// Property: a reloaded store sees exactly the durable values written.
    #[test]
    fn prop_reload_preserves_durable_values(
        lines in prop::collection::vec("[a-zA-Z0-9 :/.]{0,40}", 0..30),
        target in "[a-z0-9.-]{1,30}",
    ) {
        let storage = MemoryStorage::new();
        let first = store_over(&storage);
        first.batch(|store| {
            for line in &lines {
                store.append_bounded(keys::TERMINAL_HISTORY, json!(line), 100);
            }
            store.set(keys::LAST_TARGET, json!(target), true);
            store.set(keys::IS_SCANNING, json!(true), false);
        });

        let reloaded = store_over(&storage);
        prop_assert_eq!(
            reloaded.get(keys::TERMINAL_HISTORY),
            first.get(keys::TERMINAL_HISTORY)
        );
        prop_assert_eq!(reloaded.get(keys::LAST_TARGET), Some(Value::String(target)));
        prop_assert_eq!(reloaded.get(keys::IS_SCANNING), Some(Value::Bool(false)));
    }

    /// Property: nothing the backend sends survives as live markup.
    #[test]
    fn prop_reply_escapes_markup(
        before in "[a-zA-Z0-9 *`\n]{0,40}",
        after in "[a-zA-Z0-9 *`\n]{0,40}",
    ) {
        let raw = format!("{before}<script>alert(1)</script><img src=x onerror=y>{after}");
        let html = format_reply(&raw);
        prop_assert!(!html.contains("<script"));
        prop_assert!(!html.contains("<img"));
        prop_assert!(html.contains("&lt;script&gt;"));
    }

    /// Property: classification always yields a prefix and drops the `>>` marker.
    #[test]
    fn prop_classification_is_total(line in "(>> )?[a-zA-Z0-9 :./_\\[\\]-]{0,60}") {
        let classified = classify(&line);
        prop_assert!(!classified.prefix.is_empty());
        prop_assert!(!classified.message.starts_with(">>"));
        prop_assert_eq!(classified.message.trim(), classified.message.as_str());
    }
}
