//! Wall-clock access behind a seam so feeds stay deterministic under test.

use std::cell::Cell;

use chrono::{Local, TimeZone, Utc};

/// Source of timestamps for history entries.
pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;

    /// Local time-of-day label shown next to terminal lines (`HH:MM:SS`).
    fn time_label(&self) -> String {
        Local
            .timestamp_millis_opt(self.now_millis())
            .single()
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_default()
    }
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Manually advanced clock.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: Cell<i64>,
}

impl ManualClock {
    pub fn new(millis: i64) -> Self {
        Self {
            millis: Cell::new(millis),
        }
    }

    pub fn advance(&self, millis: i64) {
        self.millis.set(self.millis.get().saturating_add(millis));
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.get()
    }

    fn time_label(&self) -> String {
        Utc.timestamp_millis_opt(self.millis.get())
            .single()
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_default()
    }
}
