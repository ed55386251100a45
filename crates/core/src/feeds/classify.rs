//! Terminal line classification.
//!
//! Lines are matched against an ordered rule table; the first rule with a
//! marker contained in the raw line decides kind and prefix.

use crate::models::EntryKind;

/// Substring announcing that every task of the running scan finished.
pub const SCAN_COMPLETE_SENTINEL: &str = "All Scan Tasks Completed";

/// Marker stripped from the start of progress lines.
const PROGRESS_MARKER: &str = ">>";

/// One classification rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub markers: &'static [&'static str],
    pub kind: EntryKind,
    pub prefix: &'static str,
}

impl Rule {
    pub fn matches(&self, line: &str) -> bool {
        self.markers.iter().any(|marker| line.contains(marker))
    }
}

/// Rule table, evaluated in order.
pub const RULES: [Rule; 5] = [
    Rule {
        markers: &["[ERROR]", "[STDERR]"],
        kind: EntryKind::Error,
        prefix: "ERR",
    },
    Rule {
        markers: &["Finished", "Complete", "SUCCESS"],
        kind: EntryKind::Success,
        prefix: "✓",
    },
    Rule {
        markers: &["[EXEC]", "Launching"],
        kind: EntryKind::Warning,
        prefix: "⚡",
    },
    Rule {
        markers: &[PROGRESS_MARKER],
        kind: EntryKind::Info,
        prefix: "▶",
    },
    Rule {
        markers: &["OPEN", "Found"],
        kind: EntryKind::Highlight,
        prefix: "🎯",
    },
];

/// Kind and prefix of a line no rule matches.
pub const FALLBACK: (EntryKind, &str) = (EntryKind::Info, "INFO");

/// A classified server line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    /// Display text: leading progress marker removed, whitespace trimmed.
    pub message: String,
    pub kind: EntryKind,
    pub prefix: &'static str,
    /// The line carries the completion sentinel as a success line.
    pub completes_scan: bool,
}

pub fn classify(line: &str) -> Classified {
    let (kind, prefix) = RULES
        .iter()
        .find(|rule| rule.matches(line))
        .map_or(FALLBACK, |rule| (rule.kind, rule.prefix));

    Classified {
        message: display_text(line),
        kind,
        prefix,
        completes_scan: kind == EntryKind::Success && line.contains(SCAN_COMPLETE_SENTINEL),
    }
}

fn display_text(line: &str) -> String {
    line.strip_prefix(PROGRESS_MARKER)
        .unwrap_or(line)
        .trim()
        .to_string()
}
