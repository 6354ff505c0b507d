//! Parsing of hypervisor snapshot listings.
//!
//! The hypervisor prints snapshots in several shapes depending on version and
//! tool. Each line is offered to a fixed sequence of shape detectors; the first
//! one that recognizes it produces a record. Lines no detector recognizes are
//! skipped, so a listing always parses to whatever could be recovered.
//!
//! Tree (`qm listsnapshot`):
//!
//! ```text
//! `-> pre-upgrade              2024-01-10 03:00:01     before upgrade
//!   `-> nightly-20240111-030001 2024-01-11 03:00:01    no-description
//!     `-> current                                      You are here!
//! ```
//!
//! Boxed table (`pvesh ... --output-format text`):
//!
//! ```text
//! │ name                    │ snaptime            │ description │
//! │ nightly-20240111-030001 │ 2024-01-11 03:00:01 │             │
//! ```
//!
//! Plain columns:
//!
//! ```text
//! nightly-20240111-030001  2024-01-11 03:00:01  scheduled
//! ```

use super::naming::is_valid_name;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Description used when neither the listing nor the detail query has one.
pub const NO_DESCRIPTION: &str = "no description";

/// Name of the synthetic entry marking the live state.
const CURRENT: &str = "current";

/// One row recovered from a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedSnapshot {
    pub name: String,
    /// Verbatim timestamp text; empty when the row had none.
    pub timestamp: String,
    /// Inline description, `None` when absent or a placeholder.
    pub description: Option<String>,
}

type Detector = fn(&str) -> Option<ListedSnapshot>;

const DETECTORS: [(&str, Detector); 3] = [
    ("tree", detect_tree),
    ("boxed", detect_boxed),
    ("plain", detect_plain),
];

/// Parse raw listing text into snapshots, in listing order.
///
/// The `current` pointer is never returned. Never fails.
pub fn parse_listing(raw: &str) -> Vec<ListedSnapshot> {
    let mut snapshots = Vec::new();

    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let found = DETECTORS
            .iter()
            .find_map(|(shape, detect)| detect(line).map(|s| (*shape, s)));

        match found {
            Some((_, snapshot)) if snapshot.name == CURRENT => {}
            Some((shape, snapshot)) => {
                debug!(shape, name = %snapshot.name, "Parsed listing row");
                snapshots.push(snapshot);
            }
            None => debug!(line = line.trim(), "Skipped unrecognized listing line"),
        }
    }

    snapshots
}

/// Whether a description is empty or one of the hypervisor's stand-ins.
pub fn is_placeholder(description: &str) -> bool {
    matches!(
        description.trim(),
        "" | "-" | "no-description" | "no description"
    )
}

fn tree_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*`?->\s+(?P<name>[A-Za-z][A-Za-z0-9_-]*)(?:\s+(?P<ts>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}))?(?:\s+(?P<desc>.*?))?\s*$",
        )
        .expect("tree pattern is valid")
    })
}

fn plain_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?P<name>[A-Za-z][A-Za-z0-9_-]*)\s+(?P<ts>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})(?:\s+(?P<desc>.*?))?\s*$",
        )
        .expect("plain pattern is valid")
    })
}

fn description(raw: Option<&str>) -> Option<String> {
    raw.filter(|d| !is_placeholder(d))
        .map(|d| d.trim().to_string())
}

fn detect_tree(line: &str) -> Option<ListedSnapshot> {
    let caps = tree_regex().captures(line)?;
    Some(ListedSnapshot {
        name: caps["name"].to_string(),
        timestamp: caps.name("ts").map(|m| m.as_str().to_string()).unwrap_or_default(),
        description: description(caps.name("desc").map(|m| m.as_str())),
    })
}

fn detect_boxed(line: &str) -> Option<ListedSnapshot> {
    let delimiter = if line.contains('│') {
        '│'
    } else if line.contains('|') {
        '|'
    } else {
        return None;
    };

    let cells: Vec<&str> = line.split(delimiter).map(str::trim).collect();
    // Leading and trailing borders leave empty edge cells
    let cells = match cells.as_slice() {
        [first, inner @ .., last] if first.is_empty() && last.is_empty() => inner,
        all => all,
    };

    let name = *cells.first()?;
    if !is_valid_name(name) || name.eq_ignore_ascii_case("name") {
        return None;
    }

    Some(ListedSnapshot {
        name: name.to_string(),
        timestamp: cells.get(1).map(|s| s.to_string()).unwrap_or_default(),
        description: description(cells.get(2).copied()),
    })
}

fn detect_plain(line: &str) -> Option<ListedSnapshot> {
    let caps = plain_regex().captures(line)?;
    Some(ListedSnapshot {
        name: caps["name"].to_string(),
        timestamp: caps["ts"].to_string(),
        description: description(caps.name("desc").map(|m| m.as_str())),
    })
}
