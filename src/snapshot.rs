//! Snapshot naming, listing and retention.
//!
//! Every snapshot taken by a recurring job is named
//! `{namespace}-{YYYYMMDD-HHMMSS}`. The stamp has a fixed width, so sorting
//! names sorts snapshots by creation time; retention relies on that instead
//! of on the timestamps the hypervisor prints.

pub mod lifecycle;
mod listing;
mod naming;
mod retention;

pub use lifecycle::{JobRunner, RunReport, RunSpec};
pub use listing::{is_placeholder, parse_listing, ListedSnapshot, NO_DESCRIPTION};
pub use naming::{belongs_to, generate_name, is_valid_name, MAX_NAME_LEN, STAMP_FORMAT, STAMP_LEN};
pub use retention::select_prunable;
