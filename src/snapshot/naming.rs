//! Deterministic snapshot names.

use crate::types::Namespace;
use chrono::{DateTime, Utc};

/// `chrono` format of the name suffix. Zero-padded, fixed width.
pub const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Length of a rendered [`STAMP_FORMAT`] stamp.
pub const STAMP_LEN: usize = 15;

/// Longest snapshot name the hypervisor accepts.
pub const MAX_NAME_LEN: usize = 40;

/// Name for a snapshot taken at `now` under `namespace`.
///
/// Stamps are rendered in UTC so that names keep sorting chronologically
/// across daylight-saving changes.
pub fn generate_name(namespace: &Namespace, now: DateTime<Utc>) -> String {
    format!("{}-{}", namespace, now.format(STAMP_FORMAT))
}

/// Whether `name` was produced by [`generate_name`] for `namespace`.
///
/// Requires the exact stamp shape after the prefix, so namespace `db` does not
/// claim `db-weekly-20240101-000000`.
pub fn belongs_to(namespace: &Namespace, name: &str) -> bool {
    name.strip_prefix(namespace.as_str())
        .and_then(|rest| rest.strip_prefix('-'))
        .map(is_stamp)
        .unwrap_or(false)
}

/// Whether `name` is acceptable to the hypervisor as a snapshot name.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    name.len() <= MAX_NAME_LEN
        && matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_stamp(s: &str) -> bool {
    s.len() == STAMP_LEN
        && s.bytes().enumerate().all(|(i, b)| match i {
            8 => b == b'-',
            _ => b.is_ascii_digit(),
        })
}
