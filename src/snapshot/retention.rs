//! Count-based retention.

use super::naming::belongs_to;
use crate::types::{KeepCount, Namespace};

/// Names to delete so that at most `keep` snapshots of `namespace` remain.
///
/// Only names [`belongs_to`] `namespace` are candidates; anything else in the
/// input is ignored. The result is the oldest `max(0, n - keep)` names, oldest
/// first. This decides and never deletes.
pub fn select_prunable<'a, I>(names: I, namespace: &Namespace, keep: KeepCount) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut owned: Vec<&str> = names
        .into_iter()
        .filter(|name| belongs_to(namespace, name))
        .collect();
    owned.sort_unstable();
    owned.dedup();

    let excess = owned.len().saturating_sub(keep.get());
    owned.into_iter().take(excess).map(str::to_string).collect()
}
