//! Core type definitions for snapkeep.
//!
//! # Key Types
//!
//! - [`VmId`]: Numeric hypervisor resource identifier
//! - [`Namespace`]: Prefix grouping every snapshot of one recurring job
//! - [`KeepCount`]: Retention policy, always at least one
//! - [`JobKey`]: The `(vmid, namespace)` identity of a recurring job
//! - [`Resource`], [`SnapshotRecord`]: Read-only views of hypervisor state
//!
//! # Examples
//!
//! ```rust
//! use snapkeep::types::{JobKey, KeepCount, Namespace, VmId};
//!
//! let key = JobKey::new(VmId::new(101).unwrap(), Namespace::new("nightly").unwrap());
//! assert_eq!(key.to_string(), "101/nightly");
//!
//! assert!(KeepCount::new(0).is_err());
//! assert_eq!(KeepCount::new(3).unwrap().get(), 3);
//! ```

use crate::error::{Result, SnapError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest namespace accepted. Leaves room for the `-YYYYMMDD-HHMMSS` suffix
/// inside the hypervisor's 40-character snapshot-name limit.
pub const MAX_NAMESPACE_LEN: usize = 24;

/// Numeric identifier of a hypervisor resource (VM or container).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct VmId(u32);

impl VmId {
    /// Create a resource id; zero is rejected.
    pub fn new(id: u32) -> Result<Self> {
        if id == 0 {
            return Err(SnapError::Validation("vmid must be a positive integer".into()));
        }
        Ok(Self(id))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for VmId {
    type Error = SnapError;

    fn try_from(id: u32) -> Result<Self> {
        Self::new(id)
    }
}

impl From<VmId> for u32 {
    fn from(id: VmId) -> Self {
        id.0
    }
}

impl FromStr for VmId {
    type Err = SnapError;

    fn from_str(s: &str) -> Result<Self> {
        let id = s
            .trim()
            .parse::<u32>()
            .map_err(|_| SnapError::Validation(format!("'{}' is not a valid vmid", s)))?;
        Self::new(id)
    }
}

impl fmt::Display for VmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Prefix shared by all snapshots of one recurring job.
///
/// Starts with an ASCII letter; the rest is letters, digits, `_` or `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    pub fn new(ns: impl Into<String>) -> Result<Self> {
        let ns = ns.into();
        let mut chars = ns.chars();
        match chars.next() {
            None => return Err(SnapError::Validation("namespace cannot be empty".into())),
            Some(c) if !c.is_ascii_alphabetic() => {
                return Err(SnapError::Validation(format!(
                    "namespace '{}' must start with a letter",
                    ns
                )))
            }
            _ => {}
        }
        if ns.len() > MAX_NAMESPACE_LEN {
            return Err(SnapError::Validation(format!(
                "namespace '{}' is longer than {} characters",
                ns, MAX_NAMESPACE_LEN
            )));
        }
        if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-')) {
            return Err(SnapError::Validation(format!(
                "namespace '{}' contains invalid character '{}'",
                ns, bad
            )));
        }
        Ok(Self(ns))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Namespace {
    type Error = SnapError;

    fn try_from(ns: String) -> Result<Self> {
        Self::new(ns)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.0
    }
}

impl FromStr for Namespace {
    type Err = SnapError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Number of most recent same-namespace snapshots to preserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct KeepCount(usize);

impl KeepCount {
    pub fn new(count: usize) -> Result<Self> {
        if count == 0 {
            return Err(SnapError::Validation("keep count must be at least 1".into()));
        }
        Ok(Self(count))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl TryFrom<usize> for KeepCount {
    type Error = SnapError;

    fn try_from(count: usize) -> Result<Self> {
        Self::new(count)
    }
}

impl From<KeepCount> for usize {
    fn from(keep: KeepCount) -> Self {
        keep.0
    }
}

impl FromStr for KeepCount {
    type Err = SnapError;

    fn from_str(s: &str) -> Result<Self> {
        let count = s
            .trim()
            .parse::<usize>()
            .map_err(|_| SnapError::Validation(format!("'{}' is not a valid keep count", s)))?;
        Self::new(count)
    }
}

impl fmt::Display for KeepCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a recurring snapshot job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    pub vmid: VmId,
    pub namespace: Namespace,
}

impl JobKey {
    pub fn new(vmid: VmId, namespace: Namespace) -> Self {
        Self { vmid, namespace }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vmid, self.namespace)
    }
}

/// A hypervisor-managed compute instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: VmId,
    pub name: String,
    pub status: String,
    pub node: String,
}

/// One snapshot as recovered from a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub name: String,
    /// Timestamp exactly as the listing printed it; empty when absent.
    pub timestamp: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vmid_rejects_zero_and_garbage() {
        assert!(VmId::new(0).is_err());
        assert!("abc".parse::<VmId>().is_err());
        assert_eq!(" 101 ".parse::<VmId>().unwrap().get(), 101);
    }

    #[test]
    fn test_namespace_alphabet() {
        assert!(Namespace::new("nightly").is_ok());
        assert!(Namespace::new("pre_upgrade-2").is_ok());
        assert!(Namespace::new("").is_err());
        assert!(Namespace::new("2nightly").is_err());
        assert!(Namespace::new("night ly").is_err());
        assert!(Namespace::new("a".repeat(MAX_NAMESPACE_LEN + 1)).is_err());
    }

    #[test]
    fn test_keep_count() {
        assert!(KeepCount::new(0).is_err());
        assert!("x".parse::<KeepCount>().is_err());
        assert_eq!("5".parse::<KeepCount>().unwrap().get(), 5);
    }

    #[test]
    fn test_keep_count_serde_rejects_zero() {
        assert!(serde_json::from_str::<KeepCount>("0").is_err());
        assert_eq!(serde_json::from_str::<KeepCount>("2").unwrap().get(), 2);
    }
}
