//! Recurring snapshot jobs.
//!
//! A job is made of two pieces on disk:
//!
//! - an executable artifact under the jobs directory that calls back into
//!   `snapkeep job run` with every parameter baked in as a literal, and
//! - one line in the cron.d registry that fires the artifact on schedule.
//!
//! The artifact path is derived from `(vmid, namespace)` alone, so it is both
//! the identity of a job and the key used to find its registry line.

mod artifact;
mod manager;
mod registry;

pub use artifact::{parse_artifact_file_name, read_keep, read_node, shell_quote, ArtifactGenerator};
pub use manager::JobManager;
pub use registry::{JobRegistry, RegistryEntry, RegistryListing};

use crate::scheduling::Schedule;
use crate::types::{JobKey, KeepCount};
use serde::Serialize;

/// Everything needed to render and register one recurring job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotJob {
    pub key: JobKey,
    pub schedule: Schedule,
    pub keep: KeepCount,
    /// Hypervisor node the job's VM lives on.
    pub node: String,
}
