//! snapkeep - recurring, retention-bounded VM snapshots for Proxmox VE.
//!
//! snapkeep turns "snapshot VM 101 every night and keep the last three" into
//! a cron entry plus a tiny generated script. Each scheduled run creates one
//! snapshot, lists what the VM has, and deletes the oldest snapshots of the
//! same job until only the retention count is left.
//!
//! # Features
//!
//! - **Schedule shorthand**: `3` (daily at 03:00), `0@2` (Sundays at 02:00)
//!   or any 5-field cron expression.
//! - **Namespaced retention**: snapshots are named `{namespace}-{stamp}`, so
//!   one job never prunes another job's or an operator's snapshots.
//! - **Plain-file state**: jobs live in a cron.d file and a directory of
//!   scripts. There is no daemon and no database.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI: vms | snapshots | job | config                        │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │  jobs: JobManager            │  snapshot: JobRunner         │
//! │  ArtifactGenerator           │  naming | listing | retention│
//! │  JobRegistry (cron.d)        │                              │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │  scheduling: Schedule / CronExpr    gateway: qm / pvesh     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use snapkeep::config::SnapkeepConfig;
//! use snapkeep::jobs::JobManager;
//! use snapkeep::types::{JobKey, KeepCount, Namespace, VmId};
//!
//! fn main() -> snapkeep::Result<()> {
//!     let config = SnapkeepConfig::load(None)?;
//!     let jobs = JobManager::from_config(&config);
//!
//!     let key = JobKey::new(VmId::new(101)?, Namespace::new("nightly")?);
//!     jobs.set_job(key, "2", KeepCount::new(3)?, &config.defaults.node)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod types;

pub mod gateway;
pub mod jobs;
pub mod scheduling;
pub mod snapshot;

pub mod cli;
pub mod observability;

// Re-exports
pub use error::{Result, SnapError};
pub use types::*;
