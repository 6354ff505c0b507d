//! Snapshot lifecycle management.
//!
//! [`JobRunner`] performs one scheduled run of a job (create, list, prune,
//! delete) and the one-off operations the console exposes. It holds no state
//! between calls; everything it knows about a VM comes from a fresh listing.

use super::listing::{is_placeholder, parse_listing, NO_DESCRIPTION};
use super::naming::{belongs_to, generate_name, is_valid_name};
use super::retention::select_prunable;
use crate::error::{Result, SnapError};
use crate::gateway::HypervisorGateway;
use crate::types::{JobKey, KeepCount, Namespace, SnapshotRecord, VmId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What one scheduled run needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub key: JobKey,
    pub keep: KeepCount,
}

impl RunSpec {
    pub fn new(key: JobKey, keep: KeepCount) -> Self {
        Self { key, keep }
    }

    /// Description attached to snapshots this job creates.
    pub fn description(&self) -> String {
        format!("snapkeep {} (keep {})", self.key.namespace, self.keep)
    }
}

/// Outcome of one run or purge.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Snapshot created by this run, if any.
    pub created: Option<String>,
    /// Names selected for deletion, oldest first.
    pub pruned: Vec<String>,
    /// Names actually deleted.
    pub deleted: Vec<String>,
    /// `(name, error)` for each deletion that failed.
    pub failures: Vec<(String, String)>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs snapshot operations against one hypervisor.
#[derive(Clone)]
pub struct JobRunner {
    gateway: Arc<dyn HypervisorGateway>,
    delete_pause: Duration,
}

impl JobRunner {
    /// `delete_pause` is slept between consecutive deletions on one VM.
    pub fn new(gateway: Arc<dyn HypervisorGateway>, delete_pause: Duration) -> Self {
        Self {
            gateway,
            delete_pause,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn HypervisorGateway> {
        &self.gateway
    }

    /// Current snapshots of a VM, optionally restricted to one namespace.
    ///
    /// Rows without a usable inline description get one detail query each.
    pub async fn list(
        &self,
        vmid: VmId,
        namespace: Option<&Namespace>,
    ) -> Result<Vec<SnapshotRecord>> {
        let raw = self.gateway.list_snapshots(vmid).await?;
        let mut records = Vec::new();

        for listed in parse_listing(&raw) {
            if let Some(ns) = namespace {
                if !belongs_to(ns, &listed.name) {
                    continue;
                }
            }

            let description = match listed.description {
                Some(d) => d,
                None => self.lookup_description(vmid, &listed.name).await,
            };

            records.push(SnapshotRecord {
                name: listed.name,
                timestamp: listed.timestamp,
                description,
            });
        }

        Ok(records)
    }

    async fn lookup_description(&self, vmid: VmId, name: &str) -> String {
        match self.gateway.snapshot_description(vmid, name).await {
            Ok(Some(d)) if !is_placeholder(&d) => d,
            Ok(_) => NO_DESCRIPTION.to_string(),
            Err(e) => {
                warn!(%vmid, snapshot = name, error = %e, "Description lookup failed");
                NO_DESCRIPTION.to_string()
            }
        }
    }

    /// One scheduled run, stamped with the current time.
    pub async fn run(&self, spec: &RunSpec) -> Result<RunReport> {
        self.run_at(spec, Utc::now()).await
    }

    /// One scheduled run: create a snapshot named for `now`, then prune the
    /// namespace down to `spec.keep`.
    ///
    /// A failed create or listing aborts the run. Failed deletions are
    /// recorded in the report and the remaining ones are still attempted; the
    /// snapshot created earlier in the run is kept either way.
    pub async fn run_at(&self, spec: &RunSpec, now: DateTime<Utc>) -> Result<RunReport> {
        let JobKey { vmid, namespace } = &spec.key;
        let name = generate_name(namespace, now);

        info!(%vmid, %namespace, snapshot = %name, keep = %spec.keep, "Creating scheduled snapshot");
        if let Err(e) = self
            .gateway
            .create_snapshot(*vmid, &name, &spec.description())
            .await
        {
            error!(%vmid, snapshot = %name, error = %e, "Snapshot creation failed");
            return Err(e);
        }
        info!(%vmid, snapshot = %name, "Snapshot created");

        let raw = self.gateway.list_snapshots(*vmid).await?;
        let listed = parse_listing(&raw);
        let pruned = select_prunable(listed.iter().map(|s| s.name.as_str()), namespace, spec.keep);
        debug!(%vmid, %namespace, found = listed.len(), prune = pruned.len(), "Retention computed");

        let mut report = self.delete_all(*vmid, &pruned).await;
        report.created = Some(name);
        report.pruned = pruned;
        Ok(report)
    }

    /// Delete every live snapshot of `namespace` on `vmid`.
    pub async fn purge_namespace(&self, vmid: VmId, namespace: &Namespace) -> Result<RunReport> {
        let raw = self.gateway.list_snapshots(vmid).await?;
        let mut targets: Vec<String> = parse_listing(&raw)
            .into_iter()
            .map(|s| s.name)
            .filter(|name| belongs_to(namespace, name))
            .collect();
        targets.sort();

        info!(%vmid, %namespace, count = targets.len(), "Purging namespace snapshots");
        let mut report = self.delete_all(vmid, &targets).await;
        report.pruned = targets;
        Ok(report)
    }

    /// Deletes in order, pausing between calls. Never stops early.
    async fn delete_all(&self, vmid: VmId, names: &[String]) -> RunReport {
        let mut report = RunReport::default();

        for (i, name) in names.iter().enumerate() {
            if i > 0 && !self.delete_pause.is_zero() {
                tokio::time::sleep(self.delete_pause).await;
            }

            match self.gateway.delete_snapshot(vmid, name, true).await {
                Ok(()) => {
                    info!(%vmid, snapshot = %name, "Snapshot deleted");
                    report.deleted.push(name.clone());
                }
                Err(e) => {
                    error!(%vmid, snapshot = %name, error = %e, "Snapshot deletion failed");
                    report.failures.push((name.clone(), e.to_string()));
                }
            }
        }

        report
    }

    /// Take a snapshot outside any schedule. Without a name, one is generated
    /// under `default_namespace`.
    pub async fn create_one_off(
        &self,
        vmid: VmId,
        name: Option<&str>,
        description: Option<&str>,
        default_namespace: &Namespace,
    ) -> Result<String> {
        let name = match name {
            Some(n) if is_valid_name(n) => n.to_string(),
            Some(n) => {
                return Err(SnapError::Validation(format!(
                    "'{}' is not a valid snapshot name",
                    n
                )))
            }
            None => generate_name(default_namespace, Utc::now()),
        };
        let description = description.unwrap_or("snapkeep manual snapshot");

        self.gateway.create_snapshot(vmid, &name, description).await?;
        info!(%vmid, snapshot = %name, "Manual snapshot created");
        Ok(name)
    }

    /// Delete one snapshot by exact name.
    pub async fn delete_one(&self, vmid: VmId, name: &str) -> Result<()> {
        let raw = self.gateway.list_snapshots(vmid).await?;
        if !parse_listing(&raw).iter().any(|s| s.name == name) {
            return Err(SnapError::NotFound(format!(
                "snapshot '{}' on vm {}",
                name, vmid
            )));
        }

        self.gateway.delete_snapshot(vmid, name, true).await?;
        info!(%vmid, snapshot = name, "Manual snapshot deleted");
        Ok(())
    }
}
