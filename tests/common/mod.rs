//! Common test utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use snapkeep::config::SnapkeepConfig;
use snapkeep::gateway::HypervisorGateway;
use snapkeep::jobs::JobManager;
use snapkeep::snapshot::JobRunner;
use snapkeep::types::{JobKey, KeepCount, Namespace, Resource, VmId};
use snapkeep::{Result, SnapError};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub fn vmid(id: u32) -> VmId {
    VmId::new(id).unwrap()
}

pub fn ns(name: &str) -> Namespace {
    Namespace::new(name).unwrap()
}

pub fn keep(count: usize) -> KeepCount {
    KeepCount::new(count).unwrap()
}

pub fn job_key(id: u32, namespace: &str) -> JobKey {
    JobKey::new(vmid(id), ns(namespace))
}

/// Test environment rooted in a temporary directory.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub jobs_dir: PathBuf,
    pub cron_file: PathBuf,
    pub log_file: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let jobs_dir = temp_dir.path().join("jobs");
        let cron_file = temp_dir.path().join("cron.d").join("snapkeep");
        let log_file = temp_dir.path().join("snapkeep.log");

        Self {
            temp_dir,
            jobs_dir,
            cron_file,
            log_file,
        }
    }

    /// Configuration pointing every path into the temp dir, with no pause
    /// between deletions.
    pub fn config(&self) -> SnapkeepConfig {
        let mut config = SnapkeepConfig::default();
        config.defaults.node = "pve1".to_string();
        config.paths.jobs_dir = self.jobs_dir.clone();
        config.paths.cron_file = self.cron_file.clone();
        config.paths.log_file = self.log_file.clone();
        config.paths.binary = PathBuf::from("/usr/local/bin/snapkeep");
        config.job.delete_pause = Duration::ZERO;
        config
    }

    pub fn manager(&self) -> JobManager {
        JobManager::from_config(&self.config())
    }

    pub fn cron_text(&self) -> String {
        std::fs::read_to_string(&self.cron_file).unwrap_or_default()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// A gateway call as the fake saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Resources,
    List(u32),
    Create(u32, String),
    Delete(u32, String),
    Describe(u32, String),
}

#[derive(Debug, Clone)]
struct FakeSnapshot {
    name: String,
    inline: String,
    detail: Option<String>,
}

#[derive(Default)]
struct FakeState {
    resources: Vec<Resource>,
    snapshots: BTreeMap<u32, Vec<FakeSnapshot>>,
    calls: Vec<Call>,
    fail_creates: bool,
    fail_deletes: HashSet<String>,
}

/// In-memory hypervisor that prints `qm listsnapshot`-style trees.
#[derive(Default)]
pub struct FakeHypervisor {
    state: Mutex<FakeState>,
}

impl FakeHypervisor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn runner(self: &Arc<Self>) -> JobRunner {
        JobRunner::new(self.clone(), Duration::ZERO)
    }

    pub fn add_resource(&self, id: u32, name: &str, status: &str) {
        self.state.lock().resources.push(Resource {
            id: vmid(id),
            name: name.to_string(),
            status: status.to_string(),
            node: "pve1".to_string(),
        });
    }

    /// Seed a snapshot with an inline listing description.
    pub fn add_snapshot(&self, id: u32, name: &str, inline: &str) {
        self.state
            .lock()
            .snapshots
            .entry(id)
            .or_default()
            .push(FakeSnapshot {
                name: name.to_string(),
                inline: inline.to_string(),
                detail: None,
            });
    }

    /// Description returned by the detail query for one snapshot.
    pub fn set_detail(&self, id: u32, name: &str, detail: &str) {
        let mut state = self.state.lock();
        if let Some(snap) = state
            .snapshots
            .get_mut(&id)
            .and_then(|list| list.iter_mut().find(|s| s.name == name))
        {
            snap.detail = Some(detail.to_string());
        }
    }

    pub fn fail_creates(&self) {
        self.state.lock().fail_creates = true;
    }

    pub fn fail_delete_of(&self, name: &str) {
        self.state.lock().fail_deletes.insert(name.to_string());
    }

    /// Snapshot names of a VM in creation order.
    pub fn names(&self, id: u32) -> Vec<String> {
        self.state
            .lock()
            .snapshots
            .get(&id)
            .map(|list| list.iter().map(|s| s.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn render_tree(list: &[FakeSnapshot]) -> String {
        let mut out = String::new();
        for (depth, snap) in list.iter().enumerate() {
            let inline = if snap.inline.is_empty() {
                "no-description"
            } else {
                snap.inline.as_str()
            };
            out.push_str(&format!(
                "{:indent$}`-> {:<32} 2024-01-01 00:00:{:02}     {}\n",
                "",
                snap.name,
                depth % 60,
                inline,
                indent = depth * 2
            ));
        }
        out.push_str(&format!(
            "{:indent$}`-> current{:>40}\n",
            "",
            "You are here!",
            indent = list.len() * 2
        ));
        out
    }
}

#[async_trait]
impl HypervisorGateway for FakeHypervisor {
    async fn list_resources(&self) -> Result<Vec<Resource>> {
        let mut state = self.state.lock();
        state.calls.push(Call::Resources);
        Ok(state.resources.clone())
    }

    async fn list_snapshots(&self, vmid: VmId) -> Result<String> {
        let mut state = self.state.lock();
        state.calls.push(Call::List(vmid.get()));
        let list = state.snapshots.get(&vmid.get()).cloned().unwrap_or_default();
        Ok(Self::render_tree(&list))
    }

    async fn create_snapshot(&self, vmid: VmId, name: &str, description: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::Create(vmid.get(), name.to_string()));
        if state.fail_creates {
            return Err(SnapError::gateway(
                format!("qm snapshot {} {}", vmid, name),
                "VM is locked (backup)",
            ));
        }
        let list = state.snapshots.entry(vmid.get()).or_default();
        if list.iter().any(|s| s.name == name) {
            return Err(SnapError::gateway(
                format!("qm snapshot {} {}", vmid, name),
                format!("snapshot name '{}' already used", name),
            ));
        }
        list.push(FakeSnapshot {
            name: name.to_string(),
            inline: description.to_string(),
            detail: Some(description.to_string()),
        });
        Ok(())
    }

    async fn delete_snapshot(&self, vmid: VmId, name: &str, _force: bool) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::Delete(vmid.get(), name.to_string()));
        let command = format!("qm delsnapshot {} {} --force", vmid, name);
        if state.fail_deletes.contains(name) {
            return Err(SnapError::gateway(command, "got timeout"));
        }
        let list = state.snapshots.entry(vmid.get()).or_default();
        match list.iter().position(|s| s.name == name) {
            Some(idx) => {
                list.remove(idx);
                Ok(())
            }
            None => Err(SnapError::gateway(command, "snapshot does not exist")),
        }
    }

    async fn snapshot_description(&self, vmid: VmId, name: &str) -> Result<Option<String>> {
        let mut state = self.state.lock();
        state.calls.push(Call::Describe(vmid.get(), name.to_string()));
        Ok(state
            .snapshots
            .get(&vmid.get())
            .and_then(|list| list.iter().find(|s| s.name == name))
            .and_then(|s| s.detail.clone()))
    }
}
