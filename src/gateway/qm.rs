//! Proxmox VE gateway backed by the `qm` and `pvesh` command-line tools.

use super::HypervisorGateway;
use crate::error::{Result, SnapError};
use crate::types::{Resource, VmId};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Gateway that shells out to `qm` / `pvesh` on the local node.
#[derive(Debug, Clone)]
pub struct QmGateway {
    node: String,
    qm: PathBuf,
    pvesh: PathBuf,
}

/// Row of `pvesh get /cluster/resources --type vm`.
#[derive(Debug, Deserialize)]
struct ClusterResource {
    #[serde(rename = "type")]
    kind: String,
    vmid: Option<u32>,
    name: Option<String>,
    status: Option<String>,
    node: Option<String>,
}

impl QmGateway {
    /// Gateway for VMs on `node`, using the tools found on `PATH`.
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            qm: PathBuf::from("qm"),
            pvesh: PathBuf::from("pvesh"),
        }
    }

    /// Override the tool locations.
    pub fn with_tools(mut self, qm: impl Into<PathBuf>, pvesh: impl Into<PathBuf>) -> Self {
        self.qm = qm.into();
        self.pvesh = pvesh.into();
        self
    }

    async fn run(&self, program: &Path, args: &[&str]) -> Result<String> {
        let command_line = format!("{} {}", program.display(), args.join(" "));
        debug!(command = %command_line, "Calling hypervisor");

        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SnapError::gateway(&command_line, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(SnapError::gateway(command_line, message));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl HypervisorGateway for QmGateway {
    async fn list_resources(&self) -> Result<Vec<Resource>> {
        let raw = self
            .run(
                &self.pvesh,
                &["get", "/cluster/resources", "--type", "vm", "--output-format", "json"],
            )
            .await?;
        parse_cluster_resources(&raw)
    }

    async fn list_snapshots(&self, vmid: VmId) -> Result<String> {
        let vmid = vmid.to_string();
        self.run(&self.qm, &["listsnapshot", vmid.as_str()]).await
    }

    async fn create_snapshot(&self, vmid: VmId, name: &str, description: &str) -> Result<()> {
        let vmid = vmid.to_string();
        self.run(
            &self.qm,
            &["snapshot", vmid.as_str(), name, "--description", description],
        )
        .await
        .map(|_| ())
    }

    async fn delete_snapshot(&self, vmid: VmId, name: &str, force: bool) -> Result<()> {
        let vmid = vmid.to_string();
        let mut args = vec!["delsnapshot", vmid.as_str(), name];
        if force {
            args.push("--force");
        }
        self.run(&self.qm, &args).await.map(|_| ())
    }

    async fn snapshot_description(&self, vmid: VmId, name: &str) -> Result<Option<String>> {
        let path = format!("/nodes/{}/qemu/{}/snapshot/{}/config", self.node, vmid, name);
        let raw = self
            .run(&self.pvesh, &["get", path.as_str(), "--output-format", "json"])
            .await?;
        let config: serde_json::Value = serde_json::from_str(&raw)?;
        Ok(config
            .get("description")
            .and_then(|d| d.as_str())
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()))
    }
}

/// Keep only QEMU guests with a usable id, sorted by id.
fn parse_cluster_resources(raw: &str) -> Result<Vec<Resource>> {
    let rows: Vec<ClusterResource> = serde_json::from_str(raw)?;
    let mut resources: Vec<Resource> = rows
        .into_iter()
        .filter(|r| r.kind == "qemu")
        .filter_map(|r| {
            let id = VmId::new(r.vmid?).ok()?;
            Some(Resource {
                id,
                name: r.name.unwrap_or_default(),
                status: r.status.unwrap_or_else(|| "unknown".to_string()),
                node: r.node.unwrap_or_default(),
            })
        })
        .collect();
    resources.sort_by_key(|r| r.id);
    Ok(resources)
}
