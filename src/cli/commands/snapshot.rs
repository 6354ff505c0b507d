//! One-off snapshot operations

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::output::{self, OutputFormat};
use crate::cli::Context;
use crate::types::{Namespace, SnapshotRecord, VmId};

/// Namespace used for snapshots created without an explicit name.
pub const MANUAL_NAMESPACE: &str = "manual";

#[derive(Args)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    command: SnapshotCommands,
}

#[derive(Subcommand)]
enum SnapshotCommands {
    /// List snapshots of a VM
    #[command(alias = "ls")]
    List {
        /// VM id
        vmid: VmId,

        /// Only snapshots taken by this job namespace
        #[arg(long)]
        namespace: Option<Namespace>,
    },

    /// Take a snapshot now
    Create {
        /// VM id
        vmid: VmId,

        /// Snapshot name (generated under namespace `manual` if omitted)
        #[arg(short, long)]
        name: Option<String>,

        /// Snapshot description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Delete one snapshot
    #[command(alias = "rm")]
    Delete {
        /// VM id
        vmid: VmId,

        /// Exact snapshot name
        name: String,
    },
}

#[derive(Debug, Serialize, Tabled)]
struct SnapshotRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Taken")]
    timestamp: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<SnapshotRecord> for SnapshotRow {
    fn from(s: SnapshotRecord) -> Self {
        Self {
            name: s.name,
            timestamp: if s.timestamp.is_empty() { "-".to_string() } else { s.timestamp },
            description: s.description,
        }
    }
}

impl SnapshotCommands {
    fn vmid(&self) -> VmId {
        match self {
            SnapshotCommands::List { vmid, .. }
            | SnapshotCommands::Create { vmid, .. }
            | SnapshotCommands::Delete { vmid, .. } => *vmid,
        }
    }
}

pub async fn execute(args: SnapshotArgs, ctx: &Context) -> Result<()> {
    let runner = ctx.runner_for(args.command.vmid()).await;

    match args.command {
        SnapshotCommands::List { vmid, namespace } => {
            let snapshots = runner.list(vmid, namespace.as_ref()).await?;
            let rows: Vec<SnapshotRow> = snapshots.into_iter().map(Into::into).collect();
            output::print_output(&rows, ctx.format)?;
        }

        SnapshotCommands::Create {
            vmid,
            name,
            description,
        } => {
            let manual = Namespace::new(MANUAL_NAMESPACE)?;
            let created = runner
                .create_one_off(vmid, name.as_deref(), description.as_deref(), &manual)
                .await?;

            match ctx.format {
                OutputFormat::Json => output::print_json(&serde_json::json!({
                    "vmid": vmid,
                    "created": created,
                }))?,
                OutputFormat::Table => {
                    output::success(format!("Created snapshot '{}' on VM {}", created, vmid))
                }
            }
        }

        SnapshotCommands::Delete { vmid, name } => {
            runner.delete_one(vmid, &name).await?;

            match ctx.format {
                OutputFormat::Json => output::print_json(&serde_json::json!({
                    "vmid": vmid,
                    "deleted": name,
                }))?,
                OutputFormat::Table => {
                    output::success(format!("Deleted snapshot '{}' from VM {}", name, vmid))
                }
            }
        }
    }

    Ok(())
}
