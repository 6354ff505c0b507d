//! Recurring job management

use anyhow::{bail, Result};
use chrono::Local;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tabled::Tabled;

use crate::cli::output::{self, OutputFormat};
use crate::cli::Context;
use crate::config::humantime_serde::parse_duration;
use crate::gateway::QmGateway;
use crate::jobs::{RegistryEntry, SnapshotJob};
use crate::observability::LogTargets;
use crate::scheduling::Schedule;
use crate::snapshot::{JobRunner, RunReport, RunSpec};
use crate::types::{JobKey, KeepCount, Namespace, VmId};

#[derive(Args)]
pub struct JobArgs {
    #[command(subcommand)]
    command: JobCommands,
}

impl JobArgs {
    /// Parameters of a scheduled run, if this is one.
    pub fn scheduled_run(&self) -> Option<&RunArgs> {
        match &self.command {
            JobCommands::Run(run) => Some(run),
            _ => None,
        }
    }
}

/// Literals a job script passes to `job run`.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    #[arg(long)]
    pub vmid: VmId,

    #[arg(long)]
    pub namespace: Namespace,

    #[arg(long)]
    pub keep: KeepCount,

    #[arg(long)]
    pub node: String,

    /// Pause between deletions (`5s`, `250ms`)
    #[arg(long, value_parser = parse_duration, default_value = "5s")]
    pub pause: Duration,

    /// Log file to append to
    #[arg(long)]
    pub log: PathBuf,
}

impl RunArgs {
    /// File only; cron already appends the script's stderr to the same log.
    pub fn log_targets(&self) -> LogTargets<'_> {
        LogTargets {
            file: Some(self.log.as_path()),
            stderr: None,
            use_env_filter: false,
        }
    }
}

#[derive(Subcommand)]
enum JobCommands {
    /// Create or replace a recurring job
    Set {
        /// VM id
        vmid: VmId,

        /// Namespace naming every snapshot of this job
        namespace: Namespace,

        /// `M H DOM MON DOW`, an hour (`3` = daily at 03:00) or `D@H` (`0@2` = Sundays at 02:00)
        schedule: String,

        /// Snapshots to keep (defaults.keep if omitted)
        #[arg(long)]
        keep: Option<KeepCount>,

        /// Node the VM lives on (defaults.node if omitted)
        #[arg(long)]
        node: Option<String>,
    },

    /// List recurring jobs
    #[command(alias = "ls")]
    List,

    /// Remove a recurring job
    #[command(alias = "rm")]
    Delete {
        /// VM id
        vmid: VmId,

        /// Job namespace
        namespace: Namespace,

        /// Also delete every snapshot the job has taken
        #[arg(long)]
        purge_snapshots: bool,
    },

    /// Perform one scheduled run (called by job scripts)
    Run(RunArgs),
}

#[derive(Debug, Serialize, Tabled)]
struct JobRow {
    #[tabled(rename = "VMID")]
    vmid: u32,
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Schedule")]
    schedule: String,
    #[tabled(rename = "Keep")]
    keep: String,
    #[tabled(rename = "Next run")]
    next_run: String,
    #[tabled(rename = "Script")]
    script: String,
}

impl From<&RegistryEntry> for JobRow {
    fn from(e: &RegistryEntry) -> Self {
        Self {
            vmid: e.key.vmid.get(),
            namespace: e.key.namespace.to_string(),
            schedule: e.schedule.to_string(),
            keep: e
                .keep
                .map(|k| k.to_string())
                .unwrap_or_else(|| "?".to_string()),
            next_run: next_local_run(&e.schedule),
            script: if e.artifact_missing {
                format!("{} (file missing)", e.artifact.display())
            } else {
                e.artifact.display().to_string()
            },
        }
    }
}

/// cron fires on host-local wall-clock time.
fn next_local_run(schedule: &Schedule) -> String {
    let wall_clock = Local::now().naive_local().and_utc();
    schedule
        .next_run(&wall_clock)
        .map(|t| t.naive_utc().format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[derive(Serialize)]
struct JobListing<'a> {
    jobs: &'a [RegistryEntry],
    corrupt: Vec<String>,
}

pub async fn execute(args: JobArgs, ctx: &Context) -> Result<()> {
    match args.command {
        JobCommands::Set {
            vmid,
            namespace,
            schedule,
            keep,
            node,
        } => {
            let keep = match keep {
                Some(k) => k,
                None => ctx.config.default_keep()?,
            };
            let node = node.unwrap_or_else(|| ctx.config.defaults.node.clone());
            let job = ctx
                .jobs()
                .set_job(JobKey::new(vmid, namespace), &schedule, keep, &node)?;
            print_job(&job, ctx.format)?;
        }

        JobCommands::List => {
            let listing = ctx.jobs().list_jobs()?;
            match ctx.format {
                OutputFormat::Json => output::print_json(&JobListing {
                    jobs: &listing.entries,
                    corrupt: listing.corrupt.iter().map(ToString::to_string).collect(),
                })?,
                OutputFormat::Table => {
                    let rows: Vec<JobRow> = listing.entries.iter().map(Into::into).collect();
                    output::print_output(&rows, ctx.format)?;
                    for problem in &listing.corrupt {
                        output::warning(problem);
                    }
                }
            }
        }

        JobCommands::Delete {
            vmid,
            namespace,
            purge_snapshots,
        } => {
            let key = JobKey::new(vmid, namespace);
            let runner = purge_snapshots.then(|| {
                let node = ctx
                    .jobs()
                    .job_node(&key)
                    .unwrap_or_else(|| ctx.config.defaults.node.clone());
                ctx.runner(&node)
            });
            let report = ctx.jobs().remove_job(&key, runner.as_ref()).await?;

            match ctx.format {
                OutputFormat::Json => output::print_json(&serde_json::json!({
                    "removed": key,
                    "purge": report,
                }))?,
                OutputFormat::Table => {
                    output::success(format!("Removed job {}", key));
                    if let Some(report) = &report {
                        print_report(report);
                    }
                }
            }
            if let Some(report) = &report {
                check_report(report)?;
            }
        }

        JobCommands::Run(run) => run_scheduled(&run, ctx.format).await?,
    }

    Ok(())
}

/// One scheduled run, driven only by the literals in `args`.
pub async fn run_scheduled(args: &RunArgs, format: OutputFormat) -> Result<()> {
    let gateway = Arc::new(QmGateway::new(args.node.as_str()));
    let runner = JobRunner::new(gateway, args.pause);
    let run = RunSpec::new(JobKey::new(args.vmid, args.namespace.clone()), args.keep);
    let report = runner.run(&run).await?;

    match format {
        OutputFormat::Json => output::print_json(&report)?,
        OutputFormat::Table => print_report(&report),
    }
    check_report(&report)
}

fn print_job(job: &SnapshotJob, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => output::print_json(job),
        OutputFormat::Table => {
            output::success(format!("Job {} scheduled", job.key));
            output::print_kv("Schedule", &job.schedule);
            output::print_kv("Keep", job.keep);
            output::print_kv("Node", &job.node);
            Ok(())
        }
    }
}

fn print_report(report: &RunReport) {
    if let Some(created) = &report.created {
        output::success(format!("Created {}", created));
    }
    for name in &report.deleted {
        output::success(format!("Deleted {}", name));
    }
    for (name, reason) in &report.failures {
        output::error(format!("Failed to delete {}: {}", name, reason));
    }
}

fn check_report(report: &RunReport) -> Result<()> {
    if !report.is_success() {
        bail!(
            "{} of {} deletions failed",
            report.failures.len(),
            report.pruned.len()
        );
    }
    Ok(())
}
