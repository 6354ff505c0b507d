//! Command-line interface for snapkeep.
//!
//! Every command is a thin adapter over a library call: parse arguments,
//! call into [`crate::snapshot`] or [`crate::jobs`], print the result.

pub mod commands;
pub mod output;

use crate::config::{SnapkeepConfig, DEFAULT_CONFIG_PATH};
use crate::gateway::QmGateway;
use crate::jobs::JobManager;
use crate::observability::LogTargets;
use crate::snapshot::JobRunner;
use crate::types::{Resource, VmId};
use clap::{Parser, Subcommand};
use commands::{config as config_cmd, job, snapshot, vm};
use output::OutputFormat;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;

/// snapkeep - recurring, retention-bounded VM snapshots for Proxmox VE.
#[derive(Parser)]
#[command(name = "snapkeep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SNAPKEEP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "SNAPKEEP_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Echo log records to stderr, not just warnings
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// List virtual machines known to the cluster
    Vms,

    /// One-off snapshot operations
    #[command(alias = "snap")]
    Snapshots(snapshot::SnapshotArgs),

    /// Recurring snapshot jobs
    Job(job::JobArgs),

    /// Configuration management
    Config(config_cmd::ConfigArgs),

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Cli {
    pub fn config_path(&self) -> &Path {
        self.config
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH))
    }

    /// The literals of `job run`, if this invocation is a scheduled run.
    /// Such a run loads no configuration at all.
    pub fn scheduled_run(&self) -> Option<&job::RunArgs> {
        match &self.command {
            Commands::Job(args) => args.scheduled_run(),
            _ => None,
        }
    }

    /// Where an interactive invocation should log.
    pub fn log_targets<'a>(&self, config: &'a SnapkeepConfig) -> LogTargets<'a> {
        match &self.command {
            Commands::Completion { .. } => LogTargets {
                file: None,
                stderr: Some(LevelFilter::ERROR),
                use_env_filter: true,
            },
            _ => LogTargets {
                file: Some(config.paths.log_file.as_path()),
                stderr: Some(if self.verbose {
                    LevelFilter::TRACE
                } else {
                    LevelFilter::WARN
                }),
                use_env_filter: true,
            },
        }
    }
}

/// What a command needs from the environment.
pub struct Context {
    pub config: SnapkeepConfig,
    pub config_path: PathBuf,
    pub format: OutputFormat,
}

impl Context {
    /// Runner backed by the `qm` tools, talking about VMs on `node`.
    pub fn runner(&self, node: &str) -> JobRunner {
        JobRunner::new(Arc::new(QmGateway::new(node)), self.config.job.delete_pause)
    }

    /// Runner for the configured default node.
    pub fn default_runner(&self) -> JobRunner {
        self.runner(&self.config.defaults.node)
    }

    /// Runner for the node `vmid` lives on, per the cluster resource list.
    /// Falls back to the default node when the VM cannot be located.
    pub async fn runner_for(&self, vmid: VmId) -> JobRunner {
        let default = self.default_runner();
        let located = default.gateway().list_resources().await;
        match located {
            Ok(resources) => match node_of(&resources, vmid) {
                Some(node) if node != self.config.defaults.node => self.runner(node),
                _ => default,
            },
            Err(e) => {
                debug!(%vmid, error = %e, "Cannot locate VM, using the default node");
                default
            }
        }
    }

    pub fn jobs(&self) -> JobManager {
        JobManager::from_config(&self.config)
    }
}

fn node_of(resources: &[Resource], vmid: VmId) -> Option<&str> {
    resources
        .iter()
        .find(|r| r.id == vmid)
        .map(|r| r.node.as_str())
        .filter(|n| !n.is_empty())
}

/// Execute the parsed command.
pub async fn execute(cli: Cli, config: SnapkeepConfig) -> anyhow::Result<()> {
    let ctx = Context {
        config_path: cli.config_path().to_path_buf(),
        config,
        format: cli.output,
    };

    match cli.command {
        Commands::Vms => vm::execute(&ctx).await,
        Commands::Snapshots(args) => snapshot::execute(args, &ctx).await,
        Commands::Job(args) => job::execute(args, &ctx).await,
        Commands::Config(args) => config_cmd::execute(args, &ctx),
        Commands::Completion { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::generate(shell, &mut cmd, "snapkeep", &mut std::io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{ArtifactGenerator, SnapshotJob};
    use crate::scheduling::Schedule;
    use crate::types::{JobKey, KeepCount, Namespace};
    use clap::CommandFactory;
    use crate::cli::commands::job::RunArgs;
    use std::time::Duration;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    /// Split a generated `exec` line the way `/bin/sh` would, for the
    /// single-quoted words the job scripts use.
    fn shell_words(line: &str) -> Vec<String> {
        let mut words = Vec::new();
        let mut word: Option<String> = None;
        let mut quoted = false;
        let mut chars = line.chars();
        while let Some(c) = chars.next() {
            match c {
                '\'' => {
                    quoted = !quoted;
                    word.get_or_insert_with(String::new);
                }
                '\\' if !quoted => {
                    if let Some(next) = chars.next() {
                        word.get_or_insert_with(String::new).push(next);
                    }
                }
                c if c.is_whitespace() && !quoted => {
                    if let Some(w) = word.take() {
                        words.push(w);
                    }
                }
                c => word.get_or_insert_with(String::new).push(c),
            }
        }
        words.extend(word);
        words
    }

    fn rendered_run(job: &SnapshotJob, artifacts: &ArtifactGenerator) -> Cli {
        let script = artifacts.render(job);
        let exec = script
            .lines()
            .find_map(|l| l.strip_prefix("exec "))
            .unwrap();
        let mut argv = shell_words(exec);
        argv[0] = "snapkeep".to_string();
        Cli::try_parse_from(argv).unwrap()
    }

    fn nightly(node: &str) -> SnapshotJob {
        SnapshotJob {
            key: JobKey::new(VmId::new(101).unwrap(), Namespace::new("nightly").unwrap()),
            schedule: Schedule::normalize("2").unwrap(),
            keep: KeepCount::new(3).unwrap(),
            node: node.to_string(),
        }
    }

    #[test]
    fn test_shell_words() {
        assert_eq!(
            shell_words(r"'/opt/snap keep' run --node 'it'\''s' --keep 3"),
            vec!["/opt/snap keep", "run", "--node", "it's", "--keep", "3"]
        );
    }

    #[test]
    fn test_rendered_script_parses_as_scheduled_run() {
        let artifacts = ArtifactGenerator::new("/jobs", "/opt/snap keep/snapkeep", "/var/log/snapkeep.log")
            .with_delete_pause(Duration::from_millis(1500))
            .with_log_level("debug");
        let cli = rendered_run(&nightly("pve2"), &artifacts);

        assert_eq!(
            cli.scheduled_run(),
            Some(&RunArgs {
                vmid: VmId::new(101).unwrap(),
                namespace: Namespace::new("nightly").unwrap(),
                keep: KeepCount::new(3).unwrap(),
                node: "pve2".to_string(),
                pause: Duration::from_millis(1500),
                log: PathBuf::from("/var/log/snapkeep.log"),
            })
        );
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_scheduled_run_logs_to_its_own_file_only() {
        let artifacts = ArtifactGenerator::new("/jobs", "/usr/local/bin/snapkeep", "/tmp/snapkeep-test.log");
        let cli = rendered_run(&nightly("pve1"), &artifacts);
        let run = cli.scheduled_run().unwrap();

        let targets = run.log_targets();
        assert_eq!(targets.file, Some(Path::new("/tmp/snapkeep-test.log")));
        assert_eq!(targets.stderr, None);
        assert!(!targets.use_env_filter);
    }

    #[test]
    fn test_run_pause_defaults_for_older_scripts() {
        let cli = Cli::try_parse_from([
            "snapkeep", "job", "run", "--vmid", "101", "--namespace", "nightly", "--keep", "3",
            "--node", "pve1", "--log", "/tmp/snapkeep-test.log",
        ])
        .unwrap();
        assert_eq!(cli.scheduled_run().unwrap().pause, Duration::from_secs(5));
    }

    #[test]
    fn test_node_of() {
        let resource = |id: u32, node: &str| Resource {
            id: VmId::new(id).unwrap(),
            name: String::new(),
            status: "running".to_string(),
            node: node.to_string(),
        };
        let resources = vec![resource(101, "pve1"), resource(205, "pve2"), resource(300, "")];

        assert_eq!(node_of(&resources, VmId::new(205).unwrap()), Some("pve2"));
        assert_eq!(node_of(&resources, VmId::new(300).unwrap()), None);
        assert_eq!(node_of(&resources, VmId::new(999).unwrap()), None);
    }

    #[test]
    fn test_interactive_commands_log_to_configured_file() {
        let cli = Cli::parse_from(["snapkeep", "job", "list"]);
        assert!(cli.scheduled_run().is_none());
        let config = SnapkeepConfig::default();
        let targets = cli.log_targets(&config);
        assert_eq!(targets.file, Some(config.paths.log_file.as_path()));
        assert_eq!(targets.stderr, Some(LevelFilter::WARN));
        assert!(targets.use_env_filter);
    }

    #[test]
    fn test_rejects_invalid_vmid_before_running() {
        assert!(Cli::try_parse_from(["snapkeep", "snapshots", "list", "0"]).is_err());
        assert!(Cli::try_parse_from(["snapkeep", "snapshots", "list", "abc"]).is_err());
    }
}
