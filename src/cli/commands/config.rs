//! Configuration management commands

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::output::{self, OutputFormat};
use crate::cli::Context;
use crate::config::SnapkeepConfig;
use crate::types::KeepCount;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Change operator defaults
    Set {
        /// Default node for new jobs
        #[arg(long)]
        node: Option<String>,

        /// Default keep count for new jobs
        #[arg(long)]
        keep: Option<KeepCount>,
    },

    /// Show configuration file path
    Path,
}

pub fn execute(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommands::Show => {
            let config = &ctx.config;
            if ctx.format == OutputFormat::Json {
                return output::print_json(config);
            }

            output::print_header("Current Configuration");
            output::print_kv("Default node", &config.defaults.node);
            output::print_kv("Default keep", config.defaults.keep);
            output::print_kv("Jobs directory", config.paths.jobs_dir.display());
            output::print_kv("Registry", config.paths.cron_file.display());
            output::print_kv("Log file", config.paths.log_file.display());
            output::print_kv("Binary", config.paths.binary.display());
            output::print_kv("Run as", &config.job.principal);
            output::print_kv(
                "Delete pause",
                format!("{}ms", config.job.delete_pause.as_millis()),
            );
            output::print_kv("Log level", &config.logging.level);
        }

        ConfigCommands::Set { node, keep } => {
            if node.is_none() && keep.is_none() {
                output::warning("Nothing to change; pass --node and/or --keep");
                return Ok(());
            }

            // Start from the file itself so environment overrides are not persisted
            let mut config = if ctx.config_path.exists() {
                SnapkeepConfig::from_file(&ctx.config_path)?
            } else {
                SnapkeepConfig::default()
            };
            if let Some(node) = node {
                config.defaults.node = node;
            }
            if let Some(keep) = keep {
                config.defaults.keep = keep.get();
            }
            config.save(&ctx.config_path)?;

            output::success(format!("Saved {}", ctx.config_path.display()));
        }

        ConfigCommands::Path => {
            println!("{}", ctx.config_path.display());
        }
    }

    Ok(())
}
