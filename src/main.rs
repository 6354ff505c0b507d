//! snapkeep - Main entry point.

use clap::Parser;
use snapkeep::cli::commands::job;
use snapkeep::cli::{output, Cli};
use snapkeep::config::{LoggingConfig, SnapkeepConfig};
use snapkeep::observability;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    // Job scripts carry every parameter, so a scheduled run never loads the
    // config file or its environment overrides
    let result = match cli.scheduled_run().cloned() {
        Some(run) => {
            let logging = LoggingConfig {
                level: cli
                    .log_level
                    .clone()
                    .unwrap_or_else(|| LoggingConfig::default().level),
            };
            if let Err(e) = observability::init(&logging, None, run.log_targets()) {
                output::warning(e);
            }
            job::run_scheduled(&run, cli.output).await
        }
        None => {
            let config = match SnapkeepConfig::load(Some(cli.config_path())) {
                Ok(config) => config,
                Err(e) => {
                    output::error(e);
                    std::process::exit(1);
                }
            };

            if let Err(e) = observability::init(
                &config.logging,
                cli.log_level.as_deref(),
                cli.log_targets(&config),
            ) {
                output::warning(e);
            }

            snapkeep::cli::execute(cli, config).await
        }
    };

    if let Err(e) = result {
        error!(error = %format!("{:#}", e), "Command failed");
        output::error(format!("{:#}", e));
        std::process::exit(1);
    }
}
