//! Logging for snapkeep.
//!
//! Manual commands and scheduled runs append to the same log file, so an
//! operator can follow one job's history in one place.

use crate::config::LoggingConfig;
use crate::error::{Result, SnapError};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogTargets<'a> {
    /// Append-mode log file shared by every invocation.
    pub file: Option<&'a Path>,
    /// Most verbose level echoed to stderr; `None` turns stderr off. Off for
    /// scheduled runs, whose stderr cron already appends to the log file.
    pub stderr: Option<LevelFilter>,
    /// Whether `RUST_LOG` may replace the level. Off for scheduled runs.
    pub use_env_filter: bool,
}

/// Initialize logging.
///
/// `RUST_LOG` (when the targets allow it) wins over `level_override`, which
/// wins over the configured level. A log file that cannot be opened degrades
/// to stderr only.
pub fn init(
    config: &LoggingConfig,
    level_override: Option<&str>,
    targets: LogTargets<'_>,
) -> Result<()> {
    let level = level_override.unwrap_or(&config.level);
    let filter = if targets.use_env_filter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let (file, open_error) = match targets.file.map(open_log) {
        Some(Ok(file)) => (Some(file), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };
    // Without a file, stderr is the only place left to report to
    let stderr = match (targets.stderr, &file) {
        (None, None) => Some(LevelFilter::TRACE),
        (level, _) => level,
    };

    let file_layer = file.map(|f| fmt::layer().with_ansi(false).with_writer(Mutex::new(f)));
    let stderr_layer = stderr.map(|level| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(level)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| SnapError::Config(format!("Failed to init logging: {}", e)))?;

    if let (Some(path), Some(e)) = (targets.file, open_error) {
        warn!(path = %path.display(), error = %e, "Log file unavailable, logging to stderr only");
    }
    info!(version = env!("CARGO_PKG_VERSION"), "snapkeep started");
    Ok(())
}

fn open_log(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_log_appends() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs/snapkeep.log");

        {
            use std::io::Write;
            let mut f = open_log(&path).unwrap();
            writeln!(f, "first").unwrap();
            let mut f = open_log(&path).unwrap();
            writeln!(f, "second").unwrap();
        }

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }
}
