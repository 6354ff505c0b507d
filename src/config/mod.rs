//! Configuration module for snapkeep.
//!
//! Configuration is a TOML file, `/etc/snapkeep/config.toml` by default. A
//! missing file means "all defaults"; a present but unreadable one is an
//! error. `SNAPKEEP_NODE` and `SNAPKEEP_KEEP` override the defaults section.

use crate::error::{Result, SnapError};
use crate::types::KeepCount;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/snapkeep/config.toml";

/// Main configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapkeepConfig {
    /// Values used when the operator does not give one.
    pub defaults: DefaultsConfig,
    /// Filesystem locations.
    pub paths: PathsConfig,
    /// Scheduled run behavior.
    pub job: JobConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl SnapkeepConfig {
    /// Load from `path` (or the default location), then apply environment
    /// overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, without environment overrides.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SnapError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            SnapError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Persist to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(node) = std::env::var("SNAPKEEP_NODE") {
            self.defaults.node = node;
        }
        if let Ok(keep) = std::env::var("SNAPKEEP_KEEP") {
            let keep: KeepCount = keep
                .parse()
                .map_err(|e| SnapError::Config(format!("SNAPKEEP_KEEP: {}", e)))?;
            self.defaults.keep = keep.get();
        }
        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.defaults.keep == 0 {
            return Err(SnapError::Config("defaults.keep must be at least 1".into()));
        }
        if self.defaults.node.trim().is_empty() {
            return Err(SnapError::Config("defaults.node cannot be empty".into()));
        }
        if self.job.principal.trim().is_empty() {
            return Err(SnapError::Config("job.principal cannot be empty".into()));
        }
        // Registry lines are split on whitespace
        for (key, value) in [
            ("job.principal", self.job.principal.as_str()),
            ("paths.jobs_dir", &*self.paths.jobs_dir.to_string_lossy()),
            ("paths.log_file", &*self.paths.log_file.to_string_lossy()),
        ] {
            if value.chars().any(char::is_whitespace) {
                return Err(SnapError::Config(format!(
                    "{} cannot contain whitespace: '{}'",
                    key, value
                )));
            }
        }
        Ok(())
    }

    /// The default keep count as a validated value.
    pub fn default_keep(&self) -> Result<KeepCount> {
        KeepCount::new(self.defaults.keep)
            .map_err(|_| SnapError::Config("defaults.keep must be at least 1".into()))
    }
}

/// Operator defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Hypervisor node jobs are created for.
    pub node: String,
    /// Snapshots kept per job.
    pub keep: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            node: local_hostname(),
            keep: 7,
        }
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where job artifacts are written.
    pub jobs_dir: PathBuf,
    /// cron.d file holding the job registry.
    pub cron_file: PathBuf,
    /// Log shared by manual commands and scheduled runs.
    pub log_file: PathBuf,
    /// `snapkeep` executable that artifacts call.
    pub binary: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            jobs_dir: PathBuf::from("/var/lib/snapkeep/jobs"),
            cron_file: PathBuf::from("/etc/cron.d/snapkeep"),
            log_file: PathBuf::from("/var/log/snapkeep.log"),
            binary: std::env::current_exe()
                .unwrap_or_else(|_| PathBuf::from("/usr/local/bin/snapkeep")),
        }
    }
}

/// Scheduled run behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// User column of registry lines.
    pub principal: String,
    /// Pause between consecutive deletions on one VM.
    #[serde(with = "humantime_serde")]
    pub delete_pause: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            principal: "root".to_string(),
            delete_pause: Duration::from_secs(5),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn local_hostname() -> String {
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Serde helper for Duration using humantime format.
pub mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*duration))
    }

    /// Whole seconds as `5s`, anything else as milliseconds.
    pub fn format_duration(duration: Duration) -> String {
        if duration.subsec_millis() == 0 && duration.as_secs() > 0 {
            format!("{}s", duration.as_secs())
        } else {
            format!("{}ms", duration.as_millis())
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    /// `250ms`, `5s`, `1m`; a bare number is milliseconds.
    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let parsed = if let Some(ms) = s.strip_suffix("ms") {
            ms.trim().parse::<u64>().map(Duration::from_millis)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim().parse::<u64>().map(Duration::from_secs)
        } else if let Some(m) = s.strip_suffix('m') {
            m.trim().parse::<u64>().map(|v| Duration::from_secs(v * 60))
        } else {
            s.parse::<u64>().map(Duration::from_millis)
        };
        parsed.map_err(|e| format!("invalid duration '{}': {}", s, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SnapkeepConfig::default();
        assert_eq!(config.defaults.keep, 7);
        assert_eq!(config.job.principal, "root");
        assert_eq!(config.job.delete_pause, Duration::from_secs(5));
        assert_eq!(config.paths.cron_file, PathBuf::from("/etc/cron.d/snapkeep"));
        assert!(!config.defaults.node.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[defaults]\nnode = \"pve2\"\n\n[job]\ndelete_pause = \"250ms\"\n",
        )
        .unwrap();

        let config = SnapkeepConfig::from_file(&path).unwrap();
        assert_eq!(config.defaults.node, "pve2");
        assert_eq!(config.defaults.keep, 7);
        assert_eq!(config.job.delete_pause, Duration::from_millis(250));
        assert_eq!(config.job.principal, "root");
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = SnapkeepConfig::default();
        config.defaults.node = "pve9".to_string();
        config.defaults.keep = 4;
        config.save(&path).unwrap();

        let loaded = SnapkeepConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_validate_rejects_zero_keep() {
        let mut config = SnapkeepConfig::default();
        config.defaults.keep = 0;
        assert!(matches!(config.validate(), Err(SnapError::Config(_))));
        assert!(config.default_keep().is_err());
    }

    #[test]
    fn test_validate_rejects_whitespace_in_registry_paths() {
        let mut config = SnapkeepConfig::default();
        config.paths.jobs_dir = PathBuf::from("/srv/snap jobs");
        assert!(matches!(config.validate(), Err(SnapError::Config(m)) if m.contains("paths.jobs_dir")));

        let mut config = SnapkeepConfig::default();
        config.paths.log_file = PathBuf::from("/var/log/snap keep.log");
        assert!(matches!(config.validate(), Err(SnapError::Config(m)) if m.contains("paths.log_file")));

        let mut config = SnapkeepConfig::default();
        config.job.principal = "backup user".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unparsable_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "defaults = [").unwrap();
        assert!(matches!(
            SnapkeepConfig::from_file(&path),
            Err(SnapError::Config(_))
        ));
    }

    #[test]
    fn test_parse_duration() {
        use humantime_serde::parse_duration;
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_format_duration() {
        use humantime_serde::{format_duration, parse_duration};
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::ZERO), "0ms");
        let pause = Duration::from_millis(250);
        assert_eq!(parse_duration(&format_duration(pause)).unwrap(), pause);
    }
}
