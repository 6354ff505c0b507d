//! Job artifact rendering.

use super::SnapshotJob;
use crate::config::humantime_serde::format_duration;
use crate::error::Result;
use crate::types::{JobKey, KeepCount, Namespace, VmId};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const FILE_PREFIX: &str = "snapkeep-";
const FILE_SUFFIX: &str = ".sh";

/// Renders and writes the executable script a registry line points at.
#[derive(Debug, Clone)]
pub struct ArtifactGenerator {
    jobs_dir: PathBuf,
    binary: PathBuf,
    log_path: PathBuf,
    delete_pause: Duration,
    log_level: String,
}

impl ArtifactGenerator {
    /// `binary` is the `snapkeep` executable the artifact calls; `log_path`
    /// is passed through so scheduled runs log where manual ones do. The
    /// deletion pause and log level start at `5s` and `info`.
    pub fn new(
        jobs_dir: impl Into<PathBuf>,
        binary: impl Into<PathBuf>,
        log_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            jobs_dir: jobs_dir.into(),
            binary: binary.into(),
            log_path: log_path.into(),
            delete_pause: Duration::from_secs(5),
            log_level: "info".to_string(),
        }
    }

    /// Pause between deletions baked into every script.
    pub fn with_delete_pause(mut self, pause: Duration) -> Self {
        self.delete_pause = pause;
        self
    }

    /// Log filter baked into every script.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Artifact location for a job identity.
    pub fn path_for(&self, key: &JobKey) -> PathBuf {
        self.jobs_dir
            .join(format!("{}{}-{}{}", FILE_PREFIX, key.vmid, key.namespace, FILE_SUFFIX))
    }

    /// Whether `path` is shaped like an artifact this generator would write,
    /// whether or not its identity parses.
    pub fn owns(&self, path: &Path) -> bool {
        path.parent() == Some(self.jobs_dir.as_path())
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(FILE_PREFIX) && n.ends_with(FILE_SUFFIX))
                .unwrap_or(false)
    }

    /// Script text for `job`. Every parameter is a literal; `job run` reads
    /// no config file and no environment.
    pub fn render(&self, job: &SnapshotJob) -> String {
        format!(
            "#!/bin/sh\n\
             # snapkeep job: vm {vmid} namespace {ns} (generated, do not edit)\n\
             exec {bin} job run --vmid {vmid} --namespace {qns} --keep {keep} --node {node} \
             --pause {pause} --log {log} --log-level {level}\n",
            vmid = job.key.vmid,
            ns = job.key.namespace,
            bin = shell_quote(&self.binary.to_string_lossy()),
            qns = shell_quote(job.key.namespace.as_str()),
            keep = job.keep,
            node = shell_quote(&job.node),
            pause = format_duration(self.delete_pause),
            log = shell_quote(&self.log_path.to_string_lossy()),
            level = shell_quote(&self.log_level),
        )
    }

    /// Write the artifact for `job`, replacing any previous one.
    pub fn write(&self, job: &SnapshotJob) -> Result<PathBuf> {
        fs::create_dir_all(&self.jobs_dir)?;

        let path = self.path_for(&job.key);
        let tmp_path = path.with_extension("sh.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(self.render(job).as_bytes())?;
            file.sync_all()?;
        }
        set_executable(&tmp_path)?;
        fs::rename(&tmp_path, &path)?;

        debug!(job = %job.key, path = %path.display(), "Wrote job artifact");
        Ok(path)
    }

    /// Delete the artifact for `key`. Returns whether a file was removed.
    pub fn remove(&self, key: &JobKey) -> Result<bool> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(job = %key, path = %path.display(), "Removed job artifact");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Quote `value` for a POSIX shell using single quotes.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Recover the job identity from an artifact file name such as
/// `snapkeep-101-nightly.sh`.
pub fn parse_artifact_file_name(file_name: &str) -> Option<JobKey> {
    let stem = file_name
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?;
    let (vmid, namespace) = stem.split_once('-')?;
    if !vmid.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(JobKey::new(
        vmid.parse::<VmId>().ok()?,
        Namespace::new(namespace).ok()?,
    ))
}

/// Best-effort read of the `--keep` literal baked into an artifact.
pub fn read_keep(path: &Path) -> Option<KeepCount> {
    read_literal(path, "--keep")?.parse().ok()
}

/// Best-effort read of the `--node` literal baked into an artifact.
pub fn read_node(path: &Path) -> Option<String> {
    read_literal(path, "--node").filter(|n| !n.is_empty())
}

fn read_literal(path: &Path, flag: &str) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    text.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .find_map(|line| {
            let mut tokens = line.split_whitespace();
            tokens.find(|t| *t == flag)?;
            Some(tokens.next()?.trim_matches('\'').to_string())
        })
}
