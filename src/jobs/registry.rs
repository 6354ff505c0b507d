//! cron.d-backed job registry.
//!
//! The registry file is shared with whatever else the operator keeps there.
//! Only lines that point at one of our artifacts are ever touched; blank
//! lines, comments, environment assignments and foreign entries survive every
//! rewrite verbatim and in place.

use super::artifact::{parse_artifact_file_name, read_keep, ArtifactGenerator};
use crate::error::{Result, SnapError};
use crate::scheduling::Schedule;
use crate::types::{JobKey, KeepCount};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const HEADER: &str = "# snapkeep recurring snapshot jobs. Lines pointing at snapkeep job scripts are managed by `snapkeep job`.";

/// One recurring job recovered from the registry.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryEntry {
    pub key: JobKey,
    pub schedule: Schedule,
    /// Read back from the artifact; `None` when it could not be recovered.
    pub keep: Option<KeepCount>,
    pub artifact: PathBuf,
    /// The registry line exists but its artifact does not.
    pub artifact_missing: bool,
    /// 1-based line in the registry file.
    pub line_no: usize,
}

/// Result of [`JobRegistry::list`]: the parsed entries plus one
/// [`SnapError::RegistryCorruption`] per line that could not be parsed.
#[derive(Debug, Default)]
pub struct RegistryListing {
    pub entries: Vec<RegistryEntry>,
    pub corrupt: Vec<SnapError>,
}

/// Key-value view over a cron.d file, keyed by artifact path.
#[derive(Debug, Clone)]
pub struct JobRegistry {
    cron_file: PathBuf,
    artifacts: ArtifactGenerator,
    principal: String,
}

impl JobRegistry {
    /// `principal` is the user column of every line written.
    pub fn new(
        cron_file: impl Into<PathBuf>,
        artifacts: ArtifactGenerator,
        principal: impl Into<String>,
    ) -> Self {
        Self {
            cron_file: cron_file.into(),
            artifacts,
            principal: principal.into(),
        }
    }

    pub fn artifacts(&self) -> &ArtifactGenerator {
        &self.artifacts
    }

    /// Registry line that fires `key`'s artifact on `schedule`.
    pub fn schedule_line(&self, schedule: &Schedule, key: &JobKey) -> String {
        format!(
            "{} {} {} >/dev/null 2>>{}",
            schedule.as_str(),
            self.principal,
            self.artifacts.path_for(key).display(),
            self.artifacts.log_path().display()
        )
    }

    /// Replace every line for `key` with `line`, appended at the end.
    pub fn upsert(&self, key: &JobKey, line: &str) -> Result<()> {
        let artifact = self.artifacts.path_for(key);
        let mut lines = self.read_lines()?;
        let before = lines.len();
        lines.retain(|l| !references(l, &artifact));
        let replaced = before - lines.len();

        if lines.is_empty() {
            lines.push(HEADER.to_string());
        }
        lines.push(line.to_string());
        self.write_lines(&lines)?;

        info!(job = %key, replaced, "Registered job");
        Ok(())
    }

    /// Drop every line for `key` and delete its artifact.
    pub fn remove(&self, key: &JobKey) -> Result<()> {
        let artifact = self.artifacts.path_for(key);
        let mut lines = self.read_lines()?;
        let before = lines.len();
        lines.retain(|l| !references(l, &artifact));

        if lines.len() == before {
            return Err(SnapError::NotFound(format!("job {}", key)));
        }
        self.write_lines(&lines)?;

        if !self.artifacts.remove(key)? {
            warn!(job = %key, path = %artifact.display(), "Job artifact was already gone");
        }
        info!(job = %key, "Unregistered job");
        Ok(())
    }

    /// Parse every line that points at one of our artifacts.
    ///
    /// Unparsable lines are skipped and reported in
    /// [`RegistryListing::corrupt`]; this never fails on content.
    pub fn list(&self) -> Result<RegistryListing> {
        let mut listing = RegistryListing::default();

        for (idx, line) in self.read_lines()?.iter().enumerate() {
            let line_no = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || is_env_assignment(trimmed) {
                continue;
            }
            if !trimmed
                .split_whitespace()
                .any(|t| self.artifacts.owns(Path::new(t)))
            {
                continue;
            }

            match self.parse_entry(trimmed, line_no) {
                Ok(entry) => listing.entries.push(entry),
                Err(reason) => {
                    warn!(line_no, %reason, "Skipping unreadable registry line");
                    listing
                        .corrupt
                        .push(SnapError::RegistryCorruption { line_no, reason });
                }
            }
        }

        debug!(
            entries = listing.entries.len(),
            corrupt = listing.corrupt.len(),
            "Read job registry"
        );
        Ok(listing)
    }

    fn parse_entry(&self, line: &str, line_no: usize) -> std::result::Result<RegistryEntry, String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 7 || !self.artifacts.owns(Path::new(tokens[6])) {
            return Err("expected five schedule fields, a user and a job script".to_string());
        }

        let schedule = Schedule::normalize(&tokens[..5].join(" ")).map_err(|e| e.to_string())?;

        let artifact = PathBuf::from(tokens[6]);
        let key = artifact
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_artifact_file_name)
            .ok_or_else(|| format!("cannot recover a job identity from '{}'", tokens[6]))?;

        let artifact_missing = !artifact.is_file();
        Ok(RegistryEntry {
            keep: if artifact_missing { None } else { read_keep(&artifact) },
            key,
            schedule,
            artifact,
            artifact_missing,
            line_no,
        })
    }

    fn read_lines(&self) -> Result<Vec<String>> {
        match fs::read_to_string(&self.cron_file) {
            Ok(text) => Ok(text.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_lines(&self, lines: &[String]) -> Result<()> {
        let dir = match self.cron_file.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        // cron skips file names containing a dot, so the temp file is inert
        let file_name = self
            .cron_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapkeep".to_string());
        let tmp_path = dir.join(format!(".{}.tmp", file_name));

        let mut text = lines.join("\n");
        // cron ignores a final line without a newline
        text.push('\n');
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(text.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.cron_file)?;
        Ok(())
    }
}

/// Whether a registry line invokes exactly `artifact`.
fn references(line: &str, artifact: &Path) -> bool {
    line.split_whitespace().any(|t| Path::new(t) == artifact)
}

fn is_env_assignment(line: &str) -> bool {
    match line.split_once('=') {
        Some((name, _)) => {
            !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Namespace, VmId};
    use tempfile::TempDir;

    fn key(vmid: u32, ns: &str) -> JobKey {
        JobKey::new(VmId::new(vmid).unwrap(), Namespace::new(ns).unwrap())
    }

    fn registry(dir: &TempDir) -> JobRegistry {
        let artifacts = ArtifactGenerator::new(
            dir.path().join("jobs"),
            "/usr/local/bin/snapkeep",
            "/var/log/snapkeep.log",
        );
        JobRegistry::new(dir.path().join("cron.d/snapkeep"), artifacts, "root")
    }

    #[test]
    fn test_schedule_line() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        let line = reg.schedule_line(&Schedule::normalize("3").unwrap(), &key(101, "nightly"));
        assert_eq!(
            line,
            format!(
                "0 3 * * * root {}/jobs/snapkeep-101-nightly.sh >/dev/null 2>>/var/log/snapkeep.log",
                dir.path().display()
            )
        );
    }

    #[test]
    fn test_missing_file_lists_empty() {
        let dir = TempDir::new().unwrap();
        let listing = registry(&dir).list().unwrap();
        assert!(listing.entries.is_empty());
        assert!(listing.corrupt.is_empty());
    }

    #[test]
    fn test_upsert_replaces() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        let k = key(101, "nightly");

        reg.upsert(&k, &reg.schedule_line(&Schedule::normalize("2").unwrap(), &k))
            .unwrap();
        reg.upsert(&k, &reg.schedule_line(&Schedule::normalize("0@4").unwrap(), &k))
            .unwrap();

        let listing = reg.list().unwrap();
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(listing.entries[0].schedule.as_str(), "0 4 * * 0");
        // No artifact was written in this test
        assert!(listing.entries[0].artifact_missing);
        assert_eq!(listing.entries[0].keep, None);
    }

    #[test]
    fn test_remove_unknown_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = registry(&dir).remove(&key(1, "x")).unwrap_err();
        assert!(matches!(err, SnapError::NotFound(_)));
    }

    #[test]
    fn test_oversized_step_is_recorded_as_corrupt() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        let jobs = dir.path().join("jobs");
        fs::create_dir_all(dir.path().join("cron.d")).unwrap();
        fs::write(
            dir.path().join("cron.d/snapkeep"),
            format!(
                "1/4294967295 * * * * root {0}/snapkeep-101-nightly.sh\n\
                 0 2 * * * root {0}/snapkeep-102-nightly.sh\n",
                jobs.display()
            ),
        )
        .unwrap();

        let listing = reg.list().unwrap();
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(listing.entries[0].line_no, 2);
        assert!(matches!(
            listing.corrupt.as_slice(),
            [SnapError::RegistryCorruption { line_no: 1, .. }]
        ));
    }

    #[test]
    fn test_references_is_exact() {
        let line = "0 3 * * * root /jobs/snapkeep-101-nightly.sh >/dev/null";
        assert!(references(line, Path::new("/jobs/snapkeep-101-nightly.sh")));
        assert!(!references(line, Path::new("/jobs/snapkeep-10-nightly.sh")));
        assert!(!references(line, Path::new("/jobs/snapkeep-101-night.sh")));
    }

    #[test]
    fn test_env_assignment() {
        assert!(is_env_assignment("MAILTO=\"\""));
        assert!(is_env_assignment("PATH=/usr/sbin:/usr/bin"));
        assert!(!is_env_assignment("0 3 * * * root /x.sh 2>>/log"));
    }
}
