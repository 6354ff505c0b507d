//! Job management: normalize, render, register.

use super::artifact::read_node;
use super::registry::{JobRegistry, RegistryListing};
use super::{ArtifactGenerator, SnapshotJob};
use crate::config::SnapkeepConfig;
use crate::error::{Result, SnapError};
use crate::scheduling::Schedule;
use crate::snapshot::{JobRunner, RunReport};
use crate::types::{JobKey, KeepCount};
use tracing::info;

/// Front door for creating, listing and removing recurring jobs.
#[derive(Debug, Clone)]
pub struct JobManager {
    registry: JobRegistry,
}

impl JobManager {
    pub fn new(registry: JobRegistry) -> Self {
        Self { registry }
    }

    /// Manager over the paths and principal in `config`.
    pub fn from_config(config: &SnapkeepConfig) -> Self {
        let artifacts = ArtifactGenerator::new(
            &config.paths.jobs_dir,
            &config.paths.binary,
            &config.paths.log_file,
        )
        .with_delete_pause(config.job.delete_pause)
        .with_log_level(config.logging.level.as_str());
        Self::new(JobRegistry::new(
            &config.paths.cron_file,
            artifacts,
            &config.job.principal,
        ))
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Create or replace the job for `key`.
    ///
    /// The schedule is normalized before anything is written, so a bad
    /// schedule leaves both the artifact and the registry untouched.
    pub fn set_job(
        &self,
        key: JobKey,
        schedule_input: &str,
        keep: KeepCount,
        node: &str,
    ) -> Result<SnapshotJob> {
        let schedule = Schedule::normalize(schedule_input)?;
        let node = node.trim();
        if node.is_empty() {
            return Err(SnapError::Validation("node cannot be empty".into()));
        }

        let job = SnapshotJob {
            key,
            schedule,
            keep,
            node: node.to_string(),
        };

        let artifact = self.registry.artifacts().write(&job)?;
        let line = self.registry.schedule_line(&job.schedule, &job.key);
        self.registry.upsert(&job.key, &line)?;

        info!(
            job = %job.key,
            schedule = job.schedule.as_str(),
            keep = %job.keep,
            artifact = %artifact.display(),
            "Job set"
        );
        Ok(job)
    }

    pub fn list_jobs(&self) -> Result<RegistryListing> {
        self.registry.list()
    }

    /// Node recorded in `key`'s artifact, if the job exists and it is readable.
    pub fn job_node(&self, key: &JobKey) -> Option<String> {
        read_node(&self.registry.artifacts().path_for(key))
    }

    /// Unregister `key`. With `purge`, every snapshot of the job's namespace
    /// is deleted afterwards and the purge report returned.
    pub async fn remove_job(
        &self,
        key: &JobKey,
        purge: Option<&JobRunner>,
    ) -> Result<Option<RunReport>> {
        self.registry.remove(key)?;

        match purge {
            Some(runner) => {
                let report = runner.purge_namespace(key.vmid, &key.namespace).await?;
                Ok(Some(report))
            }
            None => Ok(None),
        }
    }
}
