use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

use crate::application::repos::{JobsRepo, RepoError};
use crate::cache::ArtifactCache;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub examined: usize,
    pub removed: usize,
    /// Unreadable records plus results whose deletion failed. Neither is
    /// removed, so a later run sees them again.
    pub failed: usize,
}

/// Delete terminal jobs last updated before `now - retention`.
///
/// Pending jobs are never touched. A job-scoped result goes first so a record
/// never points at a deleted artifact.
pub async fn prune_jobs<J>(
    jobs: &J,
    cache: &ArtifactCache,
    retention: Duration,
    now: OffsetDateTime,
) -> Result<PruneReport, RepoError>
where
    J: JobsRepo + ?Sized,
{
    let cutoff = now - retention;
    let mut report = PruneReport::default();

    for entry in jobs.list_jobs().await? {
        report.examined += 1;
        let job = match entry {
            Ok(job) => job,
            Err(err) => {
                warn!(
                    target = "application::jobs::retention",
                    op = "prune_jobs",
                    error = %err,
                    "Skipping unreadable job record"
                );
                report.failed += 1;
                continue;
            }
        };
        if !job.is_terminal() || job.updated_at >= cutoff {
            continue;
        }

        if let Some(result_ref) = job.result_ref.as_deref()
            && let Err(err) = cache.delete_result(result_ref).await
        {
            warn!(
                target = "application::jobs::retention",
                op = "prune_jobs",
                job_id = %job.id,
                error = %err,
                "Failed to delete job result; keeping record"
            );
            report.failed += 1;
            continue;
        }

        jobs.delete_job(&job.id).await?;
        report.removed += 1;
    }

    info!(
        target = "application::jobs::retention",
        op = "prune_jobs",
        examined = report.examined,
        removed = report.removed,
        failed = report.failed,
        "Job retention pass finished"
    );
    Ok(report)
}
