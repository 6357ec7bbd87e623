use std::time::Duration;

use metrics::counter;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

use crate::{
    application::repos::{FinishJobParams, JobOutcome, JobsRepo, NewJobRecord, RepoError},
    cache::CacheKey,
    domain::{descriptor::RequestDescriptor, entities::JobRecord},
};

use super::launcher::JobLauncher;

const SOURCE: &str = "application::jobs::queue";
const METRIC_JOBS_CREATED: &str = "dailyoffice_jobs_created_total";
const METRIC_JOBS_FINISHED: &str = "dailyoffice_jobs_finished_total";
const DEFAULT_WAIT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Record a Pending job for `descriptor` and hand it to `launcher`.
///
/// Returns as soon as the record exists and the launcher accepted the id. If
/// the launcher refuses, the job is failed immediately so pollers do not wait
/// on work that will never start.
pub async fn enqueue_job<J, L>(
    jobs: &J,
    launcher: &L,
    descriptor: RequestDescriptor,
    key: &CacheKey,
) -> Result<JobRecord, RepoError>
where
    J: JobsRepo + ?Sized,
    L: JobLauncher + ?Sized,
{
    let job = jobs
        .create_job(NewJobRecord {
            params: descriptor,
            target_key: key.to_string(),
        })
        .await?;
    counter!(METRIC_JOBS_CREATED).increment(1);

    match launcher.launch(&job.id).await {
        Ok(()) => {
            info!(
                target = SOURCE,
                op = "enqueue_job",
                job_id = %job.id,
                key = %key,
                result = "launched",
                "Generation job accepted"
            );
            Ok(job)
        }
        Err(err) => {
            warn!(
                target = SOURCE,
                op = "enqueue_job",
                job_id = %job.id,
                key = %key,
                result = "launch_failed",
                error = %err,
                "Failed to launch generation job"
            );
            let failed = jobs
                .finish_job(FinishJobParams {
                    id: job.id.clone(),
                    outcome: JobOutcome::Failed {
                        error: err.to_string(),
                    },
                })
                .await?;
            counter!(METRIC_JOBS_FINISHED, "status" => failed.status.as_str()).increment(1);
            Ok(failed)
        }
    }
}

/// Poll until the job leaves Pending or the timeout elapses.
pub async fn wait_for_job_completion<J>(
    jobs: &J,
    job_id: &str,
    timeout: Duration,
) -> Result<JobRecord, RepoError>
where
    J: JobsRepo + ?Sized,
{
    let deadline = Instant::now() + timeout;

    loop {
        let job = jobs
            .find_job(job_id)
            .await?
            .ok_or_else(|| RepoError::NotFound {
                id: job_id.to_string(),
            })?;

        if job.is_terminal() {
            return Ok(job);
        }

        if Instant::now() >= deadline {
            return Err(RepoError::from_persistence(format!(
                "job `{job_id}` still pending after {timeout:?}"
            )));
        }

        sleep(DEFAULT_WAIT_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::Month;

    use super::*;
    use crate::application::testing::{ManualLauncher, RecordingStore};
    use crate::cache::derive_key;
    use crate::domain::types::{JobStatus, PrayerKind};
    use crate::infra::jobs::BlobJobRegistry;

    fn descriptor() -> RequestDescriptor {
        RequestDescriptor::monthly(PrayerKind::Morning, 2025, Month::December)
    }

    #[tokio::test]
    async fn enqueue_creates_pending_job_and_launches_it() {
        let jobs = BlobJobRegistry::new(Arc::new(RecordingStore::default()));
        let launcher = ManualLauncher::default();
        let key = derive_key(&descriptor());

        let job = enqueue_job(&jobs, &launcher, descriptor(), &key)
            .await
            .expect("enqueue");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.target_key, key.as_str());
        assert_eq!(launcher.launched(), vec![job.id.clone()]);
    }

    #[tokio::test]
    async fn launch_failure_fails_the_job() {
        let jobs = BlobJobRegistry::new(Arc::new(RecordingStore::default()));
        let launcher = ManualLauncher::failing();
        let key = derive_key(&descriptor());

        let job = enqueue_job(&jobs, &launcher, descriptor(), &key)
            .await
            .expect("enqueue");
        assert_eq!(job.status, JobStatus::Failed);
        let stored = jobs.find_job(&job.id).await.expect("find").expect("exists");
        assert_eq!(stored.status, JobStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_on_pending_job() {
        let jobs = BlobJobRegistry::new(Arc::new(RecordingStore::default()));
        let key = derive_key(&descriptor());
        let job = enqueue_job(&jobs, &ManualLauncher::default(), descriptor(), &key)
            .await
            .expect("enqueue");

        let err = wait_for_job_completion(&jobs, &job.id, Duration::from_secs(2))
            .await
            .expect_err("timeout");
        assert!(matches!(err, RepoError::Persistence(_)));
    }
}
