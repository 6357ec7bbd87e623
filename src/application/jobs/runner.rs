use std::sync::Arc;
use std::time::Instant;

use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::invoker::GeneratorInvoker;
use crate::application::repos::{FinishJobParams, JobOutcome, JobsRepo, RepoError};
use crate::cache::{ArtifactCache, CacheKey};
use crate::domain::entities::JobRecord;
use crate::domain::types::JobStatus;

const SOURCE: &str = "application::jobs::runner";
const METRIC_JOBS_FINISHED: &str = "dailyoffice_jobs_finished_total";

#[derive(Debug, Error)]
pub enum RunError {
    #[error("job `{id}` not found")]
    NotFound { id: String },
    #[error(transparent)]
    Registry(#[from] RepoError),
}

/// Completion step of an asynchronous job.
///
/// Artifacts are written at the target key and at the job-scoped location
/// before the record turns Completed, so a poller that sees Completed can
/// always fetch the result.
#[derive(Clone)]
pub struct JobRunner {
    jobs: Arc<dyn JobsRepo>,
    cache: ArtifactCache,
    invoker: GeneratorInvoker,
}

impl JobRunner {
    pub fn new(jobs: Arc<dyn JobsRepo>, cache: ArtifactCache, invoker: GeneratorInvoker) -> Self {
        Self {
            jobs,
            cache,
            invoker,
        }
    }

    /// Generate and record the terminal state of `job_id`.
    ///
    /// Jobs already terminal are returned unchanged.
    pub async fn complete(&self, job_id: &str) -> Result<JobRecord, RunError> {
        let started_at = Instant::now();
        let job = self
            .jobs
            .find_job(job_id)
            .await?
            .ok_or_else(|| RunError::NotFound {
                id: job_id.to_string(),
            })?;

        if job.is_terminal() {
            info!(
                target = SOURCE,
                op = "complete",
                job_id,
                status = %job.status,
                result = "skipped",
                "Job already terminal"
            );
            return Ok(job);
        }

        let outcome = self.produce(&job).await;
        let status = outcome.status();
        let finished = match self
            .jobs
            .finish_job(FinishJobParams {
                id: job.id.clone(),
                outcome,
            })
            .await
        {
            Ok(record) => record,
            // A concurrent runner got there first; its outcome stands.
            Err(RepoError::AlreadyTerminal { .. }) => {
                return self
                    .jobs
                    .find_job(job_id)
                    .await?
                    .ok_or_else(|| RunError::NotFound {
                        id: job_id.to_string(),
                    });
            }
            Err(err) => return Err(err.into()),
        };

        counter!(METRIC_JOBS_FINISHED, "status" => status.as_str()).increment(1);
        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        match status {
            JobStatus::Completed => info!(
                target = SOURCE,
                op = "complete",
                job_id,
                key = %job.target_key,
                status = %status,
                elapsed_ms,
                "Job completed"
            ),
            _ => warn!(
                target = SOURCE,
                op = "complete",
                job_id,
                key = %job.target_key,
                descriptor = ?job.params,
                status = %status,
                elapsed_ms,
                error = finished.error.as_deref().unwrap_or_default(),
                "Job failed"
            ),
        }

        Ok(finished)
    }

    async fn produce(&self, job: &JobRecord) -> JobOutcome {
        let artifact = match self.invoker.invoke_async(&job.params).await {
            Ok(artifact) => artifact,
            Err(err) => {
                return JobOutcome::Failed {
                    error: err.to_string(),
                };
            }
        };

        let key = CacheKey::from_persisted(&job.target_key);
        if let Err(err) = self.cache.store(&key, &artifact).await {
            return JobOutcome::Failed {
                error: format!("failed to store artifact at `{key}`: {err}"),
            };
        }

        match self.cache.store_result(&job.id, &artifact).await {
            Ok(result_ref) => JobOutcome::Completed { result_ref },
            Err(err) => JobOutcome::Failed {
                error: format!("failed to store job result: {err}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use time::Month;

    use super::*;
    use crate::application::repos::NewJobRecord;
    use crate::application::testing::{RecordingStore, StubGenerator};
    use crate::cache::{CacheConfig, CacheLookup, derive_key};
    use crate::domain::descriptor::RequestDescriptor;
    use crate::domain::types::PrayerKind;
    use crate::infra::jobs::BlobJobRegistry;

    struct Harness {
        store: Arc<RecordingStore>,
        jobs: Arc<BlobJobRegistry>,
        cache: ArtifactCache,
        generator: Arc<StubGenerator>,
        runner: JobRunner,
    }

    fn harness(generator: StubGenerator) -> Harness {
        let store = Arc::new(RecordingStore::default());
        let jobs = Arc::new(BlobJobRegistry::new(store.clone()));
        let cache = ArtifactCache::new(store.clone(), CacheConfig::default());
        let generator = Arc::new(generator);
        let invoker = GeneratorInvoker::new(
            generator.clone(),
            Duration::from_secs(1),
            Duration::from_secs(5),
        );
        let runner = JobRunner::new(jobs.clone(), cache.clone(), invoker);
        Harness {
            store,
            jobs,
            cache,
            generator,
            runner,
        }
    }

    async fn pending_job(harness: &Harness) -> JobRecord {
        let descriptor = RequestDescriptor::monthly(PrayerKind::Evening, 2025, Month::December);
        harness
            .jobs
            .create_job(NewJobRecord {
                params: descriptor,
                target_key: derive_key(&descriptor).to_string(),
            })
            .await
            .expect("create job")
    }

    #[tokio::test]
    async fn success_writes_both_locations_before_completing() {
        let harness = harness(StubGenerator::succeeding(b"%PDF-month"));
        let job = pending_job(&harness).await;

        let finished = harness.runner.complete(&job.id).await.expect("complete");
        assert_eq!(finished.status, JobStatus::Completed);
        let result_ref = finished.result_ref.clone().expect("result ref");
        assert_eq!(result_ref, format!("results/{}.pdf", job.id));

        let result = harness.cache.load_result(&result_ref).await.expect("load");
        assert_eq!(result.expect("result").bytes.as_ref(), b"%PDF-month");
        let key = CacheKey::from_persisted(&job.target_key);
        assert!(matches!(harness.cache.lookup(&key).await, CacheLookup::Hit(_)));
    }

    #[tokio::test]
    async fn generator_failure_marks_failed_without_artifacts() {
        let harness = harness(StubGenerator::failing("typesetter crashed"));
        let job = pending_job(&harness).await;
        let puts_before = harness.store.puts();

        let finished = harness.runner.complete(&job.id).await.expect("complete");
        assert_eq!(finished.status, JobStatus::Failed);
        assert!(
            finished
                .error
                .as_deref()
                .is_some_and(|error| error.contains("typesetter crashed"))
        );
        assert_eq!(finished.result_ref, None);
        // Only the job record itself is rewritten.
        assert_eq!(harness.store.puts(), puts_before + 1);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("log buffer")).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failure_log_carries_the_descriptor() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let harness = harness(StubGenerator::failing("typesetter crashed"));
        let job = pending_job(&harness).await;
        harness.runner.complete(&job.id).await.expect("complete");

        let output = logs.contents();
        let line = output
            .lines()
            .find(|line| line.contains("Job failed"))
            .expect("failure logged");
        assert!(line.contains("descriptor="), "{line}");
        assert!(line.contains("MonthRange"), "{line}");
        assert!(line.contains(&job.id), "{line}");
    }

    #[tokio::test]
    async fn artifact_write_failure_marks_failed() {
        let harness = harness(StubGenerator::succeeding(b"%PDF"));
        let job = pending_job(&harness).await;
        harness.store.fail_puts_under("prayers/");

        let finished = harness.runner.complete(&job.id).await.expect("complete");
        assert_eq!(finished.status, JobStatus::Failed);
        assert!(
            harness
                .cache
                .load_result(&format!("results/{}.pdf", job.id))
                .await
                .expect("load")
                .is_none()
        );
    }

    #[tokio::test]
    async fn terminal_jobs_are_not_rerun() {
        let harness = harness(StubGenerator::succeeding(b"%PDF"));
        let job = pending_job(&harness).await;
        harness.runner.complete(&job.id).await.expect("first run");
        let again = harness.runner.complete(&job.id).await.expect("second run");

        assert_eq!(again.status, JobStatus::Completed);
        assert_eq!(harness.generator.calls(), 1);
    }

    #[tokio::test]
    async fn unknown_job_is_reported() {
        let harness = harness(StubGenerator::succeeding(b"%PDF"));
        let err = harness
            .runner
            .complete("0123456789abcdef0123456789abcdef")
            .await
            .expect_err("missing");
        assert!(matches!(err, RunError::NotFound { .. }));
    }
}
