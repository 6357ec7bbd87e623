//! Read-only view of job outcomes.

use std::sync::Arc;

use thiserror::Error;
use tracing::error;

use crate::application::repos::{JobsRepo, RepoError, StoreError};
use crate::cache::ArtifactCache;
use crate::domain::entities::{Artifact, JobRecord};
use crate::domain::types::JobStatus;

const SOURCE: &str = "application::poller";

#[derive(Debug)]
pub enum JobStatusView {
    NotFound,
    Pending { job: JobRecord },
    Completed { job: JobRecord, artifact: Artifact },
    Failed { job: JobRecord, error: String },
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Registry(#[from] RepoError),
    #[error("job `{job_id}` completed but its result `{result_ref}` is missing")]
    ResultMissing { job_id: String, result_ref: String },
    #[error("failed to read result of job `{job_id}`")]
    Store {
        job_id: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Clone)]
pub struct StatusPoller {
    jobs: Arc<dyn JobsRepo>,
    cache: ArtifactCache,
}

impl StatusPoller {
    pub fn new(jobs: Arc<dyn JobsRepo>, cache: ArtifactCache) -> Self {
        Self { jobs, cache }
    }

    /// One registry read, plus one result read when Completed.
    pub async fn status(&self, job_id: &str) -> Result<JobStatusView, PollError> {
        let Some(job) = self.jobs.find_job(job_id).await? else {
            return Ok(JobStatusView::NotFound);
        };

        match job.status {
            JobStatus::Pending => Ok(JobStatusView::Pending { job }),
            JobStatus::Failed => {
                let error = job
                    .error
                    .clone()
                    .unwrap_or_else(|| "job failed without error text".to_string());
                Ok(JobStatusView::Failed { job, error })
            }
            JobStatus::Completed => {
                let result_ref = job.result_ref.clone().unwrap_or_default();
                match self.cache.load_result(&result_ref).await {
                    Ok(Some(artifact)) => Ok(JobStatusView::Completed { job, artifact }),
                    Ok(None) => {
                        error!(
                            target = SOURCE,
                            op = "status",
                            job_id,
                            key = %job.target_key,
                            result_ref = %result_ref,
                            "Completed job has no stored result"
                        );
                        Err(PollError::ResultMissing {
                            job_id: job.id,
                            result_ref,
                        })
                    }
                    Err(source) => {
                        error!(
                            target = SOURCE,
                            op = "status",
                            job_id,
                            key = %job.target_key,
                            error = %source,
                            "Failed to read job result"
                        );
                        Err(PollError::Store {
                            job_id: job.id,
                            source,
                        })
                    }
                }
            }
        }
    }
}
