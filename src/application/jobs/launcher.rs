use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{Instrument, error, info_span};

use super::runner::JobRunner;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to spawn job worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("job launcher unavailable: {0}")]
    Unavailable(String),
}

/// Starts job completion outside the initiating request.
///
/// `launch` returns once the work is handed off; it never waits for the
/// generator.
#[async_trait]
pub trait JobLauncher: Send + Sync {
    async fn launch(&self, job_id: &str) -> Result<(), LaunchError>;
}

/// Runs completion on a detached tokio task in this process.
#[derive(Clone)]
pub struct TaskLauncher {
    runner: Arc<JobRunner>,
}

impl TaskLauncher {
    pub fn new(runner: Arc<JobRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl JobLauncher for TaskLauncher {
    async fn launch(&self, job_id: &str) -> Result<(), LaunchError> {
        let runner = Arc::clone(&self.runner);
        let job_id = job_id.to_string();
        let span = info_span!("job", job_id = %job_id);
        tokio::spawn(
            async move {
                if let Err(err) = runner.complete(&job_id).await {
                    error!(
                        target = "application::jobs::launcher",
                        op = "task_launcher",
                        job_id = %job_id,
                        error = %err,
                        "Job completion aborted; record left pending"
                    );
                }
            }
            .instrument(span),
        );
        Ok(())
    }
}
