//! Cache-aside dispatch of generation requests.
//!
//! A request is canonicalized, keyed, and looked up. Misses on single days are
//! generated inline under a deadline; misses on whole months become jobs.

use std::sync::Arc;

use thiserror::Error;
use tracing::error;

use crate::application::clock::Clock;
use crate::application::invoker::{GenerationError, GeneratorInvoker};
use crate::application::jobs::{JobLauncher, enqueue_job};
use crate::application::repos::{JobsRepo, RepoError};
use crate::cache::{ArtifactCache, CacheKey, CacheLookup, derive_key};
use crate::domain::descriptor::{GenerateParams, RequestDescriptor, canonicalize};
use crate::domain::entities::Artifact;
use crate::domain::error::DomainError;
use crate::domain::types::CostClass;

const SOURCE: &str = "application::dispatcher";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// Value of the `X-Cache` response header.
    pub fn as_header(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

#[derive(Debug)]
pub enum GenerateOutcome {
    Artifact {
        artifact: Artifact,
        cache: CacheStatus,
        descriptor: RequestDescriptor,
    },
    /// Handed to a job; poll with the id.
    Accepted {
        job_id: String,
        descriptor: RequestDescriptor,
    },
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("generation failed for `{key}`")]
    Generation {
        key: CacheKey,
        #[source]
        source: GenerationError,
    },
    #[error("failed to record job for `{key}`")]
    JobRegistry {
        key: CacheKey,
        #[source]
        source: RepoError,
    },
}

#[derive(Clone)]
pub struct Dispatcher {
    cache: ArtifactCache,
    jobs: Arc<dyn JobsRepo>,
    invoker: GeneratorInvoker,
    launcher: Arc<dyn JobLauncher>,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    pub fn new(
        cache: ArtifactCache,
        jobs: Arc<dyn JobsRepo>,
        invoker: GeneratorInvoker,
        launcher: Arc<dyn JobLauncher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            jobs,
            invoker,
            launcher,
            clock,
        }
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Validate raw parameters, then dispatch. Invalid input touches no store.
    pub async fn handle(&self, params: &GenerateParams) -> Result<GenerateOutcome, DispatchError> {
        let descriptor = canonicalize(params, self.clock.today())?;
        self.dispatch(descriptor).await
    }

    pub async fn dispatch(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<GenerateOutcome, DispatchError> {
        let key = derive_key(&descriptor);

        if !descriptor.bypass_cache {
            // Unavailable is logged by the cache and handled as a miss.
            if let CacheLookup::Hit(artifact) = self.cache.lookup(&key).await {
                return Ok(GenerateOutcome::Artifact {
                    artifact,
                    cache: CacheStatus::Hit,
                    descriptor,
                });
            }
        }

        match descriptor.scope.cost_class() {
            CostClass::Sync => self.generate_inline(descriptor, key).await,
            CostClass::Async => self.submit_job(descriptor, key).await,
        }
    }

    async fn generate_inline(
        &self,
        descriptor: RequestDescriptor,
        key: CacheKey,
    ) -> Result<GenerateOutcome, DispatchError> {
        let artifact = match self.invoker.invoke_sync(&descriptor).await {
            Ok(artifact) => artifact,
            Err(source) => {
                error!(
                    target = SOURCE,
                    op = "generate_inline",
                    key = %key,
                    descriptor = ?descriptor,
                    error = %source,
                    deadline = source.is_deadline(),
                    "Synchronous generation failed"
                );
                return Err(DispatchError::Generation { key, source });
            }
        };

        self.cache.store_best_effort(&key, &artifact).await;

        Ok(GenerateOutcome::Artifact {
            artifact,
            cache: CacheStatus::Miss,
            descriptor,
        })
    }

    async fn submit_job(
        &self,
        descriptor: RequestDescriptor,
        key: CacheKey,
    ) -> Result<GenerateOutcome, DispatchError> {
        match enqueue_job(self.jobs.as_ref(), self.launcher.as_ref(), descriptor, &key).await {
            Ok(job) => Ok(GenerateOutcome::Accepted {
                job_id: job.id,
                descriptor,
            }),
            Err(source) => {
                error!(
                    target = SOURCE,
                    op = "submit_job",
                    key = %key,
                    descriptor = ?descriptor,
                    error = %source,
                    "Failed to create generation job"
                );
                Err(DispatchError::JobRegistry { key, source })
            }
        }
    }
}
