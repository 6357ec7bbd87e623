//! Port traits describing the external stores the core depends on.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::descriptor::RequestDescriptor;
use crate::domain::entities::JobRecord;
use crate::domain::types::JobStatus;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object `{path}` not found")]
    NotFound { path: String },
    #[error("invalid object path `{path}`")]
    InvalidKey { path: String },
    #[error("blob store backend error: {0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("object `{path}` has unreadable metadata: {message}")]
    Metadata { path: String, message: String },
}

impl StoreError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }

    pub fn metadata(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Metadata {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Object as held by a blob store: opaque bytes plus string metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
    pub metadata: BTreeMap<String, String>,
}

/// Flat key/value object store with atomic whole-object writes.
///
/// A reader of one path observes either the previous object or the new one,
/// never a mix. No cross-path ordering is promised.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// `Ok(None)` when the path does not exist.
    async fn get(&self, path: &str) -> Result<Option<StoredObject>, StoreError>;

    async fn put(&self, path: &str, object: StoredObject) -> Result<(), StoreError>;

    /// Deleting a missing path succeeds.
    async fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Paths starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("job `{id}` not found")]
    NotFound { id: String },
    #[error("job `{id}` is already {status}")]
    AlreadyTerminal { id: String, status: JobStatus },
    #[error("job record `{id}` is corrupt: {message}")]
    Corrupt { id: String, message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct NewJobRecord {
    pub params: RequestDescriptor,
    pub target_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { result_ref: String },
    Failed { error: String },
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Completed { .. } => JobStatus::Completed,
            JobOutcome::Failed { .. } => JobStatus::Failed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FinishJobParams {
    pub id: String,
    pub outcome: JobOutcome,
}

/// Durable job state. The only mutation after creation is one terminal transition.
#[async_trait]
pub trait JobsRepo: Send + Sync {
    async fn create_job(&self, params: NewJobRecord) -> Result<JobRecord, RepoError>;

    async fn find_job(&self, id: &str) -> Result<Option<JobRecord>, RepoError>;

    /// Fails with `AlreadyTerminal` if the job has left Pending.
    async fn finish_job(&self, params: FinishJobParams) -> Result<JobRecord, RepoError>;

    /// Every stored job. A record that cannot be read yields its own error
    /// entry; the outer error means the listing itself failed.
    async fn list_jobs(&self) -> Result<Vec<Result<JobRecord, RepoError>>, RepoError>;

    async fn delete_job(&self, id: &str) -> Result<(), RepoError>;
}
