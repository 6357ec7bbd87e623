//! Job registry persisted as JSON documents in the blob store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future;
use futures::stream::{self, StreamExt};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    BlobStore, FinishJobParams, JobOutcome, JobsRepo, NewJobRecord, RepoError, StoredObject,
};
use crate::cache::{job_record_path, job_records_prefix};
use crate::domain::entities::JobRecord;
use crate::domain::types::JobStatus;

const JSON_CONTENT_TYPE: &str = "application/json";
const LIST_CONCURRENCY: usize = 8;

/// Stores each job at `jobs/{id}.json`.
///
/// The terminal transition is a read-check-write on one object. Completion
/// runs once per job, so there is no competing writer in practice; a second
/// runner would observe the terminal status and back off.
#[derive(Clone)]
pub struct BlobJobRegistry {
    store: Arc<dyn BlobStore>,
}

impl BlobJobRegistry {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    async fn write(&self, record: &JobRecord) -> Result<(), RepoError> {
        let body = serde_json::to_vec_pretty(record).map_err(RepoError::from_persistence)?;
        self.store
            .put(
                &job_record_path(&record.id),
                StoredObject {
                    body: Bytes::from(body),
                    content_type: JSON_CONTENT_TYPE.to_string(),
                    metadata: BTreeMap::new(),
                },
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl JobsRepo for BlobJobRegistry {
    async fn create_job(&self, params: NewJobRecord) -> Result<JobRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = JobRecord {
            id: Uuid::new_v4().simple().to_string(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            params: params.params,
            target_key: params.target_key,
            result_ref: None,
            error: None,
        };
        self.write(&record).await?;
        Ok(record)
    }

    async fn find_job(&self, id: &str) -> Result<Option<JobRecord>, RepoError> {
        // Ids are opaque to callers; anything that could not have been issued is unknown.
        if !is_valid_job_id(id) {
            return Ok(None);
        }
        let Some(object) = self.store.get(&job_record_path(id)).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&object.body)
            .map(Some)
            .map_err(|err| RepoError::Corrupt {
                id: id.to_string(),
                message: err.to_string(),
            })
    }

    async fn finish_job(&self, params: FinishJobParams) -> Result<JobRecord, RepoError> {
        let mut record = self
            .find_job(&params.id)
            .await?
            .ok_or_else(|| RepoError::NotFound {
                id: params.id.clone(),
            })?;

        if record.is_terminal() {
            return Err(RepoError::AlreadyTerminal {
                id: record.id,
                status: record.status,
            });
        }

        record.status = params.outcome.status();
        record.updated_at = OffsetDateTime::now_utc();
        match params.outcome {
            JobOutcome::Completed { result_ref } => record.result_ref = Some(result_ref),
            JobOutcome::Failed { error } => record.error = Some(error),
        }

        self.write(&record).await?;
        Ok(record)
    }

    async fn list_jobs(&self) -> Result<Vec<Result<JobRecord, RepoError>>, RepoError> {
        let prefix = job_records_prefix();
        let ids: Vec<String> = self
            .store
            .list(&prefix)
            .await?
            .into_iter()
            .filter_map(|path| {
                path.strip_prefix(&prefix)
                    .and_then(|rest| rest.strip_suffix(".json"))
                    .map(str::to_string)
            })
            .collect();

        let records = stream::iter(ids)
            .map(|id| async move { self.find_job(&id).await.transpose() })
            .buffered(LIST_CONCURRENCY)
            .filter_map(future::ready)
            .collect()
            .await;
        Ok(records)
    }

    async fn delete_job(&self, id: &str) -> Result<(), RepoError> {
        if !is_valid_job_id(id) {
            return Err(RepoError::NotFound { id: id.to_string() });
        }
        self.store.delete(&job_record_path(id)).await?;
        Ok(())
    }
}

fn is_valid_job_id(id: &str) -> bool {
    id.len() == 32 && id.bytes().all(|byte| byte.is_ascii_hexdigit())
}
