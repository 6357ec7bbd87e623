//! Artifact cache adapter over a [`BlobStore`].
//!
//! Reads never fail a request: anything other than a clean hit is reported as a
//! miss, with read errors logged and counted separately.

use std::collections::BTreeMap;
use std::sync::Arc;

use metrics::counter;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

use crate::application::repos::{BlobStore, StoreError, StoredObject};
use crate::domain::entities::{Artifact, sha256_hex};

use super::config::CacheConfig;
use super::keys::{CacheKey, KeyPrefix, job_result_path};

const SOURCE: &str = "cache::store";

const METRIC_CACHE_HIT: &str = "dailyoffice_cache_hit_total";
const METRIC_CACHE_MISS: &str = "dailyoffice_cache_miss_total";
const METRIC_CACHE_READ_ERROR: &str = "dailyoffice_cache_read_error_total";
const METRIC_CACHE_WRITE_ERROR: &str = "dailyoffice_cache_write_error_total";

pub const META_GENERATED_AT: &str = "generated-at";
pub const META_DIGEST: &str = "digest";
pub const META_CACHE_KEY: &str = "cache-key";

#[derive(Debug)]
pub enum CacheLookup {
    Hit(Artifact),
    Miss,
    /// Behaves as a miss; kept apart so callers can log it.
    Unavailable(StoreError),
}

#[derive(Debug)]
pub enum CacheWrite {
    Stored,
    /// Cache disabled by configuration.
    Skipped,
    Failed(StoreError),
}

#[derive(Clone)]
pub struct ArtifactCache {
    store: Arc<dyn BlobStore>,
    config: CacheConfig,
}

impl ArtifactCache {
    pub fn new(store: Arc<dyn BlobStore>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub async fn lookup(&self, key: &CacheKey) -> CacheLookup {
        if !self.config.enabled {
            counter!(METRIC_CACHE_MISS).increment(1);
            return CacheLookup::Miss;
        }

        let path = key.object_path(&self.config.artifact_prefix);
        let result = match self.store.get(&path).await {
            Ok(Some(object)) => decode_artifact(&path, object).map(Some),
            Ok(None) => Ok(None),
            Err(err) => Err(err),
        };

        match result {
            Ok(Some(artifact)) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                debug!(
                    target = SOURCE,
                    op = "lookup",
                    key = %key,
                    result = "hit",
                    bytes = artifact.len(),
                    "Artifact served from cache"
                );
                CacheLookup::Hit(artifact)
            }
            Ok(None) => {
                counter!(METRIC_CACHE_MISS).increment(1);
                debug!(target = SOURCE, op = "lookup", key = %key, result = "miss", "Cache miss");
                CacheLookup::Miss
            }
            Err(err) => {
                counter!(METRIC_CACHE_READ_ERROR).increment(1);
                warn!(
                    target = SOURCE,
                    op = "lookup",
                    key = %key,
                    result = "read_error",
                    error = %err,
                    "Cache read failed; treating as miss"
                );
                CacheLookup::Unavailable(err)
            }
        }
    }

    /// Write the artifact under `key`, surfacing failures.
    ///
    /// Succeeds without writing when the cache is disabled.
    pub async fn store(&self, key: &CacheKey, artifact: &Artifact) -> Result<(), StoreError> {
        if !self.config.enabled {
            return Ok(());
        }
        let path = key.object_path(&self.config.artifact_prefix);
        self.store
            .put(&path, encode_artifact(artifact, Some(key)))
            .await
    }

    /// Write the artifact under `key`; failures are logged and counted, never returned.
    pub async fn store_best_effort(&self, key: &CacheKey, artifact: &Artifact) -> CacheWrite {
        if !self.config.enabled {
            return CacheWrite::Skipped;
        }
        match self.store(key, artifact).await {
            Ok(()) => CacheWrite::Stored,
            Err(err) => {
                counter!(METRIC_CACHE_WRITE_ERROR).increment(1);
                warn!(
                    target = SOURCE,
                    op = "store_best_effort",
                    key = %key,
                    result = "write_error",
                    error = %err,
                    "Failed to write artifact to cache; response unaffected"
                );
                CacheWrite::Failed(err)
            }
        }
    }

    /// Write a job-scoped copy and return its reference.
    pub async fn store_result(&self, job_id: &str, artifact: &Artifact) -> Result<String, StoreError> {
        let path = job_result_path(job_id);
        self.store.put(&path, encode_artifact(artifact, None)).await?;
        Ok(path)
    }

    pub async fn load_result(&self, result_ref: &str) -> Result<Option<Artifact>, StoreError> {
        match self.store.get(result_ref).await? {
            Some(object) => decode_artifact(result_ref, object).map(Some),
            None => Ok(None),
        }
    }

    pub async fn delete_result(&self, result_ref: &str) -> Result<(), StoreError> {
        self.store.delete(result_ref).await
    }

    /// Delete every cached artifact covered by `prefix`. Returns the number removed.
    pub async fn invalidate_prefix(&self, prefix: &KeyPrefix) -> Result<usize, StoreError> {
        let artifact_prefix = &self.config.artifact_prefix;
        let candidates = self
            .store
            .list(&prefix.object_prefix(artifact_prefix))
            .await?;

        let mut removed = 0usize;
        for path in candidates {
            let Some(key) = CacheKey::from_object_path(artifact_prefix, &path) else {
                continue;
            };
            if !prefix.covers(&key) {
                continue;
            }
            self.store.delete(&path).await?;
            removed += 1;
        }

        debug!(
            target = SOURCE,
            op = "invalidate_prefix",
            prefix = %prefix,
            removed,
            "Invalidated cached artifacts"
        );
        Ok(removed)
    }
}

fn encode_artifact(artifact: &Artifact, key: Option<&CacheKey>) -> StoredObject {
    let mut metadata = BTreeMap::new();
    if let Ok(generated_at) = artifact.generated_at.format(&Rfc3339) {
        metadata.insert(META_GENERATED_AT.to_string(), generated_at);
    }
    metadata.insert(META_DIGEST.to_string(), artifact.digest.clone());
    if let Some(key) = key {
        metadata.insert(META_CACHE_KEY.to_string(), key.to_string());
    }
    StoredObject {
        body: artifact.bytes.clone(),
        content_type: artifact.content_type.clone(),
        metadata,
    }
}

fn decode_artifact(path: &str, object: StoredObject) -> Result<Artifact, StoreError> {
    let generated_at = object
        .metadata
        .get(META_GENERATED_AT)
        .ok_or_else(|| StoreError::metadata(path, "missing generated-at"))
        .and_then(|raw| {
            OffsetDateTime::parse(raw, &Rfc3339)
                .map_err(|err| StoreError::metadata(path, format!("bad generated-at: {err}")))
        })?;

    if let Some(expected) = object.metadata.get(META_DIGEST) {
        let actual = sha256_hex(&object.body);
        if &actual != expected {
            return Err(StoreError::metadata(path, "digest mismatch"));
        }
    }

    Ok(Artifact::new(object.body, object.content_type, generated_at))
}
