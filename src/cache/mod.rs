//! Artifact cache for generated prayer documents.
//!
//! Artifacts live in a blob store under hierarchical keys derived from the
//! canonical request:
//!
//! ```text
//! {artifact_prefix}/{daily|monthly}/{kind}/{YYYY-MM-DD|YYYY/MM}/{variant}/{cycleNN|default}.pdf
//! ```
//!
//! Job records and job-scoped results sit beside the cache at `jobs/{id}.json`
//! and `results/{id}.pdf`.

mod config;
mod keys;
mod store;

pub use config::CacheConfig;
pub use keys::{
    CacheKey, KeyPrefix, derive_key, job_record_path, job_records_prefix, job_result_path,
};
pub use store::{ArtifactCache, CacheLookup, CacheWrite};
