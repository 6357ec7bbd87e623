//! Wire bodies shared by the dailyoffice HTTP surface and its clients.
//!
//! Artifact responses are raw bytes and carry no JSON body; everything else
//! the API returns is one of the types below.

use serde::{Deserialize, Serialize};

/// Header reporting whether an artifact was served from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-cache";
/// Header carrying the job id on `/job/{id}` artifact responses.
pub const JOB_ID_HEADER: &str = "x-job-id";

/// Lifecycle label of an asynchronous generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatusLabel {
    Pending,
    Completed,
    Failed,
}

impl JobStatusLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatusLabel::Pending => "pending",
            JobStatusLabel::Completed => "completed",
            JobStatusLabel::Failed => "failed",
        }
    }
}

/// Body returned for accepted (202) and failed (500) job states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusBody {
    pub status: JobStatusLabel,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatusBody {
    pub fn pending(job_id: impl Into<String>) -> Self {
        Self {
            status: JobStatusLabel::Pending,
            job_id: job_id.into(),
            error: None,
        }
    }

    pub fn failed(job_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: JobStatusLabel::Failed,
            job_id: job_id.into(),
            error: Some(error.into()),
        }
    }
}

/// Body returned for validation, lookup, and generation failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, message: Option<String>) -> Self {
        Self {
            error: error.into(),
            message,
        }
    }
}
