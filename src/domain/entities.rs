//! Domain entities mirrored from the blob store.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::domain::{descriptor::RequestDescriptor, types::JobStatus};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Immutable generated output. Replaced wholesale, never edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Bytes,
    pub content_type: String,
    pub generated_at: OffsetDateTime,
    /// Lowercase hex SHA-256 of `bytes`.
    pub digest: String,
}

impl Artifact {
    pub fn new(bytes: Bytes, content_type: impl Into<String>, generated_at: OffsetDateTime) -> Self {
        let digest = sha256_hex(&bytes);
        Self {
            bytes,
            content_type: content_type.into(),
            generated_at,
            digest,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Durable record of one asynchronous generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub params: RequestDescriptor,
    pub target_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobRecord {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
