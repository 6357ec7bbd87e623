//! Contract of the external document generator.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::descriptor::RequestDescriptor;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generator rejected the request (status {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("generator unavailable: {0}")]
    Unavailable(String),
    #[error("generator produced no output")]
    EmptyOutput,
    #[error("generation failed: {0}")]
    Failed(String),
}

impl GeneratorError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Renders a document for a canonical descriptor. May be slow; may fail.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<GeneratedDocument, GeneratorError>;
}
