//! Deadline-bounded invocation of the [`Generator`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::domain::descriptor::RequestDescriptor;
use crate::domain::entities::Artifact;

use super::generator::{Generator, GeneratorError};

const SOURCE: &str = "application::invoker";

const METRIC_GENERATION_TOTAL: &str = "dailyoffice_generation_total";
const METRIC_GENERATION_MS: &str = "dailyoffice_generation_ms";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error("generation exceeded its {}s deadline", deadline.as_secs())]
    DeadlineExceeded { deadline: Duration },
}

impl GenerationError {
    pub fn is_deadline(&self) -> bool {
        matches!(self, GenerationError::DeadlineExceeded { .. })
    }
}

/// Which budget a generation ran under; used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationPath {
    Sync,
    Async,
}

impl InvocationPath {
    fn as_str(self) -> &'static str {
        match self {
            InvocationPath::Sync => "sync",
            InvocationPath::Async => "async",
        }
    }
}

#[derive(Clone)]
pub struct GeneratorInvoker {
    generator: Arc<dyn Generator>,
    sync_deadline: Duration,
    async_timeout: Duration,
}

impl GeneratorInvoker {
    pub fn new(generator: Arc<dyn Generator>, sync_deadline: Duration, async_timeout: Duration) -> Self {
        Self {
            generator,
            sync_deadline,
            async_timeout,
        }
    }

    pub fn sync_deadline(&self) -> Duration {
        self.sync_deadline
    }

    /// Call and wait within the request budget. No partial artifact on breach.
    pub async fn invoke_sync(&self, descriptor: &RequestDescriptor) -> Result<Artifact, GenerationError> {
        self.invoke(descriptor, InvocationPath::Sync, self.sync_deadline)
            .await
    }

    /// Call under the background budget used by job completion.
    pub async fn invoke_async(&self, descriptor: &RequestDescriptor) -> Result<Artifact, GenerationError> {
        self.invoke(descriptor, InvocationPath::Async, self.async_timeout)
            .await
    }

    async fn invoke(
        &self,
        descriptor: &RequestDescriptor,
        path: InvocationPath,
        deadline: Duration,
    ) -> Result<Artifact, GenerationError> {
        let started_at = Instant::now();
        let result = match tokio::time::timeout(deadline, self.generator.generate(descriptor)).await {
            Ok(Ok(document)) if document.bytes.is_empty() => Err(GeneratorError::EmptyOutput.into()),
            Ok(Ok(document)) => Ok(Artifact::new(
                document.bytes,
                document.content_type,
                OffsetDateTime::now_utc(),
            )),
            Ok(Err(err)) => Err(GenerationError::Generator(err)),
            Err(_) => Err(GenerationError::DeadlineExceeded { deadline }),
        };
        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(GenerationError::DeadlineExceeded { .. }) => "deadline",
            Err(GenerationError::Generator(_)) => "error",
        };
        counter!(METRIC_GENERATION_TOTAL, "path" => path.as_str(), "outcome" => outcome)
            .increment(1);
        histogram!(METRIC_GENERATION_MS, "path" => path.as_str()).record(elapsed_ms);

        match &result {
            Ok(artifact) => info!(
                target = SOURCE,
                op = "invoke",
                path = path.as_str(),
                kind = %descriptor.kind,
                scope = %descriptor.scope.temporal_token(),
                result = outcome,
                elapsed_ms = elapsed_ms as u64,
                bytes = artifact.len(),
                "Generator produced artifact"
            ),
            Err(err) => warn!(
                target = SOURCE,
                op = "invoke",
                path = path.as_str(),
                kind = %descriptor.kind,
                scope = %descriptor.scope.temporal_token(),
                result = outcome,
                elapsed_ms = elapsed_ms as u64,
                error = %err,
                "Generator invocation failed"
            ),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;
    use crate::application::testing::StubGenerator;
    use crate::domain::types::PrayerKind;

    fn descriptor() -> RequestDescriptor {
        RequestDescriptor::daily(PrayerKind::Morning, date!(2025 - 11 - 08))
    }

    #[tokio::test]
    async fn successful_generation_becomes_artifact() {
        let generator = Arc::new(StubGenerator::succeeding(b"%PDF-1.7"));
        let invoker = GeneratorInvoker::new(generator.clone(), Duration::from_secs(1), Duration::from_secs(1));

        let artifact = invoker.invoke_sync(&descriptor()).await.expect("artifact");
        assert_eq!(artifact.bytes.as_ref(), b"%PDF-1.7");
        assert_eq!(artifact.content_type, "application/pdf");
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn empty_output_is_a_generation_error() {
        let invoker = GeneratorInvoker::new(
            Arc::new(StubGenerator::succeeding(b"")),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let err = invoker.invoke_sync(&descriptor()).await.expect_err("empty");
        assert!(matches!(err, GenerationError::Generator(GeneratorError::EmptyOutput)));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generator_breaches_deadline() {
        let generator = StubGenerator::succeeding(b"%PDF").with_delay(Duration::from_secs(60));
        let invoker = GeneratorInvoker::new(
            Arc::new(generator),
            Duration::from_secs(25),
            Duration::from_secs(900),
        );

        let err = invoker.invoke_sync(&descriptor()).await.expect_err("deadline");
        assert!(err.is_deadline());

        let artifact = invoker.invoke_async(&descriptor()).await.expect("async budget");
        assert_eq!(artifact.bytes.as_ref(), b"%PDF");
    }
}
