//! In-process fakes for the port traits, shared by unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use time::Date;

use crate::application::clock::Clock;
use crate::application::generator::{GeneratedDocument, Generator, GeneratorError};
use crate::application::jobs::{JobLauncher, LaunchError};
use crate::application::repos::{BlobStore, StoreError, StoredObject};
use crate::domain::descriptor::RequestDescriptor;
use crate::domain::entities::PDF_CONTENT_TYPE;
use crate::infra::blob::MemoryBlobStore;

/// Memory store that counts calls and can be told to fail.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryBlobStore,
    gets: AtomicUsize,
    puts: AtomicUsize,
    deletes: AtomicUsize,
    lists: AtomicUsize,
    fail_gets: AtomicBool,
    fail_puts: AtomicBool,
    fail_puts_under: Mutex<Option<String>>,
}

impl RecordingStore {
    pub fn inner(&self) -> &MemoryBlobStore {
        &self.inner
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Fail only writes whose path starts with `prefix`.
    pub fn fail_puts_under(&self, prefix: &str) {
        if let Ok(mut guard) = self.fail_puts_under.lock() {
            *guard = Some(prefix.to_string());
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.gets()
            + self.puts()
            + self.deletes.load(Ordering::SeqCst)
            + self.lists.load(Ordering::SeqCst)
    }

    fn put_should_fail(&self, path: &str) -> bool {
        if self.fail_puts.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_puts_under
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .is_some_and(|prefix| path.starts_with(&prefix))
    }
}

#[async_trait]
impl BlobStore for RecordingStore {
    async fn get(&self, path: &str) -> Result<Option<StoredObject>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StoreError::backend("injected read failure"));
        }
        self.inner.get(path).await
    }

    async fn put(&self, path: &str, object: StoredObject) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.put_should_fail(path) {
            return Err(StoreError::backend("injected write failure"));
        }
        self.inner.put(path, object).await
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(path).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.inner.list(prefix).await
    }
}

/// Generator returning a canned result, optionally after a delay.
pub struct StubGenerator {
    output: Result<Bytes, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubGenerator {
    pub fn succeeding(body: &'static [u8]) -> Self {
        Self {
            output: Ok(Bytes::from_static(body)),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            output: Err(message.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for StubGenerator {
    async fn generate(
        &self,
        _descriptor: &RequestDescriptor,
    ) -> Result<GeneratedDocument, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.output {
            Ok(bytes) => Ok(GeneratedDocument {
                bytes: bytes.clone(),
                content_type: PDF_CONTENT_TYPE.to_string(),
            }),
            Err(message) => Err(GeneratorError::failed(message.clone())),
        }
    }
}

/// Launcher that only records ids; completion is driven by the test.
#[derive(Default)]
pub struct ManualLauncher {
    launched: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl ManualLauncher {
    pub fn failing() -> Self {
        Self {
            launched: Mutex::new(Vec::new()),
            fail: AtomicBool::new(true),
        }
    }

    pub fn launched(&self) -> Vec<String> {
        self.launched
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl JobLauncher for ManualLauncher {
    async fn launch(&self, job_id: &str) -> Result<(), LaunchError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(LaunchError::Unavailable("injected launch failure".into()));
        }
        if let Ok(mut guard) = self.launched.lock() {
            guard.push(job_id.to_string());
        }
        Ok(())
    }
}

pub struct FixedClock(pub Date);

impl Clock for FixedClock {
    fn today(&self) -> Date {
        self.0
    }
}
