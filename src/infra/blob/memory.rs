//! In-memory blob store for tests and single-process deployments.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::application::repos::{BlobStore, StoreError, StoredObject};

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: DashMap<String, StoredObject>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, path: &str) -> Result<Option<StoredObject>, StoreError> {
        Ok(self.objects.get(path).map(|entry| entry.value().clone()))
    }

    async fn put(&self, path: &str, object: StoredObject) -> Result<(), StoreError> {
        if path.is_empty() {
            return Err(StoreError::InvalidKey {
                path: path.to_string(),
            });
        }
        self.objects.insert(path.to_string(), object);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.objects.remove(path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut paths: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        paths.sort();
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use bytes::Bytes;

    use super::*;

    #[tokio::test]
    async fn last_writer_wins_and_list_is_sorted() {
        let store = MemoryBlobStore::new();
        let object = |body: &'static [u8]| StoredObject {
            body: Bytes::from_static(body),
            content_type: "application/pdf".into(),
            metadata: BTreeMap::new(),
        };

        store.put("b", object(b"1")).await.expect("put");
        store.put("a", object(b"1")).await.expect("put");
        store.put("a", object(b"2")).await.expect("put");

        let a = store.get("a").await.expect("get").expect("exists");
        assert_eq!(a.body.as_ref(), b"2");
        assert_eq!(store.list("").await.expect("list"), vec!["a", "b"]);
        assert_eq!(store.len(), 2);

        store.delete("a").await.expect("delete");
        assert_eq!(store.get("a").await.expect("get"), None);
    }
}
