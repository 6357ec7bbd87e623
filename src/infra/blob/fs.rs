//! Filesystem-backed blob store.
//!
//! Each object is one file: a big-endian `u32` header length, a JSON header
//! holding the content type and metadata, then the body. The file is written
//! to a temporary sibling and renamed into place, so a reader sees either the
//! previous object or the new one in full.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::application::repos::{BlobStore, StoreError, StoredObject};

const TMP_SUFFIX: &str = ".tmp";
const HEADER_LEN_BYTES: usize = 4;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Header {
    content_type: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path);
        let invalid = path.is_empty()
            || path.ends_with(TMP_SUFFIX)
            || relative.is_absolute()
            || relative
                .components()
                .any(|component| !matches!(component, Component::Normal(_)));
        if invalid {
            return Err(StoreError::InvalidKey {
                path: path.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn get(&self, path: &str) -> Result<Option<StoredObject>, StoreError> {
        let absolute = self.resolve(path)?;
        let raw = match fs::read(&absolute).await {
            Ok(raw) => Bytes::from(raw),
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(err)),
        };

        let (header, body) = decode(path, raw)?;
        Ok(Some(StoredObject {
            body,
            content_type: header.content_type,
            metadata: header.metadata,
        }))
    }

    async fn put(&self, path: &str, object: StoredObject) -> Result<(), StoreError> {
        let absolute = self.resolve(path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let header = Header {
            content_type: object.content_type,
            metadata: object.metadata,
        };
        let contents = encode(path, &header, &object.body)?;
        write_atomic(&absolute, &contents).await
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let absolute = self.resolve(path)?;
        remove_if_exists(&absolute).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(StoreError::Io(err)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let entry_path = entry.path();
                if file_type.is_dir() {
                    pending.push(entry_path);
                    continue;
                }
                let Some(relative) = relative_key(&self.root, &entry_path) else {
                    continue;
                };
                if relative.ends_with(TMP_SUFFIX) {
                    continue;
                }
                if relative.starts_with(prefix) {
                    found.push(relative);
                }
            }
        }

        found.sort();
        Ok(found)
    }
}

fn encode(path: &str, header: &Header, body: &[u8]) -> Result<Vec<u8>, StoreError> {
    let header =
        serde_json::to_vec(header).map_err(|err| StoreError::metadata(path, err.to_string()))?;
    let header_len = u32::try_from(header.len())
        .map_err(|_| StoreError::metadata(path, "object header too large"))?;

    let mut contents = Vec::with_capacity(HEADER_LEN_BYTES + header.len() + body.len());
    contents.extend_from_slice(&header_len.to_be_bytes());
    contents.extend_from_slice(&header);
    contents.extend_from_slice(body);
    Ok(contents)
}

fn decode(path: &str, mut raw: Bytes) -> Result<(Header, Bytes), StoreError> {
    let Some(prefix) = raw
        .get(..HEADER_LEN_BYTES)
        .and_then(|prefix| <[u8; HEADER_LEN_BYTES]>::try_from(prefix).ok())
    else {
        return Err(StoreError::metadata(path, "object is missing its header"));
    };
    let header_len = u32::from_be_bytes(prefix) as usize;
    if raw.len() - HEADER_LEN_BYTES < header_len {
        return Err(StoreError::metadata(path, "object header is truncated"));
    }

    let _ = raw.split_to(HEADER_LEN_BYTES);
    let header = raw.split_to(header_len);
    let header = serde_json::from_slice::<Header>(&header)
        .map_err(|err| StoreError::metadata(path, err.to_string()))?;
    Ok((header, raw))
}

async fn write_atomic(target: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let mut tmp = target.as_os_str().to_owned();
    tmp.push(format!(".{}{TMP_SUFFIX}", Uuid::new_v4().simple()));
    let tmp = PathBuf::from(tmp);

    let result = async {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, target).await
    }
    .await;

    if let Err(err) = result {
        let _ = fs::remove_file(&tmp).await;
        return Err(StoreError::Io(err));
    }
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(StoreError::Io(err)),
    }
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments = relative
        .components()
        .map(|component| match component {
            Component::Normal(segment) => segment.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(segments.join("/"))
}
