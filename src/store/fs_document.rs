use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{fs, task};
use tracing::{debug, warn};

use super::{DocumentStore, write_atomic};
use crate::StorageError;

/// Document store on the local filesystem.
///
/// Each namespace is a directory under the root. A document is a JSON file
/// named after the SHA-256 of its key, holding the key next to the document
/// so listings can recover it.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

#[derive(Serialize)]
struct StoredRef<'a> {
    key: &'a str,
    doc: &'a Value,
}

#[derive(Deserialize)]
struct Stored {
    key: String,
    doc: Value,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace)
    }

    fn document_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.namespace_dir(namespace)
            .join(format!("{}.json", hex::encode(Sha256::digest(key.as_bytes()))))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn open(&self, namespaces: &[&str]) -> Result<(), StorageError> {
        for namespace in namespaces {
            fs::create_dir_all(self.namespace_dir(namespace)).await?;
        }
        debug!(
            "Opened document store at {} with {} namespaces",
            self.root.display(),
            namespaces.len()
        );
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StorageError> {
        let bytes = match fs::read(self.document_path(namespace, key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: Stored = serde_json::from_slice(&bytes)?;
        Ok((stored.key == key).then_some(stored.doc))
    }

    async fn put(&self, namespace: &str, key: &str, doc: &Value) -> Result<(), StorageError> {
        let dir = self.namespace_dir(namespace);
        let path = self.document_path(namespace, key);
        let bytes = serde_json::to_vec(&StoredRef { key, doc })?;
        task::spawn_blocking(move || write_atomic(&dir, &path, &bytes))
            .await
            .map_err(io::Error::from)??;
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.document_path(namespace, key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn all(&self, namespace: &str) -> Result<Vec<(String, Value)>, StorageError> {
        let mut docs = Vec::new();
        let mut dir = fs::read_dir(self.namespace_dir(namespace)).await?;
        while let Some(file) = dir.next_entry().await? {
            let path = file.path();
            // Skips in-progress temporary files.
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let bytes = match fs::read(&path).await {
                Ok(bytes) => bytes,
                // Deleted between listing and reading.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            match serde_json::from_slice::<Stored>(&bytes) {
                Ok(stored) => docs.push((stored.key, stored.doc)),
                Err(e) => warn!(
                    "Skipping unreadable document {} in namespace {}: {}",
                    path.display(),
                    namespace,
                    e
                ),
            }
        }
        Ok(docs)
    }

    async fn clear(&self, namespace: &str) -> Result<(), StorageError> {
        let dir = self.namespace_dir(namespace);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&dir).await?;
        Ok(())
    }
}
