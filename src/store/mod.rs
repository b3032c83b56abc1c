//! Persistent stores behind the document and flat tiers
//!
//! - [`DocumentStore`]: asynchronous structured store with one namespace
//!   per cache domain (Redis or filesystem backed)
//! - [`FlatStore`]: synchronous string key-value store (a single JSON file)
//!
//! Stores report every failure as a [`StorageError`]. Deciding whether a
//! failure is fatal is left to the caller; the cache tiers log and degrade.

mod flat_file;
mod fs_document;
mod redis_document;

pub use flat_file::FileFlatStore;
pub use fs_document::FsDocumentStore;
pub use redis_document::RedisDocumentStore;

use async_trait::async_trait;
use serde_json::Value;
use std::{
    io::{self, Write},
    path::Path,
};
use tempfile::NamedTempFile;

use crate::StorageError;

/// Asynchronous persistent document store.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Prepare the store and its namespaces. Called once by the cache at init.
    async fn open(&self, namespaces: &[&str]) -> Result<(), StorageError>;

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StorageError>;

    /// Insert or overwrite a document.
    async fn put(&self, namespace: &str, key: &str, doc: &Value) -> Result<(), StorageError>;

    /// Remove a document. Removing an absent key is not an error.
    async fn delete(&self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Every document in a namespace.
    async fn all(&self, namespace: &str) -> Result<Vec<(String, Value)>, StorageError>;

    async fn clear(&self, namespace: &str) -> Result<(), StorageError>;
}

/// Synchronous persistent string store.
pub trait FlatStore: Send + Sync + 'static {
    /// Load or create the backing storage. Called once by the cache at init.
    fn open(&self) -> Result<(), StorageError>;

    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_item(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Remove an item. Removing an absent key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Replace `path` with `bytes` through a uniquely named temporary file in
/// `dir`, so concurrent writers never share a partial file.
pub(crate) fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.persist(path)?;
    Ok(())
}
