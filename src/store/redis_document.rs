use async_trait::async_trait;
use redis::AsyncCommands;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::DocumentStore;
use crate::StorageError;

/// Document store backed by Redis.
///
/// Each namespace is one Redis hash at `{prefix}:{namespace}`; documents
/// are hash fields holding JSON text.
pub struct RedisDocumentStore {
    client: redis::Client,
    prefix: String,
    conn: OnceCell<redis::aio::ConnectionManager>,
}

impl RedisDocumentStore {
    pub fn new(client: redis::Client, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            conn: OnceCell::new(),
        }
    }

    fn hash_key(&self, namespace: &str) -> String {
        format!("{}:{}", self.prefix, namespace)
    }

    fn conn(&self) -> Result<redis::aio::ConnectionManager, StorageError> {
        self.conn
            .get()
            .cloned()
            .ok_or_else(|| StorageError::Unavailable("redis document store is not open".to_owned()))
    }
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    async fn open(&self, namespaces: &[&str]) -> Result<(), StorageError> {
        let mut conn = self
            .conn
            .get_or_try_init(|| redis::aio::ConnectionManager::new(self.client.clone()))
            .await?
            .clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        // Hashes are created on first write; nothing to prepare per namespace.
        debug!(
            "Opened redis document store with prefix {} ({} namespaces)",
            self.prefix,
            namespaces.len()
        );
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StorageError> {
        let mut conn = self.conn()?;
        let raw: Option<String> = conn.hget(self.hash_key(namespace), key).await?;
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StorageError::from)
    }

    async fn put(&self, namespace: &str, key: &str, doc: &Value) -> Result<(), StorageError> {
        let json = serde_json::to_string(doc)?;
        let mut conn = self.conn()?;
        conn.hset::<_, _, _, ()>(self.hash_key(namespace), key, json)
            .await?;
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let mut conn = self.conn()?;
        conn.hdel::<_, _, ()>(self.hash_key(namespace), key).await?;
        Ok(())
    }

    async fn all(&self, namespace: &str) -> Result<Vec<(String, Value)>, StorageError> {
        let mut conn = self.conn()?;
        let raw: HashMap<String, String> = conn.hgetall(self.hash_key(namespace)).await?;
        let mut docs = Vec::with_capacity(raw.len());
        for (key, json) in raw {
            match serde_json::from_str(&json) {
                Ok(doc) => docs.push((key, doc)),
                Err(e) => warn!(
                    "Skipping unreadable document {} in namespace {}: {}",
                    key, namespace, e
                ),
            }
        }
        Ok(docs)
    }

    async fn clear(&self, namespace: &str) -> Result<(), StorageError> {
        let mut conn = self.conn()?;
        conn.del::<_, ()>(self.hash_key(namespace)).await?;
        Ok(())
    }
}
