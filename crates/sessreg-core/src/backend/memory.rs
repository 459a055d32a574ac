//! In-process backend.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Backend, BackendError, BackendResult};

/// Backend holding everything in memory; lost on drop.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    namespaces: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn create(&self, namespace: &str, key: &str, value: Vec<u8>) -> BackendResult<()> {
        let mut namespaces = self.namespaces.write().await;
        let entries = namespaces.entry(namespace.to_string()).or_default();
        if entries.contains_key(key) {
            return Err(BackendError::already_exists(namespace, key));
        }
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn put(&self, namespace: &str, key: &str, value: Vec<u8>) -> BackendResult<()> {
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> BackendResult<Vec<u8>> {
        let namespaces = self.namespaces.read().await;
        namespaces
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .cloned()
            .ok_or_else(|| BackendError::not_found(namespace, key))
    }

    async fn get_all(&self, namespace: &str) -> BackendResult<Vec<(String, Vec<u8>)>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .map(|entries| entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn delete(&self, namespace: &str, key: &str) -> BackendResult<()> {
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .get_mut(namespace)
            .and_then(|entries| entries.remove(key))
            .map(|_| ())
            .ok_or_else(|| BackendError::not_found(namespace, key))
    }
}
