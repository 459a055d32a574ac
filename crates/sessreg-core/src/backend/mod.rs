//! Key-value storage contract the registry is built on.
//!
//! Keys live in flat namespaces. Implementations must make each single-key
//! operation atomic; `create` in particular is a put-if-absent.

pub mod dir;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use dir::DirBackend;
pub use memory::MemoryBackend;

/// Errors reported by a storage backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("key not found: {namespace}/{key}")]
    NotFound { namespace: String, key: String },

    #[error("key already exists: {namespace}/{key}")]
    AlreadyExists { namespace: String, key: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl BackendError {
    pub fn not_found(namespace: &str, key: &str) -> Self {
        BackendError::NotFound {
            namespace: namespace.to_string(),
            key: key.to_string(),
        }
    }

    pub fn already_exists(namespace: &str, key: &str) -> Self {
        BackendError::AlreadyExists {
            namespace: namespace.to_string(),
            key: key.to_string(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Namespaced byte storage.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Store `value` only if `key` is absent, else `AlreadyExists`.
    async fn create(&self, namespace: &str, key: &str, value: Vec<u8>) -> BackendResult<()>;

    /// Store `value`, replacing whatever was there.
    async fn put(&self, namespace: &str, key: &str, value: Vec<u8>) -> BackendResult<()>;

    /// Fetch a value, or `NotFound`.
    async fn get(&self, namespace: &str, key: &str) -> BackendResult<Vec<u8>>;

    /// All `(key, value)` pairs in a namespace, ordered by key.
    async fn get_all(&self, namespace: &str) -> BackendResult<Vec<(String, Vec<u8>)>>;

    /// Remove a key, or `NotFound`.
    async fn delete(&self, namespace: &str, key: &str) -> BackendResult<()>;
}
