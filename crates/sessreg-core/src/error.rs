use thiserror::Error;

use crate::backend::BackendError;

/// Errors produced by the session registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("bad parameter: {0}")]
    BadParameter(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("codec error: {0}")]
    Codec(String),
}

impl From<serde_json::Error> for RegistryError {
    fn from(e: serde_json::Error) -> Self {
        RegistryError::Codec(e.to_string())
    }
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, RegistryError::AlreadyExists(_))
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
