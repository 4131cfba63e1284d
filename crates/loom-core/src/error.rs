//! Error taxonomy shared by every crate in the workspace.

use thiserror::Error;

/// The closed set of error kinds surfaced by the storage handle (see
/// [`crate::storage::Storage`]). Downstream crates match on this rather than
/// on `LoomError` variants directly, since a storage backend may wrap its
/// own error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    NotFound,
    Conflict,
    Unavailable,
    Invalid,
}

#[derive(Debug, Error)]
pub enum LoomError {
    #[error("config: {0}")]
    Config(String),

    #[error("storage ({kind:?}): {message}")]
    Storage {
        kind: StorageErrorKind,
        message: String,
    },

    #[error("ingestion: {0}")]
    Ingestion(String),

    #[error("source: {0}")]
    Source(String),

    #[error("workflow '{workflow}' failed: {message}")]
    Workflow { workflow: String, message: String },

    #[error("contract violation: {0}")]
    Contract(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type LoomResult<T> = Result<T, LoomError>;

impl LoomError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn storage(kind: StorageErrorKind, msg: impl Into<String>) -> Self {
        Self::Storage {
            kind,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::storage(StorageErrorKind::NotFound, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::storage(StorageErrorKind::Conflict, msg)
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::storage(StorageErrorKind::Unavailable, msg)
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::storage(StorageErrorKind::Invalid, msg)
    }

    pub fn ingestion(msg: impl Into<String>) -> Self {
        Self::Ingestion(msg.into())
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    pub fn workflow(workflow: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Workflow {
            workflow: workflow.into(),
            message: msg.into(),
        }
    }

    pub fn contract(msg: impl Into<String>) -> Self {
        Self::Contract(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// The storage error kind this error maps to, if any.
    pub fn storage_kind(&self) -> Option<StorageErrorKind> {
        match self {
            Self::Storage { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
