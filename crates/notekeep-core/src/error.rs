//! Error taxonomy for the indexing and retrieval pipeline.
//!
//! Every fallible core operation reports a [`CoreError`], which the
//! process boundary maps to a status class: `UserNotFound` /
//! `DocumentNotFound` → 404-equivalent, `ConfigInvalid` → 400-equivalent,
//! everything else → 500-equivalent. Messages are human-readable and carry
//! no internal identifiers beyond the ids the caller already supplied.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// No user config exists for the given user id.
    #[error("user '{0}' not found")]
    UserNotFound(String),

    /// Required configuration is absent or malformed (e.g. no embedding
    /// model selected, unknown model identifier).
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A document named by the request does not exist.
    #[error("document '{0}' not found")]
    DocumentNotFound(String),

    /// An embedding or generation capability call failed.
    #[error("upstream capability failed: {0}")]
    Upstream(#[source] anyhow::Error),

    /// An index blob or ledger read/write failed. Always fatal for the
    /// current operation; a later rebuild heals partial updates.
    #[error("persistence failure: {0}")]
    Persistence(#[source] anyhow::Error),

    /// The insert resolver could not locate a splice offset. Not fatal:
    /// the caller decides whether to skip or surface it.
    #[error("no insertion point found in document '{0}'")]
    NoInsertPoint(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    /// Coarse status classification for the process boundary.
    pub fn status_class(&self) -> StatusClass {
        match self {
            CoreError::UserNotFound(_) | CoreError::DocumentNotFound(_) => StatusClass::NotFound,
            CoreError::ConfigInvalid(_) => StatusClass::BadRequest,
            _ => StatusClass::Internal,
        }
    }
}

/// 4xx/5xx-equivalent classification, kept transport-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    NotFound,
    BadRequest,
    Internal,
}

pub type CoreResult<T> = Result<T, CoreError>;
