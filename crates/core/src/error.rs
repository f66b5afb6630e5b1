use thiserror::Error;

pub type RefreshResult<T> = Result<T, RefreshError>;
pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job {0} not found")]
    JobNotFound(uuid::Uuid),

    #[error("Invalid job transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: crate::types::JobStatus,
        to: crate::types::JobStatus,
    },

    #[error("Job store error: {0}")]
    Store(String),

    #[error("Remote API error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Error classes reported by the remote advertising platform.
///
/// `Transient` covers rate limits, timeouts and 5xx-class responses and is
/// eligible for retry; `Permanent` covers bad requests, auth and not-found
/// and propagates immediately.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Transient remote error: {0}")]
    Transient(String),

    #[error("Permanent remote error: {0}")]
    Permanent(String),
}

impl RemoteError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Transient(_))
    }
}
