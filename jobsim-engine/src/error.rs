//! Error types for the job engine.

use thiserror::Error;

use crate::record::JobState;

/// Errors surfaced synchronously to callers of the job service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JobError {
    #[error("job id {0} already exists")]
    DuplicateId(String),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("no jobs found for client {0}")]
    ClientNotFound(String),

    #[error("client id required")]
    MissingClient,

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("job {id} is already {state}")]
    AlreadyTerminal { id: String, state: JobState },

    #[error("processing engine is already running")]
    EngineAlreadyRunning,
}

/// Errors from a single callback delivery attempt.
///
/// These never escape [`Notifier::notify`](crate::Notifier::notify), which
/// reports only success or failure after its retries are spent.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("callback request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("callback endpoint responded with status {0}")]
    Status(u16),

    #[error("callback transport error: {0}")]
    Transport(String),
}
