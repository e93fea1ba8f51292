use thiserror::Error;

use jobq_core::{CoreError, JobId};

use crate::document_store::StoreError;

pub type QueueResult<T> = Result<T, QueueError>;

/// Job queue infrastructure error.
///
/// Handler failures are not errors at this level: they are recorded in the
/// job's status history.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    /// The job is no longer in the active collection (e.g. already archived).
    #[error("job not found: {0}")]
    NotFound(JobId),

    /// A stored document could not be decoded into a job (or a job into a document).
    #[error("invalid job document: {0}")]
    InvalidDocument(String),

    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A scheduled task ended without producing an outcome.
    #[error("scheduled task failed: {0}")]
    Task(String),
}
