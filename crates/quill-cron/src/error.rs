use quill_store::StoreError;
use quill_types::RecordId;

/// Errors from scheduling, cancelling and executing tasks.
#[derive(Debug, thiserror::Error)]
pub enum CronError {
    /// No queued task has this ID (never scheduled, fired, or cancelled).
    #[error("scheduled task {0} not found")]
    TaskNotFound(RecordId),

    /// The requested run time cannot be encoded as a queue key.
    #[error("invalid run time: {0}")]
    InvalidRunTime(String),

    /// A task handler rejected its payload.
    #[error("task handler failed: {0}")]
    Handler(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CronError {
    /// Storage failures that must abort the enclosing block.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Store(e) => e.is_fatal(),
            _ => false,
        }
    }
}

/// Result alias for scheduler operations.
pub type CronResult<T> = Result<T, CronError>;
