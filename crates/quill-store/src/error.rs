use quill_types::{RecordId, ValidationErrors};

/// Errors from bucket, index and backend operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record with this ID exists in the bucket.
    #[error("{bucket}: record {id} not found")]
    NotFound { bucket: String, id: RecordId },

    /// A unique index already maps the extracted key to another record.
    #[error("{bucket}: unique index {index} already holds key {key}")]
    Conflict {
        bucket: String,
        index: String,
        key: String,
    },

    /// The record failed its own validation.
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    /// An index extractor refused to produce a key for the record.
    #[error("{bucket}: cannot build key for index {index}: {reason}")]
    InvalidIndexKey {
        bucket: String,
        index: String,
        reason: String,
    },

    /// A query named an index the bucket does not declare.
    #[error("{bucket}: unknown index {index}")]
    UnknownIndex { bucket: String, index: String },

    /// A bucket, index or counter name is not `[a-z0-9]{1,32}`.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// The same index name was declared twice on one bucket.
    #[error("{bucket}: index {index} declared twice")]
    DuplicateIndex { bucket: String, index: String },

    /// A sequence counter reached `u64::MAX`.
    #[error("sequence {0} exhausted")]
    SequenceExhausted(String),

    /// Stored bytes could not be decoded.
    #[error("corrupt value at key {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// A record could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Failure of the underlying key-value backend.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Storage-level failures that must abort the enclosing transaction.
    ///
    /// Everything else is an expected, reportable outcome that left the store
    /// exactly as it was.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Corrupt { .. } | Self::Serialization(_) | Self::Backend(_)
        )
    }

    /// Build a [`StoreError::Corrupt`] for a raw key.
    pub fn corrupt(key: &[u8], reason: impl ToString) -> Self {
        Self::Corrupt {
            key: hex::encode(key),
            reason: reason.to_string(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
