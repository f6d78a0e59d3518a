use quill_cron::CronError;
use quill_store::StoreError;
use quill_types::{Address, ValidationErrors};

/// Errors returned by blog handlers and the application.
#[derive(Debug, thiserror::Error)]
pub enum BlogError {
    /// A message failed its own validation.
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    /// The signer is not allowed to perform the action.
    #[error("signer {signer} is unauthorized to {action}")]
    Unauthorized { signer: Address, action: String },

    /// The transaction carries no signer.
    #[error("no signer in context")]
    MissingSigner,

    /// The request is well formed but not applicable to the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// No handler is registered for the message path.
    #[error("no handler registered for {0}")]
    NoRoute(String),

    /// A handler was given a message it does not serve.
    #[error("handler for {expected} received {got}")]
    UnexpectedMsg {
        expected: &'static str,
        got: &'static str,
    },

    /// Two handlers registered for the same path.
    #[error("route {0} registered twice")]
    DuplicateRoute(&'static str),

    /// Message bytes could not be encoded or decoded.
    #[error("message codec error: {0}")]
    Codec(String),

    /// Configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cron(#[from] CronError),
}

impl BlogError {
    pub fn unauthorized(signer: Address, action: impl Into<String>) -> Self {
        Self::Unauthorized {
            signer,
            action: action.into(),
        }
    }

    /// Storage failures that must abort the enclosing block.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Store(e) => e.is_fatal(),
            Self::Cron(e) => e.is_fatal(),
            _ => false,
        }
    }

    /// Whether this is a missing record or task.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::NotFound { .. }) | Self::Cron(CronError::TaskNotFound(_))
        )
    }
}

impl From<BlogError> for CronError {
    fn from(e: BlogError) -> Self {
        match e {
            BlogError::Store(inner) => CronError::Store(inner),
            BlogError::Cron(inner) => inner,
            other => CronError::Handler(other.to_string()),
        }
    }
}

/// Result alias for blog operations.
pub type BlogResult<T> = Result<T, BlogError>;
