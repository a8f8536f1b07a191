use thiserror::Error;

/// The four error kinds of the runtime's error-handling design. Handlers translate every
/// variant into a peer-facing ACK or event; nothing here is ever allowed to cross the
/// per-match actor boundary unhandled.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    ValidationRejection(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("invariant violated: {0}")]
    Fatal(String),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::ValidationRejection(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        CoreError::NotFound(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        CoreError::Transient(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        CoreError::Fatal(msg.into())
    }

    /// Short machine-readable tag used in `ERROR` event codes.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ValidationRejection(_) => "VALIDATION_ERROR",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::Transient(_) => "TRANSIENT_ERROR",
            CoreError::Fatal(_) => "FATAL_ERROR",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
