//! Structured errors for the worker binary.
//!
//! Anything that reaches the host becomes a `failed` reply carrying
//! [`WorkerError::code`].

use crate::events::ReplyBody;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// A line on stdin was not a valid event envelope.
    #[error("INVALID_INPUT: {0}")]
    InvalidEnvelope(String),

    /// Store, fetch, or lifecycle failure.
    #[error(transparent)]
    Core(#[from] dougcast_core::Error),

    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),

    #[error("ENCODE_ERROR: {0}")]
    Encode(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn code(&self) -> &'static str {
        match self {
            WorkerError::InvalidEnvelope(_) => "INVALID_INPUT",
            WorkerError::Core(e) => e.code(),
            WorkerError::Io(_) => "IO_ERROR",
            WorkerError::Encode(_) => "ENCODE_ERROR",
        }
    }
}

impl From<WorkerError> for ReplyBody {
    fn from(err: WorkerError) -> Self {
        ReplyBody::Failed { code: err.code().to_string(), message: err.to_string() }
    }
}
