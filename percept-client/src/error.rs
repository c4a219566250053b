//! Error types surfaced by the coordination layer
//!
//! Raw backend errors never leave a coordinator: they are logged and
//! converted here. A duplicate vote is not an error, see
//! [`crate::rating::RatingOutcome::AlreadyVoted`].

use thiserror::Error;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClientError {
    /// Rejected locally before any backend call
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Backend call failed; the user may retry
    #[error("Backend error: {0}")]
    Backend(String),

    /// The submit control is disabled while a previous submission runs
    #[error("A submission is already in progress")]
    InFlight,

    #[error("Not found: {0}")]
    NotFound(String),
}

impl ClientError {
    /// Whether re-triggering the same action may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Backend(_) | ClientError::InFlight)
    }
}

impl From<percept_common::Error> for ClientError {
    fn from(err: percept_common::Error) -> Self {
        match err {
            percept_common::Error::InvalidInput(msg) => ClientError::Validation(msg),
            percept_common::Error::NotFound(msg) => ClientError::NotFound(msg),
            other => ClientError::Backend(other.to_string()),
        }
    }
}
