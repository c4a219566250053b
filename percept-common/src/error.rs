//! Common error types for the perception crates

use thiserror::Error;

/// Common result type for backend and configuration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the backend and the client
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Uniqueness constraint rejected a write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Realtime channel could not be subscribed
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map a sqlx error, turning unique-constraint violations into `Conflict`
    pub fn from_write(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Error::Conflict(format!("{}: {}", what, db_err.message()));
            }
        }
        Error::Database(err)
    }
}
