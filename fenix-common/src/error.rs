//! Common error types for Fênix

use thiserror::Error;

/// Common result type for Fênix operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the admin service and the operator CLI
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Object storage error (wraps object_store::Error)
    #[error("Storage error: {0}")]
    Storage(#[from] object_store::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Password hashing failure
    #[error("Password error: {0}")]
    Password(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<bcrypt::BcryptError> for Error {
    fn from(err: bcrypt::BcryptError) -> Self {
        Error::Password(err.to_string())
    }
}
