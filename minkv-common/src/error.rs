//! Common error types for MiN KV tools

use thiserror::Error;

/// Common result type for MiN KV operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across MiN KV crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors that may succeed when the same operation is repeated
    ///
    /// SQLite reports contention as "database is locked" / "database is busy";
    /// pool acquisition timeouts fall in the same bucket.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::PoolTimedOut) => true,
            Error::Database(db_err) => {
                let msg = db_err.to_string();
                msg.contains("database is locked") || msg.contains("database is busy")
            }
            _ => false,
        }
    }
}
