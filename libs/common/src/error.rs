//! Error types shared by every component
//!
//! `CoreError` is the taxonomy that record managers and adapters report to
//! callers. `DatabaseError` covers pool setup and migrations, before any
//! record operation runs.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Error kinds surfaced to callers of the record managers
#[derive(Error, Debug)]
pub enum CoreError {
    /// The identity provider already knows this email
    #[error("{0}")]
    DuplicateIdentity(String),

    /// User, post or comment does not exist
    #[error("{0}")]
    NotFound(String),

    /// Missing or ill-typed input, rejected before any external call
    #[error("{0}")]
    ValidationFailed(String),

    /// The caller is not allowed to touch this record
    #[error("{0}")]
    Forbidden(String),

    /// Identity provider, blob store or document store failed or timed out
    #[error("{0}")]
    UpstreamUnavailable(String),

    /// Unexpected failure
    #[error("{0}")]
    Internal(String),
}

/// Stable name of a [`CoreError`] variant, used in response bodies and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DuplicateIdentity,
    NotFound,
    ValidationFailed,
    Forbidden,
    UpstreamUnavailable,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DuplicateIdentity => "DuplicateIdentity",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::ValidationFailed => "ValidationFailed",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::UpstreamUnavailable => "UpstreamUnavailable",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl CoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        CoreError::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::ValidationFailed(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        CoreError::UpstreamUnavailable(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CoreError::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::DuplicateIdentity(_) => ErrorKind::DuplicateIdentity,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            CoreError::Forbidden(_) => ErrorKind::Forbidden,
            CoreError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            CoreError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Store failures are reported as `Internal` except for pool exhaustion,
/// which means the document store is not answering.
impl From<SqlxError> for CoreError {
    fn from(err: SqlxError) -> Self {
        match err {
            SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) => {
                CoreError::UpstreamUnavailable(format!("Document store unavailable: {}", err))
            }
            other => CoreError::Internal(format!("Document store error: {}", other)),
        }
    }
}

/// Custom error type for database setup
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl From<DatabaseError> for CoreError {
    fn from(err: DatabaseError) -> Self {
        CoreError::Internal(err.to_string())
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Type alias for Result with CoreError
pub type CoreResult<T> = Result<T, CoreError>;
