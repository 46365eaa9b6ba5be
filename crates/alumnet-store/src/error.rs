use thiserror::Error;

/// Errors produced by a backend binding.
///
/// Callers treat every variant as transient except where noted: the request
/// failed, local state should stay as it was.
#[derive(Error, Debug)]
pub enum BackendError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (database directory, storage objects).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A row could not be (de)serialized.
    #[error("Row encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// A referenced row or object does not exist.
    #[error("Record not found")]
    NotFound,

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// UUID parsing error.
    #[error("UUID error: {0}")]
    Uuid(#[from] uuid::Error),

    /// Timestamp parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),

    /// A column name that is not a plain identifier.
    #[error("Invalid column name: {0:?}")]
    InvalidColumn(String),

    /// An update that tries to touch server-owned fields.
    #[error("Invalid update: {0}")]
    InvalidPatch(String),

    /// Unique constraint violated (duplicate id, email already registered).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing, expired or wrong credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Storage object path or bucket rejected.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Object too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    /// The backend could not be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// Map SQLite constraint violations to [`BackendError::Conflict`].
    pub(crate) fn from_write(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref err, ref msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                BackendError::Conflict(msg.clone().unwrap_or_else(|| "constraint violation".into()))
            }
            other => BackendError::Sqlite(other),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BackendError>;
