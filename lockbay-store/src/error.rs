//! Error types for the persistence boundary.

use thiserror::Error;

/// Persistence-layer failures.
///
/// `Duplicate` is split out from the generic backend error because callers
/// treat it differently: license creation retries key generation on a
/// uniqueness conflict instead of surfacing the failure immediately.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated on insert.
    #[error("unique constraint violated: {0}")]
    Duplicate(String),

    /// The backing store is unavailable or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A persisted row could not be decoded back into the domain model.
    #[error("malformed row: {0}")]
    Corrupt(String),

    /// SQLite backend error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
