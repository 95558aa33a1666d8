//! Error types for the license engine.
//!
//! Routine validation failures are not errors; they are [`crate::Validation`]
//! values. This enum covers caller mistakes and persistence faults only.

use lockbay_store::StoreError;
use thiserror::Error;

/// License-engine errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Key generation kept colliding with existing keys.
    #[error("could not allocate a unique license key after {0} attempts")]
    KeyCollision(usize),

    /// An extension must add at least one day.
    #[error("extension must be a positive number of days")]
    InvalidExtension,

    /// Persistence-layer failure; the caller may retry.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
