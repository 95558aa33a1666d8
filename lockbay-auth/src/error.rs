//! Error types for the token and two-factor services.

use lockbay_store::StoreError;
use thiserror::Error;

/// Token and two-factor errors.
///
/// `InvalidOrExpired` deliberately collapses "expired", "wrong kind" and
/// "never existed" into one message so a caller cannot enumerate which
/// tokens exist.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token redemption failed, for any reason.
    #[error("invalid or expired token")]
    InvalidOrExpired,

    /// The referenced user does not exist.
    #[error("user not found")]
    UserNotFound,

    /// The operation requires two-factor to be enabled.
    #[error("two-factor authentication is not enabled")]
    NotEnabled,

    /// Two-factor is already enabled for this account.
    #[error("two-factor authentication is already enabled")]
    AlreadyEnabled,

    /// The submitted TOTP or backup code did not verify.
    #[error("invalid verification code")]
    InvalidCode,

    /// TOTP machinery failed (bad secret encoding, clock failure).
    #[error("totp failure: {0}")]
    Totp(String),

    /// Persistence-layer failure; the caller may retry.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for token and two-factor operations.
pub type AuthResult<T> = Result<T, AuthError>;
