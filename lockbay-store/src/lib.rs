//! Persistence boundary for the Lockbay credential engine.
//!
//! The service crates never talk to a database directly; they go through
//! the [`Store`] trait, which exposes exactly the operations the credential
//! core needs. Two implementations are provided:
//!
//! - [`MemoryStore`], a single-mutex in-memory store for tests and
//!   embedded use
//! - [`SqliteStore`], a SQLite-backed store using `rusqlite`, with
//!   transactions around every multi-step write
//!
//! # Atomicity contract
//!
//! Several methods exist precisely to close read-then-write races, and any
//! new implementation must honor them:
//!
//! - [`Store::replace_token`] deletes prior tokens of the same
//!   `(user, kind)` and inserts the new one in one atomic unit, so two
//!   concurrent issues leave exactly one live token behind.
//! - [`Store::take_token`] is a conditional delete-and-return; two
//!   concurrent redemptions of the same token yield exactly one row.
//! - [`Store::take_backup_code`] is a conditional remove-and-check; a
//!   backup code can be consumed at most once.

mod error;
mod memory;
mod sqlite;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use lockbay_types::{License, LicenseId, TokenKind, User, UserId, VerificationToken};

/// The persistence operations consumed by the credential core.
///
/// All methods take `&self`; implementations provide their own interior
/// locking. Lookup misses are `Ok(None)` / `Ok(false)`, never errors.
pub trait Store: Send + Sync {
    // ── Licenses ─────────────────────────────────────────────────

    /// Inserts a new license.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] when the license key is already
    /// taken; the caller retries generation with a fresh nonce.
    fn insert_license(&self, license: &License) -> StoreResult<()>;

    /// Looks up a license by its canonical key.
    fn find_license_by_key(&self, key: &str) -> StoreResult<Option<License>>;

    /// Looks up a license by row id.
    fn find_license_by_id(&self, id: LicenseId) -> StoreResult<Option<License>>;

    /// Overwrites an existing license row. Returns false when the row does
    /// not exist.
    fn update_license(&self, license: &License) -> StoreResult<bool>;

    /// Transitions every ACTIVE license whose expiry is at or before `now`
    /// to EXPIRED, returning the number of rows changed. Idempotent; safe
    /// to race with lazy expiry on validate.
    fn expire_lapsed_licenses(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Lists ACTIVE licenses with an expiry at or before `deadline`.
    /// Pure read; drives expiry-warning notifications.
    fn list_active_expiring_before(&self, deadline: DateTime<Utc>) -> StoreResult<Vec<License>>;

    // ── Users ────────────────────────────────────────────────────

    /// Inserts a new user account slice.
    fn insert_user(&self, user: &User) -> StoreResult<()>;

    /// Looks up a user by id.
    fn find_user_by_id(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Overwrites an existing user row, including the two-factor material,
    /// as one atomic write. Returns false when the row does not exist.
    fn update_user(&self, user: &User) -> StoreResult<bool>;

    /// Atomically removes one backup code from a user's set. Returns true
    /// iff the code was present and is now gone.
    fn take_backup_code(&self, user_id: UserId, code: &str) -> StoreResult<bool>;

    // ── Verification tokens ──────────────────────────────────────

    /// Deletes all prior tokens of the same `(user, kind)` and inserts
    /// `token`, as one atomic unit. Returns the number of invalidated
    /// prior tokens.
    fn replace_token(&self, token: &VerificationToken) -> StoreResult<u64>;

    /// Conditional delete-and-return: removes the token matching `secret`
    /// and `kind` with `expires_at > now` and returns it. `Ok(None)` when
    /// no such live token exists (wrong secret, wrong kind, or expired).
    fn take_token(
        &self,
        secret: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<VerificationToken>>;

    /// Deletes every token past its expiry, returning the count.
    fn delete_expired_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}
