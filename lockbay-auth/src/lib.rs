//! Verification tokens and two-factor authentication for Lockbay.
//!
//! Two services share this crate because they mint the same shape of
//! credential: short-lived, cryptographically random, single-use or
//! state-gated.
//!
//! - [`VerificationTokens`] issues and redeems the tokens behind email
//!   verification, password reset and two-factor setup/backup flows
//! - [`TwoFactor`] runs TOTP enrollment, verification, backup codes and
//!   teardown
//!
//! Both are constructed with their collaborators (store, audit log,
//! notification sink) and hold no other state; correctness under
//! concurrent or replayed requests comes from the atomic consume
//! operations of the [`lockbay_store::Store`] contract.

mod error;
mod token;
mod two_factor;

pub use error::{AuthError, AuthResult};
pub use token::{VerificationTokens, TOKEN_SECRET_BYTES};
pub use two_factor::{
    Mechanism, SetupBundle, TwoFactor, TwoFactorConfig, TOTP_DIGITS, TOTP_SKEW, TOTP_STEP_SECS,
};
