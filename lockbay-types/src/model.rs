//! Domain model for licenses, verification tokens and two-factor state.
//!
//! These are plain data types; all lifecycle rules live in the service
//! crates (`lockbay-license`, `lockbay-auth`). Persistence adapters map
//! them to and from storage rows.

use crate::{LicenseId, ProductId, TokenId, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a license.
///
/// Transitions are monotone toward a terminal state: `Active → Expired`
/// (lazy-expiry or sweep, idempotent) and `Active/Expired → Revoked`.
/// `Revoked` is terminal under normal flow; only an explicit administrative
/// reactivation moves a license back to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    /// License is valid and usable.
    Active,
    /// License passed its expiry timestamp.
    Expired,
    /// License was administratively revoked.
    Revoked,
}

impl LicenseStatus {
    /// Returns the canonical storage/display name of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            other => Err(format!("unknown license status: {other}")),
        }
    }
}

/// A software license: entitles one user to one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    /// Opaque row identifier.
    pub id: LicenseId,
    /// Canonical human-presentable license key (`XXXX-XXXX-XXXX-XXXX`).
    pub key: String,
    /// Owning user.
    pub user_id: UserId,
    /// Product the license is bound to.
    pub product_id: ProductId,
    /// Current lifecycle status.
    pub status: LicenseStatus,
    /// Expiry timestamp; `None` means perpetual.
    pub expires_at: Option<DateTime<Utc>>,
    /// Hardware fingerprint digest, set by the first explicit bind.
    pub hardware_fingerprint: Option<String>,
    /// Set when the license is revoked.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Operator-supplied reason, set when the license is revoked.
    pub revocation_reason: Option<String>,
    /// Creation timestamp (purchase confirmation).
    pub created_at: DateTime<Utc>,
}

impl License {
    /// Returns true if the license has an expiry timestamp in the past.
    /// Status is not consulted; this is the raw time check.
    #[must_use]
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Returns the public projection of this license. The projection never
    /// carries the hardware fingerprint or revocation bookkeeping, so it is
    /// safe to hand to external callers.
    #[must_use]
    pub fn summary(&self) -> LicenseSummary {
        LicenseSummary {
            id: self.id,
            key: self.key.clone(),
            user_id: self.user_id,
            product_id: self.product_id,
            status: self.status,
            expires_at: self.expires_at,
        }
    }
}

/// Public projection of a license returned from validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseSummary {
    /// Opaque row identifier.
    pub id: LicenseId,
    /// Canonical license key.
    pub key: String,
    /// Owning user.
    pub user_id: UserId,
    /// Product the license is bound to.
    pub product_id: ProductId,
    /// Current lifecycle status.
    pub status: LicenseStatus,
    /// Expiry timestamp; `None` means perpetual.
    pub expires_at: Option<DateTime<Utc>>,
}

/// The purpose a verification token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Confirms ownership of an email address at signup.
    EmailVerification,
    /// Authorizes a password reset.
    PasswordReset,
    /// Guards the two-factor enrollment flow.
    TwoFactorSetup,
    /// Guards two-factor backup/recovery flows.
    TwoFactorBackup,
}

impl TokenKind {
    /// Time-to-live for freshly issued tokens of this kind.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        match self {
            Self::EmailVerification => Duration::hours(24),
            Self::PasswordReset => Duration::hours(1),
            Self::TwoFactorSetup | Self::TwoFactorBackup => Duration::hours(2),
        }
    }

    /// Returns the canonical storage name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailVerification => "email_verification",
            Self::PasswordReset => "password_reset",
            Self::TwoFactorSetup => "two_factor_setup",
            Self::TwoFactorBackup => "two_factor_backup",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email_verification" => Ok(Self::EmailVerification),
            "password_reset" => Ok(Self::PasswordReset),
            "two_factor_setup" => Ok(Self::TwoFactorSetup),
            "two_factor_backup" => Ok(Self::TwoFactorBackup),
            other => Err(format!("unknown token kind: {other}")),
        }
    }
}

/// A short-lived, single-use secret authorizing a sensitive action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationToken {
    /// Opaque row identifier.
    pub id: TokenId,
    /// Owning user.
    pub user_id: UserId,
    /// The purpose this token authorizes.
    pub kind: TokenKind,
    /// High-entropy secret presented back by the user.
    pub secret: String,
    /// Hard expiry; tokens past this point never redeem.
    pub expires_at: DateTime<Utc>,
}

impl VerificationToken {
    /// Returns true if the token has not yet expired.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Two-factor material for a user. Present iff two-factor is enabled;
/// the shared secret and the backup codes live and die together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwoFactorCredential {
    /// Base32-encoded TOTP shared secret.
    pub secret: String,
    /// Unused single-use backup codes, stored in canonical uppercase form.
    pub backup_codes: Vec<String>,
}

/// The slice of a user account the credential engine reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Opaque account identifier.
    pub id: UserId,
    /// Primary email, used as the TOTP account label.
    pub email: String,
    /// Two-factor material, present iff two-factor is enabled.
    pub two_factor: Option<TwoFactorCredential>,
}

impl User {
    /// Returns true if two-factor authentication is enabled.
    #[must_use]
    pub fn two_factor_enabled(&self) -> bool {
        self.two_factor.is_some()
    }
}
