//! TOTP two-factor authentication and backup codes.
//!
//! Enrollment is a two-phase handshake: [`TwoFactor::begin_setup`] returns
//! a candidate secret without persisting anything, and only
//! [`TwoFactor::complete_setup`], after the user proves they hold the
//! secret by producing a valid code, turns two-factor on. An attacker who
//! can trigger setups therefore cannot silently enable two-factor with a
//! secret the account owner never confirmed.
//!
//! Codes are standard 30-second-step, 6-digit TOTP with a ±1 step window
//! for clock drift. Backup codes are single-use: a match is consumed
//! atomically in the store before success is reported.

use crate::error::{AuthError, AuthResult};
use lockbay_store::Store;
use lockbay_types::{
    AuditAction, AuditEvent, AuditLog, Notification, NotificationSink, TwoFactorCredential,
    User, UserId,
};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use totp_rs::{Algorithm, Secret, TOTP};
use tracing::info;

/// TOTP code length.
pub const TOTP_DIGITS: usize = 6;
/// TOTP time step in seconds.
pub const TOTP_STEP_SECS: u64 = 30;
/// Accepted clock drift, in steps, on either side of now.
pub const TOTP_SKEW: u8 = 1;

/// Bytes in a fresh shared secret (standard 160-bit TOTP secret).
const SECRET_BYTES: usize = 20;

/// Backup-code alphabet: uppercase, with the easily confused characters
/// (0/O, 1/I/L) removed so codes survive being read over the phone.
const BACKUP_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Tunables for the two-factor engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoFactorConfig {
    /// Issuer shown in authenticator apps and embedded in the
    /// provisioning URI.
    pub issuer: String,
    /// How many backup codes a setup or regeneration produces.
    pub backup_code_count: usize,
    /// Length of each backup code.
    pub backup_code_len: usize,
}

impl Default for TwoFactorConfig {
    fn default() -> Self {
        Self {
            issuer: "Lockbay".to_string(),
            backup_code_count: 10,
            backup_code_len: 10,
        }
    }
}

/// Everything a caller needs to walk the user through enrollment.
/// Nothing in here has been persisted yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupBundle {
    /// Base32-encoded candidate secret; round-trips through
    /// [`TwoFactor::complete_setup`].
    pub secret: String,
    /// `otpauth://totp/...` URI for authenticator apps.
    pub provisioning_uri: String,
    /// PNG rendering of the provisioning URI, base64-encoded.
    pub qr_png_base64: String,
    /// The secret in space-separated 4-character groups for manual entry.
    pub manual_entry_key: String,
    /// Fresh single-use backup codes; round-trip through
    /// [`TwoFactor::complete_setup`].
    pub backup_codes: Vec<String>,
}

/// Which mechanism satisfied a two-factor challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mechanism {
    /// A time-based code from the authenticator app.
    Totp,
    /// A single-use backup code.
    Backup,
}

impl Mechanism {
    /// Returns the canonical name of the mechanism.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Totp => "totp",
            Self::Backup => "backup",
        }
    }
}

/// The two-factor engine.
pub struct TwoFactor {
    store: Arc<dyn Store>,
    audit: Arc<dyn AuditLog>,
    notifier: Arc<dyn NotificationSink>,
    config: TwoFactorConfig,
}

impl TwoFactor {
    /// Creates the engine with its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        audit: Arc<dyn AuditLog>,
        notifier: Arc<dyn NotificationSink>,
        config: TwoFactorConfig,
    ) -> Self {
        Self {
            store,
            audit,
            notifier,
            config,
        }
    }

    fn require_user(&self, user_id: UserId) -> AuthResult<User> {
        self.store
            .find_user_by_id(user_id)?
            .ok_or(AuthError::UserNotFound)
    }

    fn totp(&self, secret_bytes: Vec<u8>, account: &str) -> AuthResult<TOTP> {
        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP_SECS,
            secret_bytes,
            Some(self.config.issuer.clone()),
            account.to_string(),
        )
        .map_err(|e| AuthError::Totp(e.to_string()))
    }

    fn totp_from_encoded(&self, secret_b32: &str, account: &str) -> AuthResult<TOTP> {
        let bytes = Secret::Encoded(secret_b32.to_string())
            .to_bytes()
            .map_err(|e| AuthError::Totp(format!("bad secret encoding: {e:?}")))?;
        self.totp(bytes, account)
    }

    fn check_current(totp: &TOTP, code: &str) -> AuthResult<bool> {
        totp.check_current(code)
            .map_err(|e| AuthError::Totp(format!("clock failure: {e}")))
    }

    fn generate_backup_codes(&self) -> Vec<String> {
        let mut rng = OsRng;
        (0..self.config.backup_code_count)
            .map(|_| {
                (0..self.config.backup_code_len)
                    .map(|_| BACKUP_ALPHABET[rng.gen_range(0..BACKUP_ALPHABET.len())] as char)
                    .collect()
            })
            .collect()
    }

    /// Generates a candidate secret, provisioning material and backup
    /// codes. Persists nothing; the caller must round-trip the secret and
    /// codes through [`Self::complete_setup`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AlreadyEnabled`] when the account already has
    /// two-factor on, [`AuthError::UserNotFound`] for unknown users.
    pub fn begin_setup(&self, user_id: UserId, account_label: &str) -> AuthResult<SetupBundle> {
        let user = self.require_user(user_id)?;
        if user.two_factor_enabled() {
            return Err(AuthError::AlreadyEnabled);
        }

        let mut raw = [0u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut raw);
        let secret = match Secret::Raw(raw.to_vec()).to_encoded() {
            Secret::Encoded(s) => s,
            // to_encoded always yields the Encoded variant.
            Secret::Raw(_) => unreachable!(),
        };

        let totp = self.totp(raw.to_vec(), account_label)?;
        let provisioning_uri = totp.get_url();
        let qr_png_base64 = totp.get_qr_base64().map_err(AuthError::Totp)?;
        let manual_entry_key = group_for_manual_entry(&secret);
        let backup_codes = self.generate_backup_codes();

        Ok(SetupBundle {
            secret,
            provisioning_uri,
            qr_png_base64,
            manual_entry_key,
            backup_codes,
        })
    }

    /// Activates two-factor: verifies `code` against the candidate secret
    /// and, only on success, persists the secret and backup codes in one
    /// write.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCode`] when the code does not verify
    /// against the candidate secret; nothing is persisted in that case.
    pub fn complete_setup(
        &self,
        user_id: UserId,
        candidate_secret: &str,
        code: &str,
        backup_codes: Vec<String>,
    ) -> AuthResult<()> {
        let mut user = self.require_user(user_id)?;
        if user.two_factor_enabled() {
            return Err(AuthError::AlreadyEnabled);
        }

        let totp = self.totp_from_encoded(candidate_secret, &user.email)?;
        if !Self::check_current(&totp, code)? {
            return Err(AuthError::InvalidCode);
        }

        user.two_factor = Some(TwoFactorCredential {
            secret: candidate_secret.to_string(),
            backup_codes: backup_codes.iter().map(|c| normalize_code(c)).collect(),
        });
        self.store.update_user(&user)?;

        info!(user = %user_id, "two-factor enabled");
        self.audit.record(AuditEvent::new(
            Some(user_id),
            AuditAction::TwoFactorEnabled,
            serde_json::json!({}),
        ));
        self.notifier
            .dispatch(Notification::TwoFactorEnabled { user: user_id });
        Ok(())
    }

    /// Verifies a submitted code against the enabled secret, falling back
    /// to the backup-code set. A matched backup code is consumed before
    /// success is reported, so replaying it fails.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotEnabled`] when the account has no enabled
    /// secret and [`AuthError::InvalidCode`] when neither mechanism
    /// matches.
    pub fn verify(&self, user_id: UserId, submitted_code: &str) -> AuthResult<Mechanism> {
        let user = self.require_user(user_id)?;
        let Some(cred) = &user.two_factor else {
            return Err(AuthError::NotEnabled);
        };

        let totp = self.totp_from_encoded(&cred.secret, &user.email)?;
        let mechanism = if Self::check_current(&totp, submitted_code.trim())? {
            Mechanism::Totp
        } else if self
            .store
            .take_backup_code(user_id, &normalize_code(submitted_code))?
        {
            Mechanism::Backup
        } else {
            return Err(AuthError::InvalidCode);
        };

        self.audit.record(AuditEvent::new(
            Some(user_id),
            AuditAction::TwoFactorVerified,
            serde_json::json!({ "mechanism": mechanism.as_str() }),
        ));
        Ok(mechanism)
    }

    /// Disables two-factor, clearing the secret and every backup code in
    /// one write. Returns false when it was not enabled.
    pub fn disable(&self, user_id: UserId) -> AuthResult<bool> {
        let mut user = self.require_user(user_id)?;
        if user.two_factor.take().is_none() {
            return Ok(false);
        }
        self.store.update_user(&user)?;

        info!(user = %user_id, "two-factor disabled");
        self.audit.record(AuditEvent::new(
            Some(user_id),
            AuditAction::TwoFactorDisabled,
            serde_json::json!({}),
        ));
        self.notifier
            .dispatch(Notification::TwoFactorDisabled { user: user_id });
        Ok(true)
    }

    /// Replaces the backup-code set. Previously issued codes stop
    /// validating as soon as the write commits.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotEnabled`] when two-factor is off.
    pub fn regenerate_backup_codes(&self, user_id: UserId) -> AuthResult<Vec<String>> {
        let mut user = self.require_user(user_id)?;
        let Some(cred) = user.two_factor.as_mut() else {
            return Err(AuthError::NotEnabled);
        };

        let codes = self.generate_backup_codes();
        cred.backup_codes = codes.clone();
        self.store.update_user(&user)?;

        self.audit.record(AuditEvent::new(
            Some(user_id),
            AuditAction::BackupCodesRegenerated,
            serde_json::json!({ "count": codes.len() }),
        ));
        Ok(codes)
    }
}

/// Canonical form used for storing and matching backup codes.
fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Reformats a base32 secret into space-separated 4-character groups.
fn group_for_manual_entry(secret: &str) -> String {
    secret
        .chars()
        .collect::<Vec<_>>()
        .chunks(4)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}
