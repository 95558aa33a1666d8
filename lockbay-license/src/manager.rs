//! The license state machine.
//!
//! States: ACTIVE, EXPIRED, REVOKED. ACTIVE→EXPIRED happens lazily during
//! validation or via the periodic sweep (both idempotent, so they may race
//! freely); REVOKED is terminal except for the explicit administrative
//! [`LicenseManager::reactivate`].
//!
//! Administrative operations (`bind`, `revoke`, `extend`, `reactivate`)
//! report lookup misses as `Ok(false)` so bulk callers are not forced into
//! error-driven control flow; only persistence faults are `Err`.

use crate::device::{HardwareFingerprint, HardwareInfo};
use crate::error::{LicenseError, LicenseResult};
use crate::key;
use chrono::{Duration, Utc};
use lockbay_store::{Store, StoreError};
use lockbay_types::{
    AuditAction, AuditEvent, AuditLog, License, LicenseId, LicenseStatus, LicenseSummary,
    Notification, NotificationSink, ProductId, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How many times `create` retries key generation on a uniqueness conflict
/// before giving up.
pub const KEY_RETRY_ATTEMPTS: usize = 3;

/// Why a validation was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No license with that key exists.
    NotFound,
    /// The license is not ACTIVE (expired or revoked).
    InvalidState,
    /// The license lapsed; it has been transitioned to EXPIRED.
    Expired,
    /// The supplied product does not match the license's product.
    ProductMismatch,
    /// The supplied hardware does not reproduce the bound fingerprint.
    HardwareMismatch,
}

/// Outcome of a validation request.
///
/// Rejection is the routine case in a license-checking flow, so it is a
/// tagged value with a human-presentable message rather than an error. The
/// message never exposes internal identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Validation {
    /// The license is valid; the public projection is attached.
    Valid {
        /// Public projection of the validated license.
        license: LicenseSummary,
    },
    /// The license was rejected.
    Invalid {
        /// Rejection category.
        reason: RejectReason,
        /// Human-presentable message.
        message: String,
    },
}

impl Validation {
    /// Returns true for the valid outcome.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    fn invalid(reason: RejectReason, message: impl Into<String>) -> Self {
        Self::Invalid {
            reason,
            message: message.into(),
        }
    }
}

/// Owns the license lifecycle. Stateless between calls; every check reads
/// the latest committed state from the store.
pub struct LicenseManager {
    store: Arc<dyn Store>,
    audit: Arc<dyn AuditLog>,
    notifier: Arc<dyn NotificationSink>,
}

impl LicenseManager {
    /// Creates a manager with its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        audit: Arc<dyn AuditLog>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store,
            audit,
            notifier,
        }
    }

    /// Mints a license at purchase confirmation.
    ///
    /// `valid_days` of `None` creates a perpetual license. Key generation
    /// is retried up to [`KEY_RETRY_ATTEMPTS`] times on a uniqueness
    /// conflict; each retry draws a fresh nonce.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyCollision`] when every attempt collided,
    /// or a store error.
    pub fn create(
        &self,
        product_id: ProductId,
        user_id: UserId,
        valid_days: Option<u32>,
    ) -> LicenseResult<License> {
        let now = Utc::now();
        let expires_at = valid_days.map(|d| now + Duration::days(i64::from(d)));

        for attempt in 1..=KEY_RETRY_ATTEMPTS {
            let license = License {
                id: LicenseId::new(),
                key: key::generate_key(product_id, user_id),
                user_id,
                product_id,
                status: LicenseStatus::Active,
                expires_at,
                hardware_fingerprint: None,
                revoked_at: None,
                revocation_reason: None,
                created_at: now,
            };
            match self.store.insert_license(&license) {
                Ok(()) => {
                    debug!(license = %license.id, product = %product_id, "license created");
                    return Ok(license);
                }
                Err(StoreError::Duplicate(_)) => {
                    warn!(attempt, "license key collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(LicenseError::KeyCollision(KEY_RETRY_ATTEMPTS))
    }

    /// Validates a license key against an optional product and optional
    /// hardware attributes.
    ///
    /// A lapsed license is transitioned to EXPIRED as a side effect before
    /// the rejection is returned. A license with no recorded fingerprint
    /// validates without binding; binding is a separate explicit step, so
    /// a license is never silently locked to the first machine that checks
    /// it.
    ///
    /// # Errors
    ///
    /// Only persistence faults; every business rejection is a
    /// [`Validation::Invalid`] value.
    pub fn validate(
        &self,
        license_key: &str,
        product_id: Option<ProductId>,
        hardware: Option<&HardwareInfo>,
    ) -> LicenseResult<Validation> {
        let Some(mut license) = self.store.find_license_by_key(license_key)? else {
            return Ok(Validation::invalid(
                RejectReason::NotFound,
                "license key not found",
            ));
        };

        if license.status != LicenseStatus::Active {
            return Ok(Validation::invalid(
                RejectReason::InvalidState,
                format!("license is {}", license.status),
            ));
        }

        if let Some(product) = product_id {
            if product != license.product_id {
                return Ok(Validation::invalid(
                    RejectReason::ProductMismatch,
                    "license was issued for a different product",
                ));
            }
        }

        if license.is_lapsed(Utc::now()) {
            // Lazy expiry: record the transition before rejecting.
            license.status = LicenseStatus::Expired;
            self.store.update_license(&license)?;
            debug!(license = %license.id, "license lazily expired on validate");
            return Ok(Validation::invalid(
                RejectReason::Expired,
                "license has expired",
            ));
        }

        if let (Some(bound), Some(info)) = (&license.hardware_fingerprint, hardware) {
            if HardwareFingerprint::compute(info).digest() != bound {
                return Ok(Validation::invalid(
                    RejectReason::HardwareMismatch,
                    "license is bound to different hardware",
                ));
            }
        }

        Ok(Validation::Valid {
            license: license.summary(),
        })
    }

    /// Computes and persists the hardware fingerprint for a license.
    ///
    /// Idempotent for identical hardware; different hardware overwrites the
    /// recorded fingerprint (rebinding is an owner/administrative decision,
    /// not blocked at this layer; the audit entry distinguishes it).
    /// Returns false when the license does not exist.
    pub fn bind(&self, license_id: LicenseId, hardware: &HardwareInfo) -> LicenseResult<bool> {
        let Some(mut license) = self.store.find_license_by_id(license_id)? else {
            return Ok(false);
        };
        let fingerprint = HardwareFingerprint::compute(hardware);
        let rebind = license
            .hardware_fingerprint
            .as_deref()
            .is_some_and(|cur| cur != fingerprint.digest());
        license.hardware_fingerprint = Some(fingerprint.digest().to_string());
        if !self.store.update_license(&license)? {
            return Ok(false);
        }
        self.audit.record(AuditEvent::new(
            Some(license.user_id),
            AuditAction::LicenseBound,
            serde_json::json!({ "license": license.id, "rebind": rebind }),
        ));
        Ok(true)
    }

    /// Revokes a license. Idempotent: revoking an already-revoked license
    /// is a no-op success. Returns false when the license does not exist.
    pub fn revoke(&self, license_id: LicenseId, reason: Option<&str>) -> LicenseResult<bool> {
        let Some(mut license) = self.store.find_license_by_id(license_id)? else {
            return Ok(false);
        };
        if license.status == LicenseStatus::Revoked {
            return Ok(true);
        }
        license.status = LicenseStatus::Revoked;
        license.revoked_at = Some(Utc::now());
        license.revocation_reason = reason.map(String::from);
        if !self.store.update_license(&license)? {
            return Ok(false);
        }
        info!(license = %license.id, reason, "license revoked");
        self.audit.record(AuditEvent::new(
            Some(license.user_id),
            AuditAction::LicenseRevoked,
            serde_json::json!({ "license": license.id, "reason": reason }),
        ));
        self.notifier.dispatch(Notification::LicenseRevoked {
            license: license.id,
            user: license.user_id,
            reason: reason.map(String::from),
        });
        Ok(true)
    }

    /// Extends a license by `days`, measured from `max(current expiry, now)`
    /// so that extending a lapsed license re-opens its forward horizon
    /// instead of compounding from the stale expiry. Status is untouched: an EXPIRED
    /// license needs an explicit [`Self::reactivate`]. A perpetual license
    /// is left perpetual. Returns false when the license does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidExtension`] when `days` is zero.
    pub fn extend(&self, license_id: LicenseId, days: u32) -> LicenseResult<bool> {
        if days == 0 {
            return Err(LicenseError::InvalidExtension);
        }
        let Some(mut license) = self.store.find_license_by_id(license_id)? else {
            return Ok(false);
        };
        let Some(current) = license.expires_at else {
            warn!(license = %license.id, "extend on a perpetual license is a no-op");
            return Ok(true);
        };
        let now = Utc::now();
        license.expires_at = Some(current.max(now) + Duration::days(i64::from(days)));
        Ok(self.store.update_license(&license)?)
    }

    /// Administrative reactivation: sets a license back to ACTIVE,
    /// clearing revocation bookkeeping. The expiry is left as-is, so a
    /// reactivated license with a stale expiry lapses again on the next
    /// validation unless it is also extended. Returns false when the
    /// license does not exist.
    pub fn reactivate(&self, license_id: LicenseId) -> LicenseResult<bool> {
        let Some(mut license) = self.store.find_license_by_id(license_id)? else {
            return Ok(false);
        };
        if license.status == LicenseStatus::Active {
            return Ok(true);
        }
        license.status = LicenseStatus::Active;
        license.revoked_at = None;
        license.revocation_reason = None;
        if !self.store.update_license(&license)? {
            return Ok(false);
        }
        info!(license = %license.id, "license reactivated");
        self.audit.record(AuditEvent::new(
            Some(license.user_id),
            AuditAction::LicenseReactivated,
            serde_json::json!({ "license": license.id }),
        ));
        Ok(true)
    }

    /// Batch-transitions lapsed ACTIVE licenses to EXPIRED, returning the
    /// count. Run periodically by an external scheduler; safe to race with
    /// lazy expiry since the transition is idempotent.
    pub fn sweep_expired(&self) -> LicenseResult<u64> {
        let count = self.store.expire_lapsed_licenses(Utc::now())?;
        if count > 0 {
            info!(count, "expired licenses swept");
        }
        Ok(count)
    }

    /// Lists ACTIVE licenses expiring within the next `days`. Pure read.
    pub fn list_expiring_within(&self, days: u32) -> LicenseResult<Vec<License>> {
        let deadline = Utc::now() + Duration::days(i64::from(days));
        Ok(self.store.list_active_expiring_before(deadline)?)
    }

    /// Emits a [`Notification::LicenseExpiring`] for every license expiring
    /// within the next `days`, returning how many were emitted.
    pub fn notify_expiring(&self, days: u32) -> LicenseResult<u64> {
        let expiring = self.list_expiring_within(days)?;
        let count = expiring.len() as u64;
        for license in expiring {
            if let Some(expires_at) = license.expires_at {
                self.notifier.dispatch(Notification::LicenseExpiring {
                    license: license.id,
                    user: license.user_id,
                    expires_at,
                });
            }
        }
        Ok(count)
    }
}
