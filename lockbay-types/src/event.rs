//! Audit and notification events emitted by the credential engine.
//!
//! Both collaborators are fire-and-forget from the core's perspective: a
//! failing audit sink or dispatcher must never fail the primary operation,
//! so the traits return nothing and implementations are expected to swallow
//! their own errors.

use crate::{LicenseId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

/// The action recorded by an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A license was revoked.
    LicenseRevoked,
    /// A license was bound (or rebound) to a hardware fingerprint.
    LicenseBound,
    /// A license was administratively reactivated.
    LicenseReactivated,
    /// Two-factor authentication was enabled.
    TwoFactorEnabled,
    /// Two-factor authentication was disabled.
    TwoFactorDisabled,
    /// A two-factor challenge was passed (TOTP or backup code).
    TwoFactorVerified,
    /// The backup-code set was replaced.
    BackupCodesRegenerated,
}

impl AuditAction {
    /// Returns the canonical name of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LicenseRevoked => "license_revoked",
            Self::LicenseBound => "license_bound",
            Self::LicenseReactivated => "license_reactivated",
            Self::TwoFactorEnabled => "two_factor_enabled",
            Self::TwoFactorDisabled => "two_factor_disabled",
            Self::TwoFactorVerified => "two_factor_verified",
            Self::BackupCodesRegenerated => "backup_codes_regenerated",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry for the security audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// The user the action concerns, when known.
    pub actor: Option<UserId>,
    /// What happened.
    pub action: AuditAction,
    /// Structured action-specific details.
    pub details: serde_json::Value,
    /// When the action happened.
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(actor: Option<UserId>, action: AuditAction, details: serde_json::Value) -> Self {
        Self {
            actor,
            action,
            details,
            at: Utc::now(),
        }
    }
}

/// Consumer of audit entries. Implementations must not propagate failures.
pub trait AuditLog: Send + Sync {
    /// Records one audit entry.
    fn record(&self, event: AuditEvent);
}

/// Audit sink that emits entries as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

impl AuditLog for TracingAudit {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "lockbay::audit",
            actor = ?event.actor,
            action = event.action.as_str(),
            details = %event.details,
            "audit"
        );
    }
}

/// Audit sink that captures entries in memory, for tests and embedders
/// that flush audit batches themselves.
#[derive(Debug, Default)]
pub struct MemoryAudit {
    entries: Mutex<Vec<AuditEvent>>,
}

impl MemoryAudit {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all recorded entries.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEvent> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl AuditLog for MemoryAudit {
    fn record(&self, event: AuditEvent) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

/// A state-change event handed to the notification dispatcher. Delivery
/// mechanics (email, push) are entirely outside the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    /// A license was revoked.
    LicenseRevoked {
        /// The revoked license.
        license: LicenseId,
        /// Its owner.
        user: UserId,
        /// Operator-supplied reason, if any.
        reason: Option<String>,
    },
    /// A license is approaching its expiry.
    LicenseExpiring {
        /// The expiring license.
        license: LicenseId,
        /// Its owner.
        user: UserId,
        /// When it expires.
        expires_at: DateTime<Utc>,
    },
    /// Two-factor authentication was enabled for an account.
    TwoFactorEnabled {
        /// The account.
        user: UserId,
    },
    /// Two-factor authentication was disabled for an account.
    TwoFactorDisabled {
        /// The account.
        user: UserId,
    },
}

/// Consumer of notification events. Implementations must not propagate
/// failures back into the core.
pub trait NotificationSink: Send + Sync {
    /// Hands one event to the dispatcher.
    fn dispatch(&self, note: Notification);
}

/// Notification sink that captures events in memory, for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    notes: Mutex<Vec<Notification>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all dispatched events.
    #[must_use]
    pub fn notes(&self) -> Vec<Notification> {
        self.notes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl NotificationSink for MemorySink {
    fn dispatch(&self, note: Notification) {
        self.notes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(note);
    }
}
