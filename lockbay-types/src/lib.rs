//! Core type definitions for the Lockbay credential engine.
//!
//! This crate holds the domain model shared by every other Lockbay crate:
//! - Identifier newtypes (UUID v7 for natural ordering)
//! - The license, verification-token and two-factor data model
//! - Audit and notification events plus the consumer traits for them
//!
//! It contains no persistence or crypto logic; that lives in
//! `lockbay-store`, `lockbay-license` and `lockbay-auth`.

mod event;
mod ids;
mod model;

pub use event::{
    AuditAction, AuditEvent, AuditLog, MemoryAudit, MemorySink, Notification, NotificationSink,
    TracingAudit,
};
pub use ids::{LicenseId, ProductId, TokenId, UserId};
pub use model::{
    License, LicenseStatus, LicenseSummary, TokenKind, TwoFactorCredential, User,
    VerificationToken,
};
