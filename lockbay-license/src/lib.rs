//! License lifecycle engine for Lockbay.
//!
//! This crate handles:
//! - Hardware fingerprinting for device binding
//! - Deterministic generation of human-presentable license keys
//! - The license state machine: validation, binding, extension,
//!   revocation, reactivation and the expiry sweep
//!
//! # Design Principles
//!
//! - **Typed outcomes**: validation failure is a routine result (expired
//!   trial, wrong machine), returned as a tagged [`Validation`] value, not
//!   an error
//! - **Lazy expiry**: a lapsed license flips to EXPIRED as a side effect
//!   of validation; the periodic sweep covers licenses nobody validates
//! - **No hidden state**: the manager is constructed with its store,
//!   audit log and notification collaborators; nothing is global
//!
//! # License Key Format
//!
//! Keys are 16 uppercase alphanumeric characters in hyphenated groups of
//! four: `XXXX-XXXX-XXXX-XXXX`. They are derived from a hash of product,
//! owner, time and a random nonce, and are not reversible.

mod device;
mod error;
mod key;
mod manager;

pub use device::{HardwareFingerprint, HardwareInfo};
pub use error::{LicenseError, LicenseResult};
pub use key::{generate_key, is_canonical_key};
pub use manager::{LicenseManager, RejectReason, Validation, KEY_RETRY_ATTEMPTS};
