//! Shared test helpers for the token and two-factor services.

#![allow(dead_code)]

use lockbay_auth::{TwoFactor, TwoFactorConfig, VerificationTokens};
use lockbay_store::{MemoryStore, Store};
use lockbay_types::{MemoryAudit, MemorySink, User, UserId};
use std::sync::Arc;

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub audit: Arc<MemoryAudit>,
    pub sink: Arc<MemorySink>,
    pub tokens: VerificationTokens,
    pub two_factor: TwoFactor,
}

pub fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let audit = Arc::new(MemoryAudit::new());
    let sink = Arc::new(MemorySink::new());
    let tokens = VerificationTokens::new(store.clone());
    let two_factor = TwoFactor::new(
        store.clone(),
        audit.clone(),
        sink.clone(),
        TwoFactorConfig::default(),
    );
    Fixture {
        store,
        audit,
        sink,
        tokens,
        two_factor,
    }
}

pub fn seed_user(store: &dyn Store) -> User {
    let user = User {
        id: UserId::new(),
        email: "customer@example.com".to_string(),
        two_factor: None,
    };
    store.insert_user(&user).unwrap();
    user
}

/// Generates a currently valid TOTP code for a base32 secret, using the
/// same parameters as the engine.
pub fn current_code(secret_b32: &str) -> String {
    let bytes = totp_rs::Secret::Encoded(secret_b32.to_string())
        .to_bytes()
        .unwrap();
    let totp = totp_rs::TOTP::new(
        totp_rs::Algorithm::SHA1,
        lockbay_auth::TOTP_DIGITS,
        lockbay_auth::TOTP_SKEW,
        lockbay_auth::TOTP_STEP_SECS,
        bytes,
        Some("Lockbay".to_string()),
        "customer@example.com".to_string(),
    )
    .unwrap();
    totp.generate_current().unwrap()
}
