//! Shared fixtures and store-contract checks, run against every backend.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use lockbay_store::{Store, StoreError};
use lockbay_types::{
    License, LicenseId, LicenseStatus, ProductId, TokenId, TokenKind, TwoFactorCredential, User,
    UserId, VerificationToken,
};

pub fn make_license(key: &str, expires_at: Option<DateTime<Utc>>) -> License {
    License {
        id: LicenseId::new(),
        key: key.to_string(),
        user_id: UserId::new(),
        product_id: ProductId::new(),
        status: LicenseStatus::Active,
        expires_at,
        hardware_fingerprint: None,
        revoked_at: None,
        revocation_reason: None,
        created_at: Utc::now(),
    }
}

pub fn make_user(with_two_factor: bool) -> User {
    User {
        id: UserId::new(),
        email: "user@example.com".to_string(),
        two_factor: with_two_factor.then(|| TwoFactorCredential {
            secret: "JBSWY3DPEHPK3PXP".to_string(),
            backup_codes: vec!["CODEAAAA".to_string(), "CODEBBBB".to_string()],
        }),
    }
}

pub fn make_token(user_id: UserId, kind: TokenKind, expires_at: DateTime<Utc>) -> VerificationToken {
    VerificationToken {
        id: TokenId::new(),
        user_id,
        kind,
        secret: format!("secret-{}", TokenId::new()),
        expires_at,
    }
}

// ── contract checks, shared by every backend ─────────────────────

pub fn check_license_roundtrip(store: &dyn Store) {
    let license = make_license("AAAA-BBBB-CCCC-DDDD", None);
    store.insert_license(&license).unwrap();

    let by_key = store.find_license_by_key(&license.key).unwrap().unwrap();
    assert_eq!(by_key, license);
    let by_id = store.find_license_by_id(license.id).unwrap().unwrap();
    assert_eq!(by_id, license);
    assert!(store.find_license_by_key("XXXX-YYYY-ZZZZ-0000").unwrap().is_none());
}

pub fn check_duplicate_key_rejected(store: &dyn Store) {
    let a = make_license("AAAA-BBBB-CCCC-1111", None);
    let mut b = make_license("AAAA-BBBB-CCCC-1111", None);
    b.id = LicenseId::new();
    store.insert_license(&a).unwrap();
    assert!(matches!(
        store.insert_license(&b),
        Err(StoreError::Duplicate(_))
    ));
}

pub fn check_update_license(store: &dyn Store) {
    let mut license = make_license("AAAA-BBBB-CCCC-2222", None);
    store.insert_license(&license).unwrap();

    license.status = LicenseStatus::Revoked;
    license.revoked_at = Some(Utc::now());
    license.revocation_reason = Some("fraud".to_string());
    assert!(store.update_license(&license).unwrap());
    let loaded = store.find_license_by_id(license.id).unwrap().unwrap();
    assert_eq!(loaded.status, LicenseStatus::Revoked);
    assert_eq!(loaded.revocation_reason.as_deref(), Some("fraud"));

    let ghost = make_license("GGGG-HHHH-IIII-JJJJ", None);
    assert!(!store.update_license(&ghost).unwrap());
}

pub fn check_expiry_sweep(store: &dyn Store) {
    let now = Utc::now();
    let lapsed = make_license("LAPS-0000-0000-0001", Some(now - Duration::hours(1)));
    let fresh = make_license("FRSH-0000-0000-0001", Some(now + Duration::hours(1)));
    let perpetual = make_license("PERP-0000-0000-0001", None);
    store.insert_license(&lapsed).unwrap();
    store.insert_license(&fresh).unwrap();
    store.insert_license(&perpetual).unwrap();

    assert_eq!(store.expire_lapsed_licenses(now).unwrap(), 1);
    // Idempotent: a second sweep changes nothing.
    assert_eq!(store.expire_lapsed_licenses(now).unwrap(), 0);

    let swept = store.find_license_by_id(lapsed.id).unwrap().unwrap();
    assert_eq!(swept.status, LicenseStatus::Expired);
    let kept = store.find_license_by_id(fresh.id).unwrap().unwrap();
    assert_eq!(kept.status, LicenseStatus::Active);
}

pub fn check_list_expiring(store: &dyn Store) {
    let now = Utc::now();
    let soon = make_license("SOON-0000-0000-0001", Some(now + Duration::days(3)));
    let later = make_license("LATR-0000-0000-0001", Some(now + Duration::days(60)));
    let perpetual = make_license("PERP-0000-0000-0002", None);
    store.insert_license(&soon).unwrap();
    store.insert_license(&later).unwrap();
    store.insert_license(&perpetual).unwrap();

    let listed = store
        .list_active_expiring_before(now + Duration::days(7))
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, soon.id);
}

pub fn check_user_roundtrip(store: &dyn Store) {
    let user = make_user(true);
    store.insert_user(&user).unwrap();
    let loaded = store.find_user_by_id(user.id).unwrap().unwrap();
    assert_eq!(loaded, user);
    assert!(store.find_user_by_id(UserId::new()).unwrap().is_none());
}

pub fn check_update_user_clears_two_factor(store: &dyn Store) {
    let mut user = make_user(true);
    store.insert_user(&user).unwrap();

    user.two_factor = None;
    assert!(store.update_user(&user).unwrap());
    let loaded = store.find_user_by_id(user.id).unwrap().unwrap();
    assert!(loaded.two_factor.is_none());
    // The secret and the codes disappear together.
    assert!(!store.take_backup_code(user.id, "CODEAAAA").unwrap());
}

pub fn check_take_backup_code_single_use(store: &dyn Store) {
    let user = make_user(true);
    store.insert_user(&user).unwrap();

    assert!(store.take_backup_code(user.id, "CODEAAAA").unwrap());
    assert!(!store.take_backup_code(user.id, "CODEAAAA").unwrap());

    let remaining = store
        .find_user_by_id(user.id)
        .unwrap()
        .unwrap()
        .two_factor
        .unwrap()
        .backup_codes;
    assert_eq!(remaining, vec!["CODEBBBB".to_string()]);
}

pub fn check_replace_token_single_live(store: &dyn Store) {
    let user = make_user(false);
    store.insert_user(&user).unwrap();
    let now = Utc::now();

    let first = make_token(user.id, TokenKind::EmailVerification, now + Duration::hours(24));
    let second = make_token(user.id, TokenKind::EmailVerification, now + Duration::hours(24));
    let other_kind = make_token(user.id, TokenKind::PasswordReset, now + Duration::hours(1));

    assert_eq!(store.replace_token(&first).unwrap(), 0);
    assert_eq!(store.replace_token(&other_kind).unwrap(), 0);
    assert_eq!(store.replace_token(&second).unwrap(), 1);

    // The first token is gone; the second redeems; the other kind survives.
    assert!(store
        .take_token(&first.secret, TokenKind::EmailVerification, now)
        .unwrap()
        .is_none());
    let taken = store
        .take_token(&second.secret, TokenKind::EmailVerification, now)
        .unwrap()
        .unwrap();
    assert_eq!(taken.id, second.id);
    assert!(store
        .take_token(&other_kind.secret, TokenKind::PasswordReset, now)
        .unwrap()
        .is_some());
}

pub fn check_take_token_exactly_once(store: &dyn Store) {
    let user = make_user(false);
    store.insert_user(&user).unwrap();
    let now = Utc::now();
    let token = make_token(user.id, TokenKind::PasswordReset, now + Duration::hours(1));
    store.replace_token(&token).unwrap();

    assert!(store
        .take_token(&token.secret, TokenKind::PasswordReset, now)
        .unwrap()
        .is_some());
    assert!(store
        .take_token(&token.secret, TokenKind::PasswordReset, now)
        .unwrap()
        .is_none());
}

pub fn check_take_token_respects_kind_and_expiry(store: &dyn Store) {
    let user = make_user(false);
    store.insert_user(&user).unwrap();
    let now = Utc::now();

    let expired = make_token(user.id, TokenKind::PasswordReset, now - Duration::seconds(1));
    store.replace_token(&expired).unwrap();
    assert!(store
        .take_token(&expired.secret, TokenKind::PasswordReset, now)
        .unwrap()
        .is_none());

    let live = make_token(user.id, TokenKind::EmailVerification, now + Duration::hours(1));
    store.replace_token(&live).unwrap();
    // Right secret, wrong kind.
    assert!(store
        .take_token(&live.secret, TokenKind::PasswordReset, now)
        .unwrap()
        .is_none());
}

pub fn check_delete_expired_tokens(store: &dyn Store) {
    let user = make_user(false);
    store.insert_user(&user).unwrap();
    let now = Utc::now();

    let stale = make_token(user.id, TokenKind::TwoFactorSetup, now - Duration::hours(1));
    let live = make_token(user.id, TokenKind::PasswordReset, now + Duration::hours(1));
    store.replace_token(&stale).unwrap();
    store.replace_token(&live).unwrap();

    assert_eq!(store.delete_expired_tokens(now).unwrap(), 1);
    assert!(store
        .take_token(&live.secret, TokenKind::PasswordReset, now)
        .unwrap()
        .is_some());
}
