mod common;

use chrono::{Duration, Utc};
use common::{fixture, seed_user};
use lockbay_auth::{AuthError, TOKEN_SECRET_BYTES};
use lockbay_store::Store;
use lockbay_types::{TokenId, TokenKind, UserId, VerificationToken};

#[test]
fn issue_then_redeem_returns_owner() {
    let f = fixture();
    let user = seed_user(f.store.as_ref());

    let token = f.tokens.issue(user.id, TokenKind::PasswordReset).unwrap();
    let redeemed = f.tokens.redeem(&token.secret, TokenKind::PasswordReset).unwrap();
    assert_eq!(redeemed.id, user.id);
}

#[test]
fn second_redeem_fails() {
    let f = fixture();
    let user = seed_user(f.store.as_ref());

    let token = f.tokens.issue(user.id, TokenKind::PasswordReset).unwrap();
    f.tokens.redeem(&token.secret, TokenKind::PasswordReset).unwrap();
    assert!(matches!(
        f.tokens.redeem(&token.secret, TokenKind::PasswordReset),
        Err(AuthError::InvalidOrExpired)
    ));
}

#[test]
fn wrong_kind_fails_identically() {
    let f = fixture();
    let user = seed_user(f.store.as_ref());

    let token = f.tokens.issue(user.id, TokenKind::EmailVerification).unwrap();
    assert!(matches!(
        f.tokens.redeem(&token.secret, TokenKind::PasswordReset),
        Err(AuthError::InvalidOrExpired)
    ));
    // The token is still live under its real kind.
    assert!(f
        .tokens
        .redeem(&token.secret, TokenKind::EmailVerification)
        .is_ok());
}

#[test]
fn reissue_leaves_exactly_one_live_token() {
    let f = fixture();
    let user = seed_user(f.store.as_ref());

    let first = f.tokens.issue(user.id, TokenKind::EmailVerification).unwrap();
    let second = f.tokens.issue(user.id, TokenKind::EmailVerification).unwrap();

    assert!(matches!(
        f.tokens.redeem(&first.secret, TokenKind::EmailVerification),
        Err(AuthError::InvalidOrExpired)
    ));
    assert!(f
        .tokens
        .redeem(&second.secret, TokenKind::EmailVerification)
        .is_ok());
}

#[test]
fn kinds_do_not_invalidate_each_other() {
    let f = fixture();
    let user = seed_user(f.store.as_ref());

    let reset = f.tokens.issue(user.id, TokenKind::PasswordReset).unwrap();
    let verify = f.tokens.issue(user.id, TokenKind::EmailVerification).unwrap();

    assert!(f.tokens.redeem(&reset.secret, TokenKind::PasswordReset).is_ok());
    assert!(f
        .tokens
        .redeem(&verify.secret, TokenKind::EmailVerification)
        .is_ok());
}

#[test]
fn issue_for_unknown_user_fails() {
    let f = fixture();
    assert!(matches!(
        f.tokens.issue(UserId::new(), TokenKind::PasswordReset),
        Err(AuthError::UserNotFound)
    ));
}

#[test]
fn expired_token_does_not_redeem() {
    let f = fixture();
    let user = seed_user(f.store.as_ref());

    // Plant an already-expired token directly in the store.
    let stale = VerificationToken {
        id: TokenId::new(),
        user_id: user.id,
        kind: TokenKind::PasswordReset,
        secret: "stale-secret".to_string(),
        expires_at: Utc::now() - Duration::seconds(1),
    };
    f.store.replace_token(&stale).unwrap();

    assert!(matches!(
        f.tokens.redeem("stale-secret", TokenKind::PasswordReset),
        Err(AuthError::InvalidOrExpired)
    ));
}

#[test]
fn ttl_follows_kind() {
    let f = fixture();
    let user = seed_user(f.store.as_ref());

    let before = Utc::now();
    let token = f.tokens.issue(user.id, TokenKind::EmailVerification).unwrap();
    let ttl = token.expires_at - before;
    assert!(ttl <= Duration::hours(24));
    assert!(ttl > Duration::hours(23));

    let token = f.tokens.issue(user.id, TokenKind::PasswordReset).unwrap();
    let ttl = token.expires_at - before;
    assert!(ttl <= Duration::hours(1));
    assert!(ttl > Duration::minutes(59));
}

#[test]
fn secrets_are_long_and_unique() {
    let f = fixture();
    let user = seed_user(f.store.as_ref());

    let a = f.tokens.issue(user.id, TokenKind::PasswordReset).unwrap();
    let b = f.tokens.issue(user.id, TokenKind::PasswordReset).unwrap();
    assert_ne!(a.secret, b.secret);
    // base64url of 32 bytes, unpadded.
    assert_eq!(a.secret.len(), TOKEN_SECRET_BYTES * 4 / 3 + 1);
}

#[test]
fn sweep_deletes_only_expired() {
    let f = fixture();
    let user = seed_user(f.store.as_ref());

    let stale = VerificationToken {
        id: TokenId::new(),
        user_id: user.id,
        kind: TokenKind::TwoFactorSetup,
        secret: "stale-secret".to_string(),
        expires_at: Utc::now() - Duration::hours(1),
    };
    f.store.replace_token(&stale).unwrap();
    let live = f.tokens.issue(user.id, TokenKind::PasswordReset).unwrap();

    assert_eq!(f.tokens.sweep_expired().unwrap(), 1);
    assert!(f.tokens.redeem(&live.secret, TokenKind::PasswordReset).is_ok());
}
