//! Issuance and single-use redemption of verification tokens.
//!
//! A token is a 256-bit random secret with a kind-specific TTL. Two
//! invariants are enforced through the store's atomic operations:
//!
//! - at most one live token per `(user, kind)`: issuing replaces all prior
//!   tokens of that pair in one atomic unit
//! - exactly-once redemption: the lookup is a conditional delete-and-return,
//!   so concurrent redemptions of the same secret yield one winner

use crate::error::{AuthError, AuthResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use lockbay_store::Store;
use lockbay_types::{TokenId, TokenKind, User, UserId, VerificationToken};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use tracing::{debug, info};

/// Bytes of entropy in a token secret (256 bits).
pub const TOKEN_SECRET_BYTES: usize = 32;

/// Issues, redeems and sweeps verification tokens.
pub struct VerificationTokens {
    store: Arc<dyn Store>,
}

impl VerificationTokens {
    /// Creates the service over a store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Issues a fresh token for `(user, kind)`, invalidating every prior
    /// token of that pair.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UserNotFound`] when the user does not exist,
    /// or a store error.
    pub fn issue(&self, user_id: UserId, kind: TokenKind) -> AuthResult<VerificationToken> {
        if self.store.find_user_by_id(user_id)?.is_none() {
            return Err(AuthError::UserNotFound);
        }

        let mut bytes = [0u8; TOKEN_SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);

        let token = VerificationToken {
            id: TokenId::new(),
            user_id,
            kind,
            secret: URL_SAFE_NO_PAD.encode(bytes),
            expires_at: Utc::now() + kind.ttl(),
        };
        let invalidated = self.store.replace_token(&token)?;
        if invalidated > 0 {
            debug!(user = %user_id, kind = %kind, invalidated, "prior tokens invalidated");
        }
        Ok(token)
    }

    /// Redeems a token: consumes it and returns the owning user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidOrExpired`] when no live token matches;
    /// the message is identical whether the secret was wrong, of the wrong
    /// kind, already consumed, or expired.
    pub fn redeem(&self, secret: &str, kind: TokenKind) -> AuthResult<User> {
        let Some(token) = self.store.take_token(secret, kind, Utc::now())? else {
            return Err(AuthError::InvalidOrExpired);
        };
        match self.store.find_user_by_id(token.user_id)? {
            Some(user) => Ok(user),
            // Orphaned token; report it like any other miss.
            None => Err(AuthError::InvalidOrExpired),
        }
    }

    /// Deletes every expired token, returning the count. Run periodically
    /// by an external scheduler; safe to race with redemption.
    pub fn sweep_expired(&self) -> AuthResult<u64> {
        let count = self.store.delete_expired_tokens(Utc::now())?;
        if count > 0 {
            info!(count, "expired tokens swept");
        }
        Ok(count)
    }
}
