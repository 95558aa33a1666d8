//! In-memory store implementation.
//!
//! All state sits behind a single mutex, which trivially satisfies the
//! atomicity contract of the [`Store`] trait: every trait method is one
//! critical section. Used by tests and by embedders that do not need
//! durability.

use crate::{Store, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use lockbay_types::{License, LicenseId, LicenseStatus, TokenKind, User, UserId, VerificationToken};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    licenses: HashMap<LicenseId, License>,
    /// license key → row id, mirrors the UNIQUE constraint on keys.
    key_index: HashMap<String, LicenseId>,
    users: HashMap<UserId, User>,
    tokens: Vec<VerificationToken>,
}

/// A single-mutex in-memory [`Store`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Store for MemoryStore {
    fn insert_license(&self, license: &License) -> StoreResult<()> {
        let mut inner = self.lock();
        if inner.key_index.contains_key(&license.key) {
            return Err(StoreError::Duplicate(format!(
                "license key {}",
                license.key
            )));
        }
        if inner.licenses.contains_key(&license.id) {
            return Err(StoreError::Duplicate(format!("license id {}", license.id)));
        }
        inner.key_index.insert(license.key.clone(), license.id);
        inner.licenses.insert(license.id, license.clone());
        Ok(())
    }

    fn find_license_by_key(&self, key: &str) -> StoreResult<Option<License>> {
        let inner = self.lock();
        Ok(inner
            .key_index
            .get(key)
            .and_then(|id| inner.licenses.get(id))
            .cloned())
    }

    fn find_license_by_id(&self, id: LicenseId) -> StoreResult<Option<License>> {
        Ok(self.lock().licenses.get(&id).cloned())
    }

    fn update_license(&self, license: &License) -> StoreResult<bool> {
        let mut inner = self.lock();
        match inner.licenses.get_mut(&license.id) {
            Some(row) => {
                *row = license.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn expire_lapsed_licenses(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut inner = self.lock();
        let mut count = 0;
        for license in inner.licenses.values_mut() {
            if license.status == LicenseStatus::Active && license.is_lapsed(now) {
                license.status = LicenseStatus::Expired;
                count += 1;
            }
        }
        Ok(count)
    }

    fn list_active_expiring_before(&self, deadline: DateTime<Utc>) -> StoreResult<Vec<License>> {
        let inner = self.lock();
        let mut out: Vec<License> = inner
            .licenses
            .values()
            .filter(|l| {
                l.status == LicenseStatus::Active && l.expires_at.is_some_and(|exp| exp <= deadline)
            })
            .cloned()
            .collect();
        out.sort_by_key(|l| l.expires_at);
        Ok(out)
    }

    fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.lock();
        if inner.users.contains_key(&user.id) {
            return Err(StoreError::Duplicate(format!("user id {}", user.id)));
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    fn find_user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.lock().users.get(&id).cloned())
    }

    fn update_user(&self, user: &User) -> StoreResult<bool> {
        let mut inner = self.lock();
        match inner.users.get_mut(&user.id) {
            Some(row) => {
                *row = user.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn take_backup_code(&self, user_id: UserId, code: &str) -> StoreResult<bool> {
        let mut inner = self.lock();
        let Some(user) = inner.users.get_mut(&user_id) else {
            return Ok(false);
        };
        let Some(cred) = user.two_factor.as_mut() else {
            return Ok(false);
        };
        match cred.backup_codes.iter().position(|c| c == code) {
            Some(idx) => {
                cred.backup_codes.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn replace_token(&self, token: &VerificationToken) -> StoreResult<u64> {
        let mut inner = self.lock();
        let before = inner.tokens.len();
        inner
            .tokens
            .retain(|t| !(t.user_id == token.user_id && t.kind == token.kind));
        let invalidated = (before - inner.tokens.len()) as u64;
        inner.tokens.push(token.clone());
        Ok(invalidated)
    }

    fn take_token(
        &self,
        secret: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<VerificationToken>> {
        let mut inner = self.lock();
        match inner
            .tokens
            .iter()
            .position(|t| t.secret == secret && t.kind == kind && t.is_live(now))
        {
            Some(idx) => Ok(Some(inner.tokens.remove(idx))),
            None => Ok(None),
        }
    }

    fn delete_expired_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut inner = self.lock();
        let before = inner.tokens.len();
        inner.tokens.retain(|t| t.is_live(now));
        Ok((before - inner.tokens.len()) as u64)
    }
}
