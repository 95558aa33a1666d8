//! Shared test helpers for the license engine.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use lockbay_license::LicenseManager;
use lockbay_store::{MemoryStore, Store, StoreError, StoreResult};
use lockbay_types::{
    License, LicenseId, MemoryAudit, MemorySink, TokenKind, User, UserId, VerificationToken,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub audit: Arc<MemoryAudit>,
    pub sink: Arc<MemorySink>,
    pub manager: LicenseManager,
}

/// A manager wired to in-memory collaborators.
pub fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let audit = Arc::new(MemoryAudit::new());
    let sink = Arc::new(MemorySink::new());
    let manager = LicenseManager::new(store.clone(), audit.clone(), sink.clone());
    Fixture {
        store,
        audit,
        sink,
        manager,
    }
}

/// Store wrapper that reports a duplicate key for the first
/// `collisions` license inserts, to exercise the regeneration path.
pub struct CollidingStore {
    inner: MemoryStore,
    remaining: AtomicUsize,
}

impl CollidingStore {
    pub fn new(collisions: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            remaining: AtomicUsize::new(collisions),
        }
    }
}

impl Store for CollidingStore {
    fn insert_license(&self, license: &License) -> StoreResult<()> {
        if self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Duplicate("license key".to_string()));
        }
        self.inner.insert_license(license)
    }

    fn find_license_by_key(&self, key: &str) -> StoreResult<Option<License>> {
        self.inner.find_license_by_key(key)
    }

    fn find_license_by_id(&self, id: LicenseId) -> StoreResult<Option<License>> {
        self.inner.find_license_by_id(id)
    }

    fn update_license(&self, license: &License) -> StoreResult<bool> {
        self.inner.update_license(license)
    }

    fn expire_lapsed_licenses(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        self.inner.expire_lapsed_licenses(now)
    }

    fn list_active_expiring_before(&self, deadline: DateTime<Utc>) -> StoreResult<Vec<License>> {
        self.inner.list_active_expiring_before(deadline)
    }

    fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.inner.insert_user(user)
    }

    fn find_user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        self.inner.find_user_by_id(id)
    }

    fn update_user(&self, user: &User) -> StoreResult<bool> {
        self.inner.update_user(user)
    }

    fn take_backup_code(&self, user_id: UserId, code: &str) -> StoreResult<bool> {
        self.inner.take_backup_code(user_id, code)
    }

    fn replace_token(&self, token: &VerificationToken) -> StoreResult<u64> {
        self.inner.replace_token(token)
    }

    fn take_token(
        &self,
        secret: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<VerificationToken>> {
        self.inner.take_token(secret, kind, now)
    }

    fn delete_expired_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        self.inner.delete_expired_tokens(now)
    }
}
