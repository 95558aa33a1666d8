//! SQLite store implementation.
//!
//! Rows are plain columns; backup codes live in a child table rather than
//! a serialized blob, so consuming one is a single conditional `DELETE`.
//! Timestamps are stored as fixed-width RFC 3339 UTC strings, which makes
//! lexicographic comparison in SQL equal to chronological comparison.
//!
//! Multi-step writes (`replace_token`, `insert_user`, `update_user`) run
//! inside a transaction; single-use consumption (`take_token`,
//! `take_backup_code`) is a single conditional `DELETE`, relying on
//! SQLite's statement atomicity.

use crate::{Store, StoreError, StoreResult};
use chrono::{DateTime, SecondsFormat, Utc};
use lockbay_types::{
    License, LicenseId, LicenseStatus, ProductId, TokenId, TokenKind, TwoFactorCredential, User,
    UserId, VerificationToken,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id          TEXT PRIMARY KEY,
    email       TEXT NOT NULL,
    totp_secret TEXT
);

CREATE TABLE IF NOT EXISTS backup_codes (
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    code    TEXT NOT NULL,
    UNIQUE (user_id, code)
);

CREATE TABLE IF NOT EXISTS licenses (
    id                   TEXT PRIMARY KEY,
    key                  TEXT NOT NULL UNIQUE,
    user_id              TEXT NOT NULL,
    product_id           TEXT NOT NULL,
    status               TEXT NOT NULL,
    expires_at           TEXT,
    hardware_fingerprint TEXT,
    revoked_at           TEXT,
    revocation_reason    TEXT,
    created_at           TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_licenses_expiry ON licenses (status, expires_at);

CREATE TABLE IF NOT EXISTS tokens (
    id         TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL,
    kind       TEXT NOT NULL,
    secret     TEXT NOT NULL UNIQUE,
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tokens_user_kind ON tokens (user_id, kind);
";

/// A SQLite-backed [`Store`].
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (and migrates) a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema cannot
    /// be applied.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        debug!(path = %path.display(), "opened sqlite store");
        Self::from_connection(conn)
    }

    /// Opens an in-memory store, mainly for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ── column codecs ────────────────────────────────────────────────

fn ts_to_sql(ts: DateTime<Utc>) -> String {
    // Fixed width keeps the textual ordering chronological; nanosecond
    // precision keeps round-trips lossless.
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn ts_from_sql(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {s:?}: {e}")))
}

fn id_from_sql<T, E: std::fmt::Display>(
    parse: impl FnOnce(&str) -> Result<T, E>,
    s: &str,
) -> StoreResult<T> {
    parse(s).map_err(|e| StoreError::Corrupt(format!("bad id {s:?}: {e}")))
}

fn map_insert_err(what: &str) -> impl FnOnce(rusqlite::Error) -> StoreError + '_ {
    move |e| {
        if let rusqlite::Error::SqliteFailure(inner, _) = &e {
            if inner.code == rusqlite::ErrorCode::ConstraintViolation {
                return StoreError::Duplicate(what.to_string());
            }
        }
        StoreError::Sqlite(e)
    }
}

/// Raw license columns, decoded to the domain type outside the row closure.
struct LicenseRow {
    id: String,
    key: String,
    user_id: String,
    product_id: String,
    status: String,
    expires_at: Option<String>,
    hardware_fingerprint: Option<String>,
    revoked_at: Option<String>,
    revocation_reason: Option<String>,
    created_at: String,
}

const LICENSE_COLUMNS: &str = "id, key, user_id, product_id, status, expires_at, \
     hardware_fingerprint, revoked_at, revocation_reason, created_at";

impl LicenseRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            key: row.get(1)?,
            user_id: row.get(2)?,
            product_id: row.get(3)?,
            status: row.get(4)?,
            expires_at: row.get(5)?,
            hardware_fingerprint: row.get(6)?,
            revoked_at: row.get(7)?,
            revocation_reason: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    fn decode(self) -> StoreResult<License> {
        Ok(License {
            id: id_from_sql(LicenseId::parse, &self.id)?,
            key: self.key,
            user_id: id_from_sql(UserId::parse, &self.user_id)?,
            product_id: id_from_sql(ProductId::parse, &self.product_id)?,
            status: LicenseStatus::from_str(&self.status).map_err(StoreError::Corrupt)?,
            expires_at: self.expires_at.as_deref().map(ts_from_sql).transpose()?,
            hardware_fingerprint: self.hardware_fingerprint,
            revoked_at: self.revoked_at.as_deref().map(ts_from_sql).transpose()?,
            revocation_reason: self.revocation_reason,
            created_at: ts_from_sql(&self.created_at)?,
        })
    }
}

struct TokenRow {
    id: String,
    user_id: String,
    kind: String,
    secret: String,
    expires_at: String,
}

impl TokenRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            kind: row.get(2)?,
            secret: row.get(3)?,
            expires_at: row.get(4)?,
        })
    }

    fn decode(self) -> StoreResult<VerificationToken> {
        Ok(VerificationToken {
            id: id_from_sql(TokenId::parse, &self.id)?,
            user_id: id_from_sql(UserId::parse, &self.user_id)?,
            kind: TokenKind::from_str(&self.kind).map_err(StoreError::Corrupt)?,
            secret: self.secret,
            expires_at: ts_from_sql(&self.expires_at)?,
        })
    }
}

impl Store for SqliteStore {
    fn insert_license(&self, license: &License) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO licenses (id, key, user_id, product_id, status, expires_at, \
             hardware_fingerprint, revoked_at, revocation_reason, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                license.id.to_string(),
                license.key,
                license.user_id.to_string(),
                license.product_id.to_string(),
                license.status.as_str(),
                license.expires_at.map(ts_to_sql),
                license.hardware_fingerprint,
                license.revoked_at.map(ts_to_sql),
                license.revocation_reason,
                ts_to_sql(license.created_at),
            ],
        )
        .map_err(map_insert_err(&license.key))?;
        Ok(())
    }

    fn find_license_by_key(&self, key: &str) -> StoreResult<Option<License>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                &format!("SELECT {LICENSE_COLUMNS} FROM licenses WHERE key = ?1"),
                params![key],
                LicenseRow::read,
            )
            .optional()?;
        row.map(LicenseRow::decode).transpose()
    }

    fn find_license_by_id(&self, id: LicenseId) -> StoreResult<Option<License>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                &format!("SELECT {LICENSE_COLUMNS} FROM licenses WHERE id = ?1"),
                params![id.to_string()],
                LicenseRow::read,
            )
            .optional()?;
        row.map(LicenseRow::decode).transpose()
    }

    fn update_license(&self, license: &License) -> StoreResult<bool> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE licenses SET key = ?2, user_id = ?3, product_id = ?4, status = ?5, \
             expires_at = ?6, hardware_fingerprint = ?7, revoked_at = ?8, \
             revocation_reason = ?9 WHERE id = ?1",
            params![
                license.id.to_string(),
                license.key,
                license.user_id.to_string(),
                license.product_id.to_string(),
                license.status.as_str(),
                license.expires_at.map(ts_to_sql),
                license.hardware_fingerprint,
                license.revoked_at.map(ts_to_sql),
                license.revocation_reason,
            ],
        )?;
        Ok(changed > 0)
    }

    fn expire_lapsed_licenses(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE licenses SET status = 'expired' \
             WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at <= ?1",
            params![ts_to_sql(now)],
        )?;
        if changed > 0 {
            debug!(count = changed, "marked lapsed licenses expired");
        }
        Ok(changed as u64)
    }

    fn list_active_expiring_before(&self, deadline: DateTime<Utc>) -> StoreResult<Vec<License>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {LICENSE_COLUMNS} FROM licenses \
             WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at <= ?1 \
             ORDER BY expires_at"
        ))?;
        let rows = stmt
            .query_map(params![ts_to_sql(deadline)], LicenseRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(LicenseRow::decode).collect()
    }

    fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO users (id, email, totp_secret) VALUES (?1, ?2, ?3)",
            params![
                user.id.to_string(),
                user.email,
                user.two_factor.as_ref().map(|tf| tf.secret.as_str()),
            ],
        )
        .map_err(map_insert_err("user id"))?;
        if let Some(tf) = &user.two_factor {
            for code in &tf.backup_codes {
                tx.execute(
                    "INSERT INTO backup_codes (user_id, code) VALUES (?1, ?2)",
                    params![user.id.to_string(), code],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn find_user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        let conn = self.lock();
        let row: Option<(String, Option<String>)> = conn
            .query_row(
                "SELECT email, totp_secret FROM users WHERE id = ?1",
                params![id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((email, secret)) = row else {
            return Ok(None);
        };
        let two_factor = match secret {
            Some(secret) => {
                let mut stmt = conn.prepare(
                    "SELECT code FROM backup_codes WHERE user_id = ?1 ORDER BY rowid",
                )?;
                let backup_codes = stmt
                    .query_map(params![id.to_string()], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Some(TwoFactorCredential {
                    secret,
                    backup_codes,
                })
            }
            None => None,
        };
        Ok(Some(User {
            id,
            email,
            two_factor,
        }))
    }

    fn update_user(&self, user: &User) -> StoreResult<bool> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE users SET email = ?2, totp_secret = ?3 WHERE id = ?1",
            params![
                user.id.to_string(),
                user.email,
                user.two_factor.as_ref().map(|tf| tf.secret.as_str()),
            ],
        )?;
        if changed == 0 {
            return Ok(false);
        }
        tx.execute(
            "DELETE FROM backup_codes WHERE user_id = ?1",
            params![user.id.to_string()],
        )?;
        if let Some(tf) = &user.two_factor {
            for code in &tf.backup_codes {
                tx.execute(
                    "INSERT INTO backup_codes (user_id, code) VALUES (?1, ?2)",
                    params![user.id.to_string(), code],
                )?;
            }
        }
        tx.commit()?;
        Ok(true)
    }

    fn take_backup_code(&self, user_id: UserId, code: &str) -> StoreResult<bool> {
        let conn = self.lock();
        let changed = conn.execute(
            "DELETE FROM backup_codes WHERE user_id = ?1 AND code = ?2",
            params![user_id.to_string(), code],
        )?;
        Ok(changed > 0)
    }

    fn replace_token(&self, token: &VerificationToken) -> StoreResult<u64> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let invalidated = tx.execute(
            "DELETE FROM tokens WHERE user_id = ?1 AND kind = ?2",
            params![token.user_id.to_string(), token.kind.as_str()],
        )?;
        tx.execute(
            "INSERT INTO tokens (id, user_id, kind, secret, expires_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                token.id.to_string(),
                token.user_id.to_string(),
                token.kind.as_str(),
                token.secret,
                ts_to_sql(token.expires_at),
            ],
        )
        .map_err(map_insert_err("token secret"))?;
        tx.commit()?;
        Ok(invalidated as u64)
    }

    fn take_token(
        &self,
        secret: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<VerificationToken>> {
        let conn = self.lock();
        // Conditional delete-and-return: at most one caller gets the row.
        let row = conn
            .query_row(
                "DELETE FROM tokens \
                 WHERE secret = ?1 AND kind = ?2 AND expires_at > ?3 \
                 RETURNING id, user_id, kind, secret, expires_at",
                params![secret, kind.as_str(), ts_to_sql(now)],
                TokenRow::read,
            )
            .optional()?;
        row.map(TokenRow::decode).transpose()
    }

    fn delete_expired_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let conn = self.lock();
        let deleted = conn.execute(
            "DELETE FROM tokens WHERE expires_at <= ?1",
            params![ts_to_sql(now)],
        )?;
        Ok(deleted as u64)
    }
}
