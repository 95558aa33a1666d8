//! License key generation.
//!
//! Keys are derived from a hash of (product, owner, time, nonce) and
//! rendered as four hyphen-separated groups of four uppercase alphanumeric
//! characters: `XXXX-XXXX-XXXX-XXXX`. The hash makes the key one-way (it
//! never reveals the product or owner); the nonce makes repeated calls for
//! the same pair produce different keys.
//!
//! Uniqueness is enforced by the store's constraint on the key column, not
//! here: on a duplicate-key insert the caller regenerates with a fresh
//! nonce (see [`crate::LicenseManager::create`]).

use lockbay_types::{ProductId, UserId};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

const KEY_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const GROUPS: usize = 4;
const GROUP_LEN: usize = 4;

/// Generates a fresh license key for the given product and owner.
#[must_use]
pub fn generate_key(product_id: ProductId, user_id: UserId) -> String {
    let mut nonce = [0u8; 16];
    OsRng.fill_bytes(&mut nonce);
    let now_micros = chrono::Utc::now().timestamp_micros();

    let mut hasher = Sha256::new();
    hasher.update(product_id.as_uuid().as_bytes());
    hasher.update(user_id.as_uuid().as_bytes());
    hasher.update(now_micros.to_be_bytes());
    hasher.update(nonce);
    let hash = hasher.finalize();

    let mut key = String::with_capacity(GROUPS * GROUP_LEN + GROUPS - 1);
    for (i, byte) in hash[..GROUPS * GROUP_LEN].iter().enumerate() {
        if i > 0 && i % GROUP_LEN == 0 {
            key.push('-');
        }
        key.push(KEY_ALPHABET[*byte as usize % KEY_ALPHABET.len()] as char);
    }
    key
}

/// Returns true if `key` has the canonical `XXXX-XXXX-XXXX-XXXX` shape.
#[must_use]
pub fn is_canonical_key(key: &str) -> bool {
    let groups: Vec<&str> = key.split('-').collect();
    groups.len() == GROUPS
        && groups.iter().all(|g| {
            g.len() == GROUP_LEN
                && g.bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        })
}
