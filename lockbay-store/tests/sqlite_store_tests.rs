mod common;

use chrono::{Duration, Utc};
use lockbay_store::{SqliteStore, Store};

fn store() -> SqliteStore {
    SqliteStore::open_in_memory().unwrap()
}

#[test]
fn license_roundtrip() {
    common::check_license_roundtrip(&store());
}

#[test]
fn duplicate_key_rejected() {
    common::check_duplicate_key_rejected(&store());
}

#[test]
fn update_license() {
    common::check_update_license(&store());
}

#[test]
fn expiry_sweep() {
    common::check_expiry_sweep(&store());
}

#[test]
fn list_expiring() {
    common::check_list_expiring(&store());
}

#[test]
fn user_roundtrip() {
    common::check_user_roundtrip(&store());
}

#[test]
fn update_user_clears_two_factor() {
    common::check_update_user_clears_two_factor(&store());
}

#[test]
fn take_backup_code_single_use() {
    common::check_take_backup_code_single_use(&store());
}

#[test]
fn replace_token_single_live() {
    common::check_replace_token_single_live(&store());
}

#[test]
fn take_token_exactly_once() {
    common::check_take_token_exactly_once(&store());
}

#[test]
fn take_token_respects_kind_and_expiry() {
    common::check_take_token_respects_kind_and_expiry(&store());
}

#[test]
fn delete_expired_tokens() {
    common::check_delete_expired_tokens(&store());
}

// ── SQLite-specific ──────────────────────────────────────────────

#[test]
fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lockbay.db");

    let license = common::make_license("SAVE-0000-0000-0001", Some(Utc::now() + Duration::days(30)));
    {
        let store = SqliteStore::open(&path).unwrap();
        store.insert_license(&license).unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    let loaded = store.find_license_by_key(&license.key).unwrap().unwrap();
    assert_eq!(loaded, license);
}

#[test]
fn timestamps_round_trip_losslessly() {
    let store = store();
    let license = common::make_license("PRCS-0000-0000-0001", Some(Utc::now() + Duration::days(1)));
    store.insert_license(&license).unwrap();
    let loaded = store.find_license_by_id(license.id).unwrap().unwrap();
    assert_eq!(loaded.expires_at, license.expires_at);
    assert_eq!(loaded.created_at, license.created_at);
}
