//! Concurrency test: parallel issuance and rotation for a single user.
//!
//! Validates that rotations serialize, that exactly one record stays active,
//! and that the vault ends up holding the active identity's key.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use did_key_issuer::codec::public_key_from_identifier;
use did_key_issuer::{
    IdentityStore, IssuanceService, IssuerConfig, MemoryIdentityStore, MemoryVaultStore,
};

fn active_count(service: &IssuanceService, user_id: &str) -> usize {
    service
        .history(user_id)
        .unwrap()
        .iter()
        .filter(|r| r.is_active())
        .count()
}

#[test]
fn stress_32_concurrent_rotations_file_backed() {
    let tmp = tempfile::tempdir().unwrap();
    let config = IssuerConfig::with_data_dir(tmp.path());
    let service = IssuanceService::open(&config).unwrap();

    let mut handles = Vec::new();
    for _ in 0..32 {
        let service = service.clone();
        handles.push(thread::spawn(move || {
            service.issue("shared", true).expect("rotation should succeed")
        }));
    }
    let issued: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let history = service.history("shared").unwrap();
    assert_eq!(history.len(), 32);
    assert_eq!(active_count(&service, "shared"), 1);

    let unique: HashSet<_> = history.iter().map(|r| r.identifier.clone()).collect();
    assert_eq!(unique.len(), 32, "every rotation mints a distinct identifier");
    for record in &issued {
        assert!(unique.contains(&record.identifier));
    }

    // The last appended record is the active one, and the vault holds its key.
    let active = service.active("shared").unwrap().unwrap();
    assert_eq!(history.last(), Some(&active));

    let raw = std::fs::read(config.vault_path()).unwrap();
    let vault: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    let entries = vault["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    let secret = base64::Engine::decode(
        &base64::engine::general_purpose::STANDARD,
        entries[0]["privateKeyB64"].as_str().unwrap(),
    )
    .unwrap();
    let active_key = public_key_from_identifier(&active.identifier).unwrap();
    assert_eq!(&secret[32..], &active_key[..]);
}

#[test]
fn stress_issued_at_non_decreasing_under_contention() {
    let service = IssuanceService::new(
        Arc::new(MemoryIdentityStore::new()),
        Arc::new(MemoryVaultStore::new()),
    );

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let service = service.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    service.issue("clocked", true).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let history = service.history("clocked").unwrap();
    assert_eq!(history.len(), 160);
    for pair in history.windows(2) {
        assert!(pair[0].issued_at <= pair[1].issued_at);
    }
}

#[test]
fn stress_concurrent_first_issuance_is_shared() {
    let tmp = tempfile::tempdir().unwrap();
    let service = IssuanceService::open(&IssuerConfig::with_data_dir(tmp.path())).unwrap();

    let handles: Vec<_> = (0..24)
        .map(|_| {
            let service = service.clone();
            thread::spawn(move || service.issue("newcomer", false).unwrap())
        })
        .collect();
    let records: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let first = &records[0];
    assert!(records.iter().all(|r| r == first));
    assert_eq!(service.history("newcomer").unwrap().len(), 1);
}

#[test]
fn stress_readers_never_see_two_active() {
    let tmp = tempfile::tempdir().unwrap();
    let config = IssuerConfig::with_data_dir(tmp.path());
    let service = IssuanceService::open(&config).unwrap();
    service.issue("watched", false).unwrap();

    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let service = service.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut observations = 0usize;
                while !done.load(Ordering::Acquire) {
                    assert_eq!(active_count(&service, "watched"), 1);
                    assert!(service.active("watched").unwrap().is_some());
                    observations += 1;
                }
                observations
            })
        })
        .collect();

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let service = service.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    service.issue("watched", true).unwrap();
                }
            })
        })
        .collect();

    for w in writers {
        w.join().unwrap();
    }
    done.store(true, Ordering::Release);
    for r in readers {
        r.join().unwrap();
    }

    assert_eq!(service.history("watched").unwrap().len(), 41);
}

#[test]
fn stress_direct_store_appends_serialize() {
    let store = Arc::new(MemoryIdentityStore::new());

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let record = did_key_issuer::IdentityRecord::new_active(
                    "direct",
                    format!("did:key:z{i}"),
                    format!("z{i}"),
                    did_key_issuer::time::now(),
                );
                store.append_as_active(record).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let history = store.history("direct").unwrap();
    assert_eq!(history.len(), 50);
    assert_eq!(history.iter().filter(|r| r.is_active()).count(), 1);
}
