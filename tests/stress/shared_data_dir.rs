//! Concurrency test: independent store instances sharing one data directory.
//!
//! Each instance stands in for a separate `did-issuer` process, so nothing
//! in-process (store `RwLock`, per-user mutexes) is shared between them.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use did_key_issuer::codec::public_key_from_identifier;
use did_key_issuer::{
    FileIdentityStore, FileVaultStore, IdentityRecord, IdentityStore, IssuanceService,
    IssuerConfig, VaultStore,
};

fn record(user_id: &str, tag: &str) -> IdentityRecord {
    IdentityRecord::new_active(
        user_id,
        format!("did:key:z{tag}"),
        format!("z{tag}"),
        did_key_issuer::time::now(),
    )
}

#[test]
fn stress_two_ledger_instances_one_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("digital_ids.json");

    for round in 0..5 {
        let stores = [
            Arc::new(FileIdentityStore::new(&path).unwrap()),
            Arc::new(FileIdentityStore::new(&path).unwrap()),
        ];

        let handles: Vec<_> = stores
            .iter()
            .enumerate()
            .map(|(s, store)| {
                let store = Arc::clone(store);
                thread::spawn(move || {
                    (0..25)
                        .map(|i| {
                            let tag = format!("{round}-{s}-{i}");
                            (tag.clone(), store.append_as_active(record("shared", &tag)))
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut committed = HashSet::new();
        for h in handles {
            for (tag, result) in h.join().unwrap() {
                let appended = result.unwrap_or_else(|e| panic!("append {tag} failed: {e}"));
                committed.insert(appended.identifier);
            }
        }

        let history = stores[0].history("shared").unwrap();
        let on_file: HashSet<_> = history.iter().map(|r| r.identifier.clone()).collect();
        assert_eq!(history.len(), (round + 1) * 50, "no append lost or duplicated");
        assert!(committed.is_subset(&on_file));
        assert_eq!(history.iter().filter(|r| r.is_active()).count(), 1);
    }
}

#[test]
fn stress_two_vault_instances_one_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("vault.json");
    let vaults = [
        Arc::new(FileVaultStore::new(&path).unwrap()),
        Arc::new(FileVaultStore::new(&path).unwrap()),
    ];

    let handles: Vec<_> = vaults
        .iter()
        .enumerate()
        .map(|(v, vault)| {
            let vault = Arc::clone(vault);
            thread::spawn(move || {
                for i in 0..30 {
                    vault.upsert(&format!("user-{v}-{i}"), &[v as u8; 64]).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    for v in 0..2 {
        for i in 0..30 {
            assert!(vaults[1 - v].contains(&format!("user-{v}-{i}")).unwrap());
        }
    }
}

#[test]
fn stress_two_services_rotate_one_user() {
    let tmp = tempfile::tempdir().unwrap();
    let config = IssuerConfig::with_data_dir(tmp.path());
    let services = [
        IssuanceService::open(&config).unwrap(),
        IssuanceService::open(&config).unwrap(),
    ];

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let service = services[t % 2].clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    service.issue("u1", true).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let history = services[0].history("u1").unwrap();
    assert_eq!(history.len(), 40);
    assert_eq!(history.iter().filter(|r| r.is_active()).count(), 1);

    // The vault holds the key of the record that ended up active.
    let active = services[1].active("u1").unwrap().unwrap();
    let raw = std::fs::read(config.vault_path()).unwrap();
    let vault: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    let secret = base64::Engine::decode(
        &base64::engine::general_purpose::STANDARD,
        vault["entries"][0]["privateKeyB64"].as_str().unwrap(),
    )
    .unwrap();
    let active_key = public_key_from_identifier(&active.identifier).unwrap();
    assert_eq!(&secret[32..], &active_key[..]);
}

#[test]
fn stress_two_services_first_issuance_shared() {
    let tmp = tempfile::tempdir().unwrap();
    let config = IssuerConfig::with_data_dir(tmp.path());
    let services = [
        IssuanceService::open(&config).unwrap(),
        IssuanceService::open(&config).unwrap(),
    ];

    let handles: Vec<_> = (0..12)
        .map(|t| {
            let service = services[t % 2].clone();
            thread::spawn(move || service.issue("newcomer", false).unwrap())
        })
        .collect();
    let records: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(records.iter().all(|r| r == &records[0]));
    assert_eq!(services[0].history("newcomer").unwrap().len(), 1);
}
