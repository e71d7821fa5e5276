//! Issuance service — issue, re-issue and rotate `did:key` identities.
//!
//! Issuance is idempotent by default: a user with an active identity gets
//! that identity back. Only an explicit rotation mints a new key pair.
//!
//! A new identity is committed in two ordered steps: the public record is
//! appended to the identity store, then the secret key is written to the
//! vault. If the second step fails the record stays active without a vault
//! entry, and the caller receives `IssuerError::PartialIssuanceFailure`.
//! Nothing in this module detects or repairs that state.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::codec;
use crate::config::IssuerConfig;
use crate::error::{IssuerError, Result};
use crate::identity::IdentityRecord;
use crate::storage::{
    lock_poisoned, FileIdentityStore, FileLock, FileVaultStore, IdentityStore, VaultStore,
};

/// Lock file in the data directory serializing issuance across processes.
const ISSUANCE_LOCK_FILE: &str = "issuance.lock";

/// Orchestrates the key codec, the identity store and the vault.
///
/// Cheap to clone; clones share the stores and the per-user locks.
#[derive(Clone)]
pub struct IssuanceService {
    identities: Arc<dyn IdentityStore>,
    vault: Arc<dyn VaultStore>,
    user_locks: Arc<UserLocks>,
    /// Lock file held across a whole issuance, for file-backed services.
    issuance_lock: Option<PathBuf>,
}

impl IssuanceService {
    /// Build a service over the given stores.
    pub fn new(identities: Arc<dyn IdentityStore>, vault: Arc<dyn VaultStore>) -> Self {
        Self {
            identities,
            vault,
            user_locks: Arc::new(UserLocks::default()),
            issuance_lock: None,
        }
    }

    /// Build a service over file-backed stores at the configured paths.
    ///
    /// # Errors
    ///
    /// Returns `IssuerError::InvalidRequest` if both stores would share one
    /// file, or `IssuerError::StorageUnavailable` if the data directory
    /// cannot be created.
    pub fn open(config: &IssuerConfig) -> Result<Self> {
        let identity_path = config.identity_path();
        let vault_path = config.vault_path();
        if identity_path == vault_path {
            return Err(IssuerError::InvalidRequest(format!(
                "identity ledger and vault must be different files, both are {}",
                identity_path.display()
            )));
        }
        std::fs::create_dir_all(config.data_dir())?;
        let identities = FileIdentityStore::new(identity_path)?;
        let vault = FileVaultStore::new(vault_path)?;
        log::debug!(
            "opened issuer stores: ledger {}, vault {}",
            identities.path().display(),
            vault.path().display()
        );
        Ok(Self {
            issuance_lock: Some(config.data_dir().join(ISSUANCE_LOCK_FILE)),
            ..Self::new(Arc::new(identities), Arc::new(vault))
        })
    }

    /// Issue an identity for `user_id`, or rotate it when `rotate` is set.
    ///
    /// Without `rotate`, an existing active record is returned unchanged.
    /// Otherwise a new key pair is generated, the record is committed as the
    /// user's active identity (retiring the previous one) and the secret key
    /// replaces the user's vault entry.
    ///
    /// Calls for the same user are serialized from lookup to vault write.
    /// A service built by [`IssuanceService::open`] also holds an exclusive
    /// lock file in the data directory for that span, which serializes
    /// issuance across processes sharing the directory.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if `user_id` is empty.
    /// - `StorageUnavailable` if the identity store fails; nothing was
    ///   committed.
    /// - `PartialIssuanceFailure` if the identity was committed but the vault
    ///   write failed.
    pub fn issue(&self, user_id: &str, rotate: bool) -> Result<IdentityRecord> {
        if user_id.is_empty() {
            return Err(IssuerError::InvalidRequest(
                "user id must not be empty".to_string(),
            ));
        }

        let user_lock = self.user_locks.acquire(user_id)?;
        let result = match user_lock.lock() {
            Ok(_guard) => self.issue_locked(user_id, rotate),
            Err(_) => Err(lock_poisoned("issuance")),
        };
        self.user_locks.release(user_id, user_lock);
        result
    }

    fn issue_locked(&self, user_id: &str, rotate: bool) -> Result<IdentityRecord> {
        let _process_lock = match &self.issuance_lock {
            Some(path) => Some(FileLock::exclusive(path)?),
            None => None,
        };

        if !rotate {
            if let Some(existing) = self.identities.get_active(user_id)? {
                log::debug!("user {user_id} already holds {}", existing.identifier);
                return Ok(existing);
            }
        }

        let keypair = codec::generate_keypair();
        let public_key_multibase = codec::encode_public_key(&keypair.public_key_bytes())?;
        let identifier = codec::build_identifier(&public_key_multibase);
        let record = IdentityRecord::new_active(
            user_id,
            identifier,
            public_key_multibase,
            crate::time::now(),
        );

        let committed = self.identities.append_as_active(record)?;

        if let Err(e) = self.vault.upsert(user_id, &keypair.secret_key_bytes()) {
            log::warn!(
                "identity {} committed for user {user_id} but vault write failed: {e}",
                committed.identifier
            );
            return Err(IssuerError::PartialIssuanceFailure {
                user_id: user_id.to_string(),
                identifier: committed.identifier,
                source: Box::new(e),
            });
        }

        log::info!(
            "{} {} for user {user_id}",
            if rotate { "rotated to" } else { "issued" },
            committed.identifier
        );
        Ok(committed)
    }

    /// The user's active identity, if any. Does not consult the vault.
    pub fn active(&self, user_id: &str) -> Result<Option<IdentityRecord>> {
        self.identities.get_active(user_id)
    }

    /// Every identity issued to the user, oldest first.
    pub fn history(&self, user_id: &str) -> Result<Vec<IdentityRecord>> {
        self.identities.history(user_id)
    }
}

impl std::fmt::Debug for IssuanceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuanceService").finish_non_exhaustive()
    }
}

/// One mutex per user id, dropped once no caller holds or awaits it.
#[derive(Default)]
struct UserLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    fn acquire(&self, user_id: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(|_| lock_poisoned("issuance"))?;
        Ok(Arc::clone(locks.entry(user_id.to_string()).or_default()))
    }

    /// Give back a handle from `acquire`. The map entry goes away with the
    /// last handle; clones are only made under the map lock, so a count of
    /// one here means nobody else is waiting.
    fn release(&self, user_id: &str, handle: Arc<Mutex<()>>) {
        drop(handle);
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        if locks
            .get(user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(user_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}
