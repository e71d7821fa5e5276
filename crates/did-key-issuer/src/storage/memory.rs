//! In-memory stores. Not durable; state lives as long as the value.

use std::collections::HashMap;
use std::sync::RwLock;

use zeroize::Zeroizing;

use super::{lock_poisoned, prepare_append, IdentityStore, VaultStore};
use crate::error::Result;
use crate::identity::IdentityRecord;

/// Identity ledger held in a map of per-user histories.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    histories: RwLock<HashMap<String, Vec<IdentityRecord>>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn get_active(&self, user_id: &str) -> Result<Option<IdentityRecord>> {
        let histories = self
            .histories
            .read()
            .map_err(|_| lock_poisoned("identity ledger"))?;
        Ok(histories
            .get(user_id)
            .and_then(|h| h.iter().find(|r| r.is_active()))
            .cloned())
    }

    fn append_as_active(&self, record: IdentityRecord) -> Result<IdentityRecord> {
        let mut histories = self
            .histories
            .write()
            .map_err(|_| lock_poisoned("identity ledger"))?;
        let history = histories.entry(record.user_id.clone()).or_default();
        let committed = prepare_append(history.iter_mut(), record);
        history.push(committed.clone());
        Ok(committed)
    }

    fn history(&self, user_id: &str) -> Result<Vec<IdentityRecord>> {
        let histories = self
            .histories
            .read()
            .map_err(|_| lock_poisoned("identity ledger"))?;
        Ok(histories.get(user_id).cloned().unwrap_or_default())
    }
}

/// Vault held in a map. Secrets are wiped when replaced or dropped.
#[derive(Default)]
pub struct MemoryVaultStore {
    entries: RwLock<HashMap<String, Zeroizing<Vec<u8>>>>,
}

impl MemoryVaultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users with a stored key.
    pub fn len(&self) -> Result<usize> {
        Ok(self
            .entries
            .read()
            .map_err(|_| lock_poisoned("vault"))?
            .len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl std::fmt::Debug for MemoryVaultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryVaultStore").finish_non_exhaustive()
    }
}

impl VaultStore for MemoryVaultStore {
    fn upsert(&self, user_id: &str, secret_key: &[u8]) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| lock_poisoned("vault"))?;
        entries.insert(user_id.to_string(), Zeroizing::new(secret_key.to_vec()));
        Ok(())
    }

    fn contains(&self, user_id: &str) -> Result<bool> {
        let entries = self.entries.read().map_err(|_| lock_poisoned("vault"))?;
        Ok(entries.contains_key(user_id))
    }
}
