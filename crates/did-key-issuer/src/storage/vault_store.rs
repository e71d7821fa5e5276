//! Vault persistence. Holds the current secret key for each user.
//!
//! Kept in a separate file from the identity ledger. Secrets are stored
//! base64-encoded and the file is owner-only on Unix.
//!
//! File format:
//! ```json
//! {
//!     "version": 1,
//!     "entries": [ { "userId": "u1", "privateKeyB64": "<base64-64-bytes>" } ]
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::{lock_path_for, lock_poisoned, read_optional, write_atomic, FileLock, VaultStore};
use crate::error::{IssuerError, Result};

// ── File format constants ─────────────────────────────────────────────────────

const VAULT_FILE_VERSION: u32 = 1;

// ── On-disk structures ────────────────────────────────────────────────────────

/// Wrapper written to disk for the vault.
#[derive(Serialize, Deserialize)]
struct VaultFile {
    /// Format version number.
    version: u32,
    /// One entry per user.
    entries: Vec<VaultEntry>,
}

/// A user's current secret key. Wiped from memory on drop.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
struct VaultEntry {
    user_id: String,
    private_key_b64: String,
}

// ── FileVaultStore ────────────────────────────────────────────────────────────

/// Filesystem-backed vault. Same locking discipline as the identity ledger.
#[derive(Debug)]
pub struct FileVaultStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock: RwLock<()>,
}

impl FileVaultStore {
    /// Create a vault backed by the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `IssuerError::StorageUnavailable` if the parent directory
    /// cannot be created.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            lock_path: lock_path_for(&path),
            path,
            lock: RwLock::new(()),
        })
    }

    /// Path of the vault file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_all(&self) -> Result<Vec<VaultEntry>> {
        let Some(bytes) = read_optional(&self.path)? else {
            return Ok(Vec::new());
        };
        let bytes = Zeroizing::new(bytes);
        // Parse errors are reported without the offending input.
        let file: VaultFile = serde_json::from_slice(&bytes).map_err(|e| {
            IssuerError::StorageUnavailable(format!(
                "failed to parse vault {} at line {}",
                self.path.display(),
                e.line()
            ))
        })?;
        if file.version != VAULT_FILE_VERSION {
            return Err(IssuerError::StorageUnavailable(format!(
                "unsupported vault version {} in {}",
                file.version,
                self.path.display()
            )));
        }
        Ok(file.entries)
    }
}

impl VaultStore for FileVaultStore {
    fn upsert(&self, user_id: &str, secret_key: &[u8]) -> Result<()> {
        let _guard = self.lock.write().map_err(|_| lock_poisoned("vault"))?;
        let _file_lock = FileLock::exclusive(&self.lock_path)?;
        let mut entries = self.load_all()?;

        let entry = VaultEntry {
            user_id: user_id.to_string(),
            private_key_b64: base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                secret_key,
            ),
        };
        match entries.iter().position(|e| e.user_id == user_id) {
            Some(idx) => entries[idx] = entry,
            None => entries.push(entry),
        }

        let file = VaultFile {
            version: VAULT_FILE_VERSION,
            entries,
        };
        let json = serde_json::to_vec_pretty(&file)
            .map(Zeroizing::new)
            .map_err(|_| {
                IssuerError::StorageUnavailable("failed to serialize vault".to_string())
            })?;
        write_atomic(&self.path, &json, true)?;
        log::debug!("vault {}: stored key for user {user_id}", self.path.display());
        Ok(())
    }

    fn contains(&self, user_id: &str) -> Result<bool> {
        let _guard = self.lock.read().map_err(|_| lock_poisoned("vault"))?;
        Ok(self.load_all()?.iter().any(|e| e.user_id == user_id))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
