//! Identity ledger persistence — the append-only history of public records.
//!
//! All users share one JSON file. Every append rewrites the whole file via
//! temp-file-then-rename while holding the store's write lock and an
//! exclusive lock on `<ledger>.lock`, so stores in several processes can
//! share one ledger.
//!
//! File format:
//! ```json
//! {
//!     "version": 1,
//!     "records": [ { ... IdentityRecord ... }, ... ]
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::{
    lock_path_for, lock_poisoned, prepare_append, read_optional, write_atomic, FileLock,
    IdentityStore,
};
use crate::error::{IssuerError, Result};
use crate::identity::IdentityRecord;

// ── File format constants ─────────────────────────────────────────────────────

const LEDGER_FILE_VERSION: u32 = 1;

// ── On-disk structure ─────────────────────────────────────────────────────────

/// Wrapper written to disk for the ledger.
#[derive(Debug, Serialize, Deserialize)]
struct LedgerFile {
    /// Format version number.
    version: u32,
    /// Every record ever issued, in append order.
    records: Vec<IdentityRecord>,
}

// ── FileIdentityStore ─────────────────────────────────────────────────────────

/// Filesystem-backed identity ledger.
///
/// Appends are serialized by an in-process write lock and, across store
/// instances and processes, by a lock file next to the ledger. Reads share
/// the in-process read lock and only ever see fully renamed files.
#[derive(Debug)]
pub struct FileIdentityStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock: RwLock<()>,
}

impl FileIdentityStore {
    /// Create a store backed by the ledger file at `path`.
    ///
    /// The parent directory is created if missing. The file itself is
    /// created on the first append; until then the ledger reads as empty.
    ///
    /// # Errors
    ///
    /// Returns `IssuerError::StorageUnavailable` if the directory cannot be
    /// created.
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

    /// Path of the ledger file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    fn load_all(&self) -> Result<Vec<IdentityRecord>> {
        let Some(bytes) = read_optional(&self.path)? else {
            return Ok(Vec::new());
        };
        let file: LedgerFile = serde_json::from_slice(&bytes).map_err(|e| {
            IssuerError::StorageUnavailable(format!(
                "failed to parse identity ledger {}: {e}",
                self.path.display()
            ))
        })?;
        if file.version != LEDGER_FILE_VERSION {
            return Err(IssuerError::StorageUnavailable(format!(
                "unsupported identity ledger version {} in {}",
                file.version,
                self.path.display()
            )));
        }
        Ok(file.records)
    }

    fn save_all(&self, records: Vec<IdentityRecord>) -> Result<()> {
        let file = LedgerFile {
            version: LEDGER_FILE_VERSION,
            records,
        };
        let json = serde_json::to_vec_pretty(&file).map_err(|e| {
            IssuerError::StorageUnavailable(format!("failed to serialize identity ledger: {e}"))
        })?;
        write_atomic(&self.path, &json, false)
    }
}

impl IdentityStore for FileIdentityStore {
    fn get_active(&self, user_id: &str) -> Result<Option<IdentityRecord>> {
        let _guard = self.lock.read().map_err(|_| lock_poisoned("identity ledger"))?;
        let records = self.load_all()?;
        Ok(records
            .into_iter()
            .find(|r| r.user_id == user_id && r.is_active()))
    }

    fn append_as_active(&self, record: IdentityRecord) -> Result<IdentityRecord> {
        let _guard = self
            .lock
            .write()
            .map_err(|_| lock_poisoned("identity ledger"))?;
        let _file_lock = FileLock::exclusive(&self.lock_path)?;
        let mut records = self.load_all()?;
        let user_id = record.user_id.clone();
        let committed = prepare_append(
            records.iter_mut().filter(|r| r.user_id == user_id),
            record,
        );
        records.push(committed.clone());
        self.save_all(records)?;
        log::debug!(
            "identity ledger {}: appended {} for user {}",
            self.path.display(),
            committed.identifier,
            committed.user_id
        );
        Ok(committed)
    }

    fn history(&self, user_id: &str) -> Result<Vec<IdentityRecord>> {
        let _guard = self.lock.read().map_err(|_| lock_poisoned("identity ledger"))?;
        let records = self.load_all()?;
        Ok(records
            .into_iter()
            .filter(|r| r.user_id == user_id)
            .collect())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
