//! Storage layer for the public identity ledger and the private key vault.
//!
//! The two concerns are separate traits so the medium can be swapped without
//! touching issuance logic. Both file-backed and in-memory implementations
//! are provided.
//!
//! # Directory layout
//!
//! The file-backed stores default to a `data/` directory:
//!
//! ```text
//! data/
//! ├── digital_ids.json   — identity ledger (all users, append-only)
//! └── vault.json         — one secret key per user
//! ```
//!
//! # Modules
//!
//! - [`identity_ledger`] — `FileIdentityStore`.
//! - [`vault_store`] — `FileVaultStore`.
//! - [`memory`] — `MemoryIdentityStore` and `MemoryVaultStore`.

pub mod identity_ledger;
pub mod memory;
pub mod vault_store;

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{IssuerError, Result};
use crate::identity::{IdentityRecord, IdentityStatus};

pub use identity_ledger::FileIdentityStore;
pub use memory::{MemoryIdentityStore, MemoryVaultStore};
pub use vault_store::FileVaultStore;

// ── Traits ────────────────────────────────────────────────────────────────────

/// Durable mapping from user id to an ordered history of identity records.
pub trait IdentityStore: Send + Sync {
    /// Return the user's active record, or `None` if nothing was ever issued.
    fn get_active(&self, user_id: &str) -> Result<Option<IdentityRecord>>;

    /// Retire the user's active record (if any) and append `record` as the
    /// new active one, as a single atomic step.
    ///
    /// Returns the record as committed. Its `issued_at` is raised to the
    /// latest prior `issued_at` for the user if the clock stepped backwards.
    ///
    /// # Errors
    ///
    /// Returns `IssuerError::StorageUnavailable` if the medium cannot be read
    /// or written. The previous state is left intact.
    fn append_as_active(&self, record: IdentityRecord) -> Result<IdentityRecord>;

    /// Return every record for the user in append order.
    fn history(&self, user_id: &str) -> Result<Vec<IdentityRecord>>;
}

/// Durable mapping from user id to the user's current secret key.
///
/// There is deliberately no method that returns key material.
pub trait VaultStore: Send + Sync {
    /// Replace the user's secret key, or insert it if absent.
    ///
    /// # Errors
    ///
    /// Returns `IssuerError::StorageUnavailable` if the medium cannot be read
    /// or written. The previous state is left intact.
    fn upsert(&self, user_id: &str, secret_key: &[u8]) -> Result<()>;

    /// Whether a secret key is held for the user.
    fn contains(&self, user_id: &str) -> Result<bool>;
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// Retire the active records among `user_history` and prepare `record` for
/// appending: force it active and clamp `issued_at` so it never precedes an
/// earlier record.
pub(crate) fn prepare_append<'a>(
    user_history: impl IntoIterator<Item = &'a mut IdentityRecord>,
    mut record: IdentityRecord,
) -> IdentityRecord {
    for existing in user_history {
        if existing.status == IdentityStatus::Active {
            existing.status = IdentityStatus::Rotated;
        }
        if existing.issued_at > record.issued_at {
            record.issued_at = existing.issued_at;
        }
    }
    record.status = IdentityStatus::Active;
    record
}

pub(crate) fn lock_poisoned(what: &str) -> IssuerError {
    IssuerError::StorageUnavailable(format!("{what} lock poisoned"))
}

/// Read `path`, returning `None` if it does not exist.
pub(crate) fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(IssuerError::StorageUnavailable(format!(
            "failed to read {}: {e}",
            path.display()
        ))),
    }
}

/// Write `data` to `path` atomically through a uniquely named sibling
/// temporary file.
///
/// Creates the parent directory if it does not exist. The temp file is
/// fsynced and then renamed over `path`, so readers see either the old
/// contents or the new contents, never a partial write. Every call gets its
/// own temp file. With `private` set the file is owner-read/write only on
/// Unix.
pub(crate) fn write_atomic(path: &Path, data: &[u8], private: bool) -> Result<()> {
    let wrap = |e: std::io::Error| {
        IssuerError::StorageUnavailable(format!("failed to write {}: {e}", path.display()))
    };

    let parent = parent_dir(path);
    std::fs::create_dir_all(parent).map_err(wrap)?;

    // Deleted on drop unless persisted.
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(wrap)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = if private { 0o600 } else { 0o644 };
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(mode))
            .map_err(wrap)?;
    }
    #[cfg(not(unix))]
    let _ = private;
    tmp.write_all(data).map_err(wrap)?;
    tmp.as_file().sync_all().map_err(wrap)?;
    tmp.persist(path).map_err(|e| wrap(e.error))?;
    Ok(())
}

/// Sibling lock file guarding read-modify-write cycles on `path`.
pub(crate) fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

// ── Cross-process lock ────────────────────────────────────────────────────────

/// Exclusive advisory lock on a lock file, released on drop.
///
/// Stores in different processes that share a data directory serialize their
/// read-modify-write cycles through it. Threads of one store are already
/// serialized by the store's `RwLock`.
pub(crate) struct FileLock {
    #[allow(dead_code)]
    file: File,
}

impl FileLock {
    /// Block until the exclusive lock on `lock_path` is held. The file is
    /// created if missing and never removed.
    pub(crate) fn exclusive(lock_path: &Path) -> Result<Self> {
        let wrap = |e: std::io::Error| {
            IssuerError::StorageUnavailable(format!(
                "failed to lock {}: {e}",
                lock_path.display()
            ))
        };
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .map_err(wrap)?;
        lock_exclusive(&file).map_err(wrap)?;
        Ok(Self { file })
    }
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;

    loop {
        // SAFETY: the descriptor belongs to `file`, which outlives the call.
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if result == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> std::io::Result<()> {
    // No flock equivalent without platform bindings.
    Ok(())
}

#[cfg(unix)]
impl Drop for FileLock {
    fn drop(&mut self) {
        use std::os::unix::io::AsRawFd;

        // SAFETY: the descriptor is still open; closing it would also unlock.
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}
