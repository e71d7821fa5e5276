//! Where the identity ledger and the vault live on disk.

use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "DID_ISSUER_DATA_DIR";

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_IDENTITY_FILE: &str = "digital_ids.json";
const DEFAULT_VAULT_FILE: &str = "vault.json";

/// Locations of the identity ledger and the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerConfig {
    pub data_dir: PathBuf,
    pub identity_file: String,
    pub vault_file: String,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            identity_file: DEFAULT_IDENTITY_FILE.to_string(),
            vault_file: DEFAULT_VAULT_FILE.to_string(),
        }
    }
}

impl IssuerConfig {
    /// Default file names under `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Defaults, with the data directory taken from `DID_ISSUER_DATA_DIR`
    /// when set and non-empty.
    pub fn from_env() -> Self {
        match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::with_data_dir(dir),
            _ => Self::default(),
        }
    }

    /// Full path of the identity ledger.
    pub fn identity_path(&self) -> PathBuf {
        self.data_dir.join(&self.identity_file)
    }

    /// Full path of the vault.
    pub fn vault_path(&self) -> PathBuf {
        self.data_dir.join(&self.vault_file)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
