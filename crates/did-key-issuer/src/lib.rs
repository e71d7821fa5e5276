//! did-key-issuer — `did:key` issuance and rotation.
//!
//! Issues one Ed25519-backed `did:key` identity per user, rotates it on
//! request, and persists the public identity history and the current secret
//! key in two separate stores.

pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod service;
pub mod storage;
pub mod time;

// Re-export primary types
pub use codec::{build_identifier, encode_public_key, generate_keypair, DID_KEY_PREFIX};
pub use config::IssuerConfig;
pub use error::{IssuerError, Result};
pub use identity::{DidMethod, IdentityRecord, IdentityStatus, KeyType};
pub use service::IssuanceService;
pub use storage::{
    FileIdentityStore, FileVaultStore, IdentityStore, MemoryIdentityStore, MemoryVaultStore,
    VaultStore,
};
