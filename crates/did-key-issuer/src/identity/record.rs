//! The `IdentityRecord` type and its fixed-value tags.
//!
//! Records serialize with camelCase keys and store the identifier under
//! `did`:
//!
//! ```json
//! {
//!     "userId": "u1",
//!     "did": "did:key:z6Mk...",
//!     "method": "did:key",
//!     "publicKeyMultibase": "z6Mk...",
//!     "keyType": "Ed25519",
//!     "issuedAt": "2024-05-01T12:00:00.000Z",
//!     "status": "active"
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier scheme. Only `did:key` is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DidMethod {
    #[serde(rename = "did:key")]
    Key,
}

impl DidMethod {
    /// Return a stable string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Key => "did:key",
        }
    }
}

impl std::fmt::Display for DidMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signature algorithm of the identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    Ed25519,
}

impl KeyType {
    /// Return a stable string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ed25519 => "Ed25519",
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityStatus {
    Active,
    Rotated,
    /// Reserved. Never assigned by this crate.
    Revoked,
}

impl IdentityStatus {
    /// Return a stable string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Rotated => "rotated",
            Self::Revoked => "revoked",
        }
    }
}

impl std::fmt::Display for IdentityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One issued public identity. Contains no secret material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub user_id: String,
    #[serde(rename = "did")]
    pub identifier: String,
    pub method: DidMethod,
    pub public_key_multibase: String,
    pub key_type: KeyType,
    #[serde(with = "crate::time::iso8601_millis")]
    pub issued_at: DateTime<Utc>,
    pub status: IdentityStatus,
}

impl IdentityRecord {
    /// Build a new active Ed25519 `did:key` record.
    pub fn new_active(
        user_id: impl Into<String>,
        identifier: impl Into<String>,
        public_key_multibase: impl Into<String>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            identifier: identifier.into(),
            method: DidMethod::Key,
            public_key_multibase: public_key_multibase.into(),
            key_type: KeyType::Ed25519,
            issued_at,
            status: IdentityStatus::Active,
        }
    }

    /// Whether this record is the user's current identity.
    pub fn is_active(&self) -> bool {
        self.status == IdentityStatus::Active
    }

    /// `issued_at` formatted as ISO-8601.
    pub fn issued_at_iso8601(&self) -> String {
        crate::time::to_iso8601(&self.issued_at)
    }
}
