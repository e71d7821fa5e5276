//! Error types for the issuer.
//!
//! All errors are strongly typed and propagated without panicking.
//! Secret key material is never included in error messages.

/// Issuer error types covering all operations.
#[derive(Debug, thiserror::Error)]
pub enum IssuerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Invalid multibase: {0}")]
    InvalidMultibase(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The identity record was committed but the vault write failed. The
    /// committed record is active and has no matching vault entry.
    #[error("Partial issuance for user {user_id}: identity {identifier} committed, vault write failed: {source}")]
    PartialIssuanceFailure {
        user_id: String,
        identifier: String,
        #[source]
        source: Box<IssuerError>,
    },
}

impl From<std::io::Error> for IssuerError {
    fn from(e: std::io::Error) -> Self {
        Self::StorageUnavailable(format!("I/O error: {e}"))
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, IssuerError>;
