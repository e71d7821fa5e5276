//! Ed25519 key pair generation.
//!
//! The secret half is exported in the 64-byte keypair form (32-byte seed
//! followed by the 32-byte public key) and is zeroized on drop.

use ed25519_dalek::{SigningKey, VerifyingKey, PUBLIC_KEY_LENGTH};
use zeroize::Zeroizing;

/// An Ed25519 key pair for a single issued identity.
///
/// `SigningKey` zeroizes its secret scalar on drop.
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl Ed25519KeyPair {
    /// Generate a new random Ed25519 key pair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Return the raw public key bytes.
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.verifying_key.to_bytes()
    }

    /// Return the secret key in 64-byte keypair form.
    pub fn secret_key_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.signing_key.to_keypair_bytes().to_vec())
    }
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519KeyPair")
            .field("verifying_key", &self.verifying_key)
            .finish_non_exhaustive()
    }
}
