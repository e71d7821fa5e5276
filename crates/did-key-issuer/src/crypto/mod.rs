//! Cryptographic primitives for the issuer.
//!
//! This module provides:
//! - Ed25519 key pair generation from the OS-seeded CSPRNG
//! - Multicodec varint prefixes for self-describing key encodings

pub mod keys;
pub mod multicodec;
