//! Multicodec type tags.
//!
//! A multicodec tag is an unsigned varint (LEB128) placed in front of a
//! payload to name its type. `did:key` uses it to mark the key algorithm.

/// Multicodec code for an Ed25519 public key.
pub const ED25519_PUB: u64 = 0xed;

/// bitmask for the 7 payload bits of a varint byte
const LSB_7: u8 = 0x7f;
/// continuation bit
const MSB: u8 = 0x80;

/// Encode `value` as an unsigned varint.
pub fn encode_varint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    loop {
        let byte = (value as u8) & LSB_7;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | MSB);
    }
}

/// Prepend the Ed25519 public key tag (`0xed 0x01`) to `key`.
pub fn prefix_ed25519_pub(key: &[u8]) -> Vec<u8> {
    let mut prefixed = encode_varint(ED25519_PUB);
    prefixed.extend_from_slice(key);
    prefixed
}

/// Strip the Ed25519 public key tag, returning the payload, or `None` if
/// `bytes` carries a different tag.
pub fn strip_ed25519_pub(bytes: &[u8]) -> Option<&[u8]> {
    bytes.strip_prefix(encode_varint(ED25519_PUB).as_slice())
}
