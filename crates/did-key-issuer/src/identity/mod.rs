//! Identity records, the public half of an issued identity.

pub mod record;

pub use record::{DidMethod, IdentityRecord, IdentityStatus, KeyType};
