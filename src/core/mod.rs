//! Core primitives.
//!
//! Domain-separated hashing and the 32-byte identifiers everything else is
//! keyed on.

pub mod hash;
pub mod identity;

pub use hash::{hash_bytes, hash_with_domain, Digest32, TaggedHasher};
pub use identity::{Address, Identity, ParseBytesError};
