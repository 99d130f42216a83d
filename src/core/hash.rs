//! Tagged Hashing
//!
//! Domain-separated SHA-256 used for:
//! - Move commitments
//! - Game record address derivation
//! - Identity derivation from auth subjects

use sha2::{Sha256, Digest};

/// Hash output type (256 bits / 32 bytes)
pub type Digest32 = [u8; 32];

/// Domain tag for game record addresses.
pub const GAME_ADDRESS_DOMAIN: &[u8] = b"RPS_ESCROW_GAME_V1";

/// Domain tag for identities derived from auth subjects.
pub const PLAYER_IDENTITY_DOMAIN: &[u8] = b"rps-escrow-player:";

/// Deterministic hasher with a domain separator.
///
/// Order of updates is part of the output; callers must feed
/// fields in a fixed order.
pub struct TaggedHasher {
    hasher: Sha256,
}

impl TaggedHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create a hasher with no domain prefix.
    pub fn untagged() -> Self {
        Self { hasher: Sha256::new() }
    }

    /// Create hasher for game record addresses.
    pub fn for_game_address() -> Self {
        Self::new(GAME_ADDRESS_DOMAIN)
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> Digest32 {
        self.hasher.finalize().into()
    }
}

/// Compute a plain SHA-256 of arbitrary data.
pub fn hash_bytes(data: &[u8]) -> Digest32 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute hash with domain separator.
pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Digest32 {
    let mut hasher = TaggedHasher::new(domain);
    hasher.update_bytes(data);
    hasher.finalize()
}

// =============================================================================
// TESTS
// =============================================================================
