//! Move Commitment Scheme
//!
//! Each party publishes `SHA-256(move ‖ secret)` before seeing the
//! other side's move, and later reveals `(move, secret)` to prove it.
//!
//! The move space is only three values, so the secret is what keeps a
//! digest from being guessed. The core accepts an empty secret; clients
//! should always use [`generate_secret`]-style random bytes.

use crate::core::hash::{Digest32, TaggedHasher};
use crate::core::identity::bytes32_newtype;
use crate::game::moves::Move;

/// Recommended secret length for clients.
pub const RECOMMENDED_SECRET_LEN: usize = 32;

bytes32_newtype!(
    /// A 32-byte move commitment. All-zero means "not set".
    Commitment
);

impl Commitment {
    /// The unset commitment.
    pub const UNSET: Commitment = Commitment([0u8; 32]);

    /// Check whether this slot has been filled.
    pub fn is_set(&self) -> bool {
        self.0 != [0u8; 32]
    }
}

/// Commit to a move with a secret.
pub fn commit(mv: Move, secret: &[u8]) -> Commitment {
    Commitment(compute_digest(mv.as_u8(), secret))
}

/// Verify a revealed `(move, secret)` against a stored commitment.
pub fn verify(mv: Move, secret: &[u8], commitment: &Commitment) -> bool {
    commit(mv, secret) == *commitment
}

fn compute_digest(move_byte: u8, secret: &[u8]) -> Digest32 {
    let mut hasher = TaggedHasher::untagged();
    hasher.update_u8(move_byte);
    hasher.update_bytes(secret);
    hasher.finalize()
}

/// Fill a fresh secret from the supplied random source.
///
/// Takes the filler as a closure so the core does not depend on a
/// particular RNG.
pub fn generate_secret<F>(fill: F) -> [u8; RECOMMENDED_SECRET_LEN]
where
    F: FnOnce(&mut [u8]),
{
    let mut secret = [0u8; RECOMMENDED_SECRET_LEN];
    fill(&mut secret);
    secret
}
