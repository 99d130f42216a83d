//! Game Record
//!
//! The persisted state of one match. The ledger stores it as opaque
//! bytes at a deterministic address derived from `(creator, wager)`,
//! so a creator can have at most one record per wager amount.

use serde::{Deserialize, Serialize};

use crate::core::hash::TaggedHasher;
use crate::core::identity::{Address, Identity};
use crate::game::commitment::Commitment;
use crate::game::moves::Move;

// =============================================================================
// ADDRESS DERIVATION
// =============================================================================

/// Highest derivation nonce; the search walks downwards from here.
pub const MAX_BUMP: u8 = u8::MAX;

/// Compute the address for an explicit nonce.
///
/// Returns `None` if the result is the reserved all-zero address.
pub fn create_address(creator: &Identity, wager: u64, bump: u8) -> Option<Address> {
    let mut hasher = TaggedHasher::for_game_address();
    hasher.update_bytes(creator.as_bytes());
    hasher.update_u64(wager);
    hasher.update_u8(bump);
    let address = Address(hasher.finalize());
    (!address.is_reserved()).then_some(address)
}

/// Derive the canonical `(address, bump)` for a creator and wager.
///
/// Pure function of its inputs; no registry lookup.
pub fn derive_address(creator: &Identity, wager: u64) -> (Address, u8) {
    for bump in (0..=MAX_BUMP).rev() {
        if let Some(address) = create_address(creator, wager, bump) {
            return (address, bump);
        }
    }
    // 256 consecutive all-zero SHA-256 outputs do not happen.
    unreachable!("no valid game address for any bump")
}

// =============================================================================
// STATUS
// =============================================================================

/// Lifecycle of a match. `Open -> Committed -> Ended`, never backwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Waiting for an opponent.
    Open,
    /// Both commitments and stakes in; reveals pending.
    Committed,
    /// Resolved and paid out. Terminal.
    Ended,
}

// =============================================================================
// RECORD
// =============================================================================

/// Which side of the match a caller is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The party who opened the match.
    Creator,
    /// The party who joined it.
    Opponent,
}

/// Full state of one match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Party who opened the match.
    pub creator: Identity,
    /// Party who joined, once joined.
    pub opponent: Option<Identity>,
    /// Stake each side posts.
    pub wager: u64,
    /// Creator's hidden move.
    pub creator_commitment: Commitment,
    /// Opponent's hidden move (unset while open).
    pub opponent_commitment: Commitment,
    /// Creator's revealed move.
    pub creator_move: Option<Move>,
    /// Opponent's revealed move.
    pub opponent_move: Option<Move>,
    /// Lifecycle state.
    pub status: GameStatus,
    /// Address derivation nonce.
    pub bump: u8,
    /// Ledger time (Unix seconds) the match became `Committed`.
    pub committed_at: Option<u64>,
}

impl GameRecord {
    /// A freshly opened match.
    pub fn open(creator: Identity, wager: u64, creator_commitment: Commitment, bump: u8) -> Self {
        Self {
            creator,
            opponent: None,
            wager,
            creator_commitment,
            opponent_commitment: Commitment::UNSET,
            creator_move: None,
            opponent_move: None,
            status: GameStatus::Open,
            bump,
            committed_at: None,
        }
    }

    /// Re-derive this record's address from its stored nonce.
    pub fn address(&self) -> Option<Address> {
        create_address(&self.creator, self.wager, self.bump)
    }

    /// Which side `who` plays, if any.
    pub fn side_of(&self, who: &Identity) -> Option<Side> {
        if *who == self.creator {
            Some(Side::Creator)
        } else if self.opponent.as_ref() == Some(who) {
            Some(Side::Opponent)
        } else {
            None
        }
    }

    /// Identity playing `side`.
    pub fn party(&self, side: Side) -> Option<Identity> {
        match side {
            Side::Creator => Some(self.creator),
            Side::Opponent => self.opponent,
        }
    }

    /// Stored commitment for `side`.
    pub fn commitment(&self, side: Side) -> &Commitment {
        match side {
            Side::Creator => &self.creator_commitment,
            Side::Opponent => &self.opponent_commitment,
        }
    }

    /// Revealed move for `side`.
    pub fn revealed(&self, side: Side) -> Option<Move> {
        match side {
            Side::Creator => self.creator_move,
            Side::Opponent => self.opponent_move,
        }
    }

    /// Mutable move slot for `side`.
    pub(crate) fn move_slot(&mut self, side: Side) -> &mut Option<Move> {
        match side {
            Side::Creator => &mut self.creator_move,
            Side::Opponent => &mut self.opponent_move,
        }
    }

    /// Number of revealed moves (0..=2).
    pub fn reveal_count(&self) -> usize {
        self.creator_move.is_some() as usize + self.opponent_move.is_some() as usize
    }

    /// Check the status/field invariants.
    pub fn is_consistent(&self) -> bool {
        let commitments_set = self.creator_commitment.is_set() && self.opponent_commitment.is_set();
        match self.status {
            GameStatus::Open => {
                self.opponent.is_none()
                    && self.creator_commitment.is_set()
                    && !self.opponent_commitment.is_set()
                    && self.reveal_count() == 0
                    && self.committed_at.is_none()
            }
            GameStatus::Committed => {
                self.opponent.is_some()
                    && commitments_set
                    && self.reveal_count() < 2
                    && self.committed_at.is_some()
            }
            GameStatus::Ended => {
                self.opponent.is_some() && commitments_set && self.reveal_count() >= 1
            }
        }
    }

    /// Encode as ledger account bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Decode from ledger account bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}
