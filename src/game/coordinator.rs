//! Game Coordinator
//!
//! Pure state transitions for a match. Every operation takes the current
//! record (or nothing, for `create`) and returns a [`Transition`]: the new
//! record, the fund movements it requires, and the events it produced.
//! Nothing is mutated in place; all checks run before the new record is
//! built, so a rejected operation has no effect at all.
//!
//! The ledger applies a transition as one atomic unit.

use serde::{Deserialize, Serialize};

use crate::core::identity::{Address, Identity};
use crate::game::commitment::{self, Commitment};
use crate::game::events::GameEvent;
use crate::game::moves::{decide, Move, Outcome};
use crate::game::payout::{split_pot, MAX_WAGER};
use crate::game::record::{derive_address, GameRecord, GameStatus, Side};

// =============================================================================
// ERRORS
// =============================================================================

/// Rejections produced by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// Wager is zero or its pot would not fit in a u64.
    #[error("invalid wager")]
    InvalidWager,

    /// Move value outside {0, 1, 2}.
    #[error("invalid move value: {0}")]
    InvalidMove(u8),

    /// Commitment is the all-zero "unset" value.
    #[error("commitment must not be empty")]
    EmptyCommitment,

    /// Joiner reused the creator's commitment.
    #[error("commitment already used by the creator")]
    DuplicateCommitment,

    /// Join attempted on a record that is not open.
    #[error("game is not open")]
    GameNotOpen,

    /// Creator tried to join their own match.
    #[error("cannot join your own game")]
    SelfJoin,

    /// Reveal or forfeit attempted before the match was joined.
    #[error("game is not committed")]
    GameNotCommitted,

    /// Operation on a finished match.
    #[error("game has already ended")]
    GameAlreadyEnded,

    /// Caller is not a party to the match.
    #[error("caller is not a party to this game")]
    Unauthorized,

    /// Caller already revealed.
    #[error("move already revealed")]
    AlreadyRevealed,

    /// Move/secret do not match the stored commitment.
    #[error("reveal does not match commitment")]
    InvalidReveal,

    /// Forfeit needs exactly one reveal, and it must be the caller's.
    #[error("forfeit not available")]
    ForfeitUnavailable,

    /// Forfeit requested before the reveal window closed.
    #[error("reveal window still open until {ready_at}")]
    RevealWindowOpen {
        /// Ledger time at which a forfeit becomes claimable.
        ready_at: u64,
    },

    /// No reveal timeout configured.
    #[error("forfeits are disabled")]
    ForfeitDisabled,

    /// Arithmetic overflow.
    #[error("arithmetic overflow")]
    Overflow,
}

// =============================================================================
// TRANSITIONS
// =============================================================================

/// A single fund movement requested by a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transfer {
    /// Move funds from a party into the record's custody.
    Escrow {
        /// Paying party.
        from: Identity,
        /// Amount moved.
        amount: u64,
    },
    /// Move funds out of the record's custody to a party.
    Disburse {
        /// Receiving party.
        to: Identity,
        /// Amount moved.
        amount: u64,
    },
}

/// Result of a successful operation, not yet applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    /// Record address.
    pub address: Address,
    /// Record after the operation.
    pub record: GameRecord,
    /// Whether the record is being created.
    pub is_new: bool,
    /// Fund movements, in order.
    pub transfers: Vec<Transfer>,
    /// Events produced.
    pub events: Vec<GameEvent>,
}

impl Transition {
    /// Sum of funds entering custody.
    pub fn escrowed(&self) -> u64 {
        self.transfers
            .iter()
            .map(|t| match t {
                Transfer::Escrow { amount, .. } => *amount,
                Transfer::Disburse { .. } => 0,
            })
            .sum()
    }

    /// Sum of funds leaving custody.
    pub fn disbursed(&self) -> u64 {
        self.transfers
            .iter()
            .map(|t| match t {
                Transfer::Disburse { amount, .. } => *amount,
                Transfer::Escrow { .. } => 0,
            })
            .sum()
    }
}

// =============================================================================
// COORDINATOR
// =============================================================================

/// Coordinator settings.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Receives the house fee.
    pub house: Identity,
    /// Seconds after joining before a lone revealer may claim by forfeit.
    /// `None` disables forfeits.
    pub reveal_timeout_secs: Option<u64>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            house: Identity::default(),
            reveal_timeout_secs: Some(24 * 60 * 60),
        }
    }
}

/// Validates operations and computes their effects.
#[derive(Clone, Debug, Default)]
pub struct GameCoordinator {
    config: CoordinatorConfig,
}

impl GameCoordinator {
    /// Create a coordinator.
    pub fn new(config: CoordinatorConfig) -> Self {
        Self { config }
    }

    /// Coordinator settings.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Open a new match and escrow the creator's stake.
    ///
    /// Duplicate `(creator, wager)` pairs are caught by the ledger when it
    /// tries to create the account.
    pub fn create(
        &self,
        caller: Identity,
        wager: u64,
        creator_commitment: Commitment,
    ) -> Result<Transition, GameError> {
        if wager == 0 || wager > MAX_WAGER {
            return Err(GameError::InvalidWager);
        }
        if !creator_commitment.is_set() {
            return Err(GameError::EmptyCommitment);
        }

        let (address, bump) = derive_address(&caller, wager);
        let record = GameRecord::open(caller, wager, creator_commitment, bump);

        Ok(Transition {
            address,
            record,
            is_new: true,
            transfers: vec![Transfer::Escrow { from: caller, amount: wager }],
            events: vec![GameEvent::Created { creator: caller, wager }],
        })
    }

    /// Join an open match, escrowing the joiner's stake.
    pub fn join(
        &self,
        address: Address,
        record: &GameRecord,
        caller: Identity,
        joiner_commitment: Commitment,
        now: u64,
    ) -> Result<Transition, GameError> {
        match record.status {
            GameStatus::Open => {}
            GameStatus::Committed | GameStatus::Ended => return Err(GameError::GameNotOpen),
        }
        if caller == record.creator {
            return Err(GameError::SelfJoin);
        }
        if !joiner_commitment.is_set() {
            return Err(GameError::EmptyCommitment);
        }
        // A copied digest would let the joiner replay the creator's reveal.
        if joiner_commitment == record.creator_commitment {
            return Err(GameError::DuplicateCommitment);
        }

        let mut next = record.clone();
        next.opponent = Some(caller);
        next.opponent_commitment = joiner_commitment;
        next.committed_at = Some(now);
        next.status = GameStatus::Committed;

        Ok(Transition {
            address,
            transfers: vec![Transfer::Escrow { from: caller, amount: record.wager }],
            events: vec![GameEvent::Joined { opponent: caller }],
            record: next,
            is_new: false,
        })
    }

    /// Reveal the caller's move. The second reveal resolves the match.
    pub fn reveal(
        &self,
        address: Address,
        record: &GameRecord,
        caller: Identity,
        mv: Move,
        secret: &[u8],
    ) -> Result<Transition, GameError> {
        require_committed(record)?;
        let side = record.side_of(&caller).ok_or(GameError::Unauthorized)?;
        if record.revealed(side).is_some() {
            return Err(GameError::AlreadyRevealed);
        }
        if !commitment::verify(mv, secret, record.commitment(side)) {
            return Err(GameError::InvalidReveal);
        }

        let mut next = record.clone();
        *next.move_slot(side) = Some(mv);
        let mut events = vec![GameEvent::Revealed { side, mv }];
        let mut transfers = Vec::new();

        if let (Some(creator_move), Some(opponent_move)) = (next.creator_move, next.opponent_move) {
            let (payouts, event) = self.resolve(&next, creator_move, opponent_move)?;
            next.status = GameStatus::Ended;
            transfers = payouts;
            events.push(event);
        }

        Ok(Transition {
            address,
            record: next,
            is_new: false,
            transfers,
            events,
        })
    }

    /// Claim the pot when the other side never revealed.
    pub fn claim_forfeit(
        &self,
        address: Address,
        record: &GameRecord,
        caller: Identity,
        now: u64,
    ) -> Result<Transition, GameError> {
        require_committed(record)?;
        let side = record.side_of(&caller).ok_or(GameError::Unauthorized)?;
        if record.reveal_count() != 1 || record.revealed(side).is_none() {
            return Err(GameError::ForfeitUnavailable);
        }

        let timeout = self.config.reveal_timeout_secs.ok_or(GameError::ForfeitDisabled)?;
        let committed_at = record.committed_at.ok_or(GameError::GameNotCommitted)?;
        let ready_at = committed_at.checked_add(timeout).ok_or(GameError::Overflow)?;
        if now < ready_at {
            return Err(GameError::RevealWindowOpen { ready_at });
        }

        let split = split_pot(record.wager)?;
        let mut next = record.clone();
        next.status = GameStatus::Ended;

        Ok(Transition {
            address,
            record: next,
            is_new: false,
            transfers: self.decisive_payouts(caller, split.winner_share, split.house_fee),
            events: vec![GameEvent::Forfeited {
                winner: caller,
                winner_share: split.winner_share,
                house_fee: split.house_fee,
            }],
        })
    }

    /// Compute disbursements once both moves are known.
    fn resolve(
        &self,
        record: &GameRecord,
        creator_move: Move,
        opponent_move: Move,
    ) -> Result<(Vec<Transfer>, GameEvent), GameError> {
        let outcome = decide(creator_move, opponent_move);
        let winner_side = match outcome {
            Outcome::Tie => None,
            Outcome::CreatorWins => Some(Side::Creator),
            Outcome::OpponentWins => Some(Side::Opponent),
        };

        match winner_side {
            None => {
                let opponent = record.opponent.ok_or(GameError::GameNotCommitted)?;
                let refunds = vec![
                    Transfer::Disburse { to: record.creator, amount: record.wager },
                    Transfer::Disburse { to: opponent, amount: record.wager },
                ];
                let event = GameEvent::Resolved {
                    outcome,
                    winner: None,
                    winner_share: 0,
                    house_fee: 0,
                };
                Ok((refunds, event))
            }
            Some(side) => {
                let winner = record.party(side).ok_or(GameError::GameNotCommitted)?;
                let split = split_pot(record.wager)?;
                let event = GameEvent::Resolved {
                    outcome,
                    winner: Some(winner),
                    winner_share: split.winner_share,
                    house_fee: split.house_fee,
                };
                Ok((self.decisive_payouts(winner, split.winner_share, split.house_fee), event))
            }
        }
    }

    fn decisive_payouts(&self, winner: Identity, winner_share: u64, house_fee: u64) -> Vec<Transfer> {
        let mut transfers = vec![Transfer::Disburse { to: winner, amount: winner_share }];
        if house_fee > 0 {
            transfers.push(Transfer::Disburse { to: self.config.house, amount: house_fee });
        }
        transfers
    }
}

fn require_committed(record: &GameRecord) -> Result<(), GameError> {
    match record.status {
        GameStatus::Committed => Ok(()),
        GameStatus::Open => Err(GameError::GameNotCommitted),
        GameStatus::Ended => Err(GameError::GameAlreadyEnded),
    }
}

// =============================================================================
// TESTS
// =============================================================================
