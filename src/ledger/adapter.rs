//! Ledger Adapter
//!
//! Loads a record, asks the coordinator for a transition, checks the
//! custody bound, and hands the whole thing to the ledger as one batch.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::core::identity::{Address, Identity};
use crate::game::commitment::Commitment;
use crate::game::coordinator::{GameCoordinator, GameError, Transition};
use crate::game::events::GameEvent;
use crate::game::moves::Move;
use crate::game::payout;
use crate::game::record::GameRecord;
use crate::ledger::{Batch, Ledger, LedgerError, RecordWrite};

/// Errors from a full operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EscrowError {
    /// Rejected by the game rules.
    #[error(transparent)]
    Game(#[from] GameError),

    /// Rejected by the ledger.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// No record at this address.
    #[error("game not found: {0}")]
    NotFound(Address),

    /// Stored record does not derive to the address it lives at.
    #[error("record address mismatch at {0}")]
    AddressMismatch(Address),

    /// Stored bytes do not decode as a record.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    /// Record could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// Transition would leave custody outside [0, 2 x wager].
    #[error("custody invariant violated: {custody} held for wager {wager}")]
    CustodyInvariant {
        /// Custody after the transition.
        custody: u64,
        /// Record wager.
        wager: u64,
    },
}

/// What a successful operation left behind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Record address.
    pub address: Address,
    /// Record as committed.
    pub record: GameRecord,
    /// Events produced.
    pub events: Vec<GameEvent>,
}

/// Runs game operations against a ledger.
pub struct LedgerAdapter<L: Ledger> {
    ledger: L,
    coordinator: GameCoordinator,
}

impl<L: Ledger> LedgerAdapter<L> {
    /// Wrap a ledger.
    pub fn new(ledger: L, coordinator: GameCoordinator) -> Self {
        Self { ledger, coordinator }
    }

    /// Underlying ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Underlying ledger, mutably (funding, clock control).
    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    /// Coordinator in use.
    pub fn coordinator(&self) -> &GameCoordinator {
        &self.coordinator
    }

    /// Spendable balance of a party.
    pub fn balance(&self, identity: &Identity) -> u64 {
        self.ledger.balance(identity)
    }

    /// Funds held by a record.
    pub fn custody(&self, address: &Address) -> u64 {
        self.ledger.custody(address)
    }

    /// Read-only fetch of a record.
    pub fn fetch(&self, address: &Address) -> Result<GameRecord, EscrowError> {
        let data = self.ledger.load(address).ok_or(EscrowError::NotFound(*address))?;
        let record =
            GameRecord::from_bytes(&data).map_err(|e| EscrowError::CorruptRecord(e.to_string()))?;
        if record.address() != Some(*address) {
            return Err(EscrowError::AddressMismatch(*address));
        }
        Ok(record)
    }

    /// Open a match.
    #[instrument(skip(self, commitment))]
    pub fn create(
        &mut self,
        caller: Identity,
        wager: u64,
        commitment: Commitment,
    ) -> Result<Receipt, EscrowError> {
        let transition = self.coordinator.create(caller, wager, commitment)?;
        self.apply(transition)
    }

    /// Join an open match.
    #[instrument(skip(self, commitment))]
    pub fn join(
        &mut self,
        caller: Identity,
        address: Address,
        commitment: Commitment,
    ) -> Result<Receipt, EscrowError> {
        let record = self.fetch(&address)?;
        let now = self.ledger.now();
        let transition = self.coordinator.join(address, &record, caller, commitment, now)?;
        self.apply(transition)
    }

    /// Reveal a move; resolves the match on the second reveal.
    ///
    /// `move_value` is validated before the record is even loaded.
    #[instrument(skip(self, secret))]
    pub fn reveal(
        &mut self,
        caller: Identity,
        address: Address,
        move_value: u8,
        secret: &[u8],
    ) -> Result<Receipt, EscrowError> {
        let mv = Move::try_from(move_value)?;
        let record = self.fetch(&address)?;
        let transition = match self.coordinator.reveal(address, &record, caller, mv, secret) {
            Ok(t) => t,
            Err(GameError::InvalidReveal) => {
                warn!("Rejected reveal from {} on {}: commitment mismatch", caller.short(), address.short());
                return Err(GameError::InvalidReveal.into());
            }
            Err(e) => return Err(e.into()),
        };
        self.apply(transition)
    }

    /// Claim the pot after the other side failed to reveal in time.
    #[instrument(skip(self))]
    pub fn claim_forfeit(&mut self, caller: Identity, address: Address) -> Result<Receipt, EscrowError> {
        let record = self.fetch(&address)?;
        let now = self.ledger.now();
        let transition = self.coordinator.claim_forfeit(address, &record, caller, now)?;
        self.apply(transition)
    }

    /// Check bounds, encode, and commit a transition as one batch.
    fn apply(&mut self, transition: Transition) -> Result<Receipt, EscrowError> {
        let wager = transition.record.wager;
        let max_custody = payout::pot(wager)?;
        let custody = self
            .ledger
            .custody(&transition.address)
            .checked_add(transition.escrowed())
            .and_then(|c| c.checked_sub(transition.disbursed()))
            .ok_or(EscrowError::CustodyInvariant { custody: 0, wager })?;
        if custody > max_custody {
            return Err(EscrowError::CustodyInvariant { custody, wager });
        }

        let data = transition
            .record
            .to_bytes()
            .map_err(|e| EscrowError::Encode(e.to_string()))?;
        let write = if transition.is_new {
            RecordWrite::Create(data)
        } else {
            RecordWrite::Update(data)
        };

        self.ledger.commit(Batch {
            address: transition.address,
            write,
            transfers: transition.transfers.clone(),
        })?;

        for event in &transition.events {
            match event {
                GameEvent::Resolved { outcome, winner, winner_share, house_fee } => info!(
                    "Game {} resolved: {:?}, winner {:?}, share {}, fee {}",
                    transition.address.short(),
                    outcome,
                    winner.map(|w| w.short()),
                    winner_share,
                    house_fee
                ),
                GameEvent::Forfeited { winner, winner_share, house_fee } => info!(
                    "Game {} forfeited to {}, share {}, fee {}",
                    transition.address.short(),
                    winner.short(),
                    winner_share,
                    house_fee
                ),
                other => debug!("Game {} {}", transition.address.short(), other.name()),
            }
        }

        Ok(Receipt {
            address: transition.address,
            record: transition.record,
            events: transition.events,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::commitment::commit;
    use crate::game::coordinator::{CoordinatorConfig, Transfer};
    use crate::game::record::{derive_address, GameStatus};
    use crate::ledger::memory::{InMemoryLedger, ManualClock};
    use proptest::prelude::*;

    const HOUSE: Identity = Identity::new([0xee; 32]);
    const CREATOR: Identity = Identity::new([1; 32]);
    const OPPONENT: Identity = Identity::new([2; 32]);
    const STRANGER: Identity = Identity::new([3; 32]);

    const ROCK: u8 = 0;
    const PAPER: u8 = 1;
    const SCISSORS: u8 = 2;

    fn setup() -> (LedgerAdapter<InMemoryLedger>, ManualClock) {
        let clock = ManualClock::at(1_700_000_000);
        let mut ledger = InMemoryLedger::with_clock(clock.clone());
        for who in [CREATOR, OPPONENT, STRANGER] {
            ledger.credit(who, 1_000).unwrap();
        }
        let coordinator = GameCoordinator::new(CoordinatorConfig {
            house: HOUSE,
            reveal_timeout_secs: Some(3_600),
        });
        (LedgerAdapter::new(ledger, coordinator), clock)
    }

    fn mv(value: u8) -> Move {
        Move::try_from(value).unwrap()
    }

    fn committed(adapter: &mut LedgerAdapter<InMemoryLedger>, c: u8, o: u8) -> Address {
        let created = adapter.create(CREATOR, 100, commit(mv(c), b"s1")).unwrap();
        adapter.join(OPPONENT, created.address, commit(mv(o), b"s2")).unwrap();
        created.address
    }

    #[test]
    fn test_decisive_win_scenario() {
        let (mut adapter, _) = setup();
        let game = committed(&mut adapter, ROCK, SCISSORS);

        assert_eq!(adapter.balance(&CREATOR), 900);
        assert_eq!(adapter.balance(&OPPONENT), 900);
        assert_eq!(adapter.custody(&game), 200);

        let first = adapter.reveal(CREATOR, game, ROCK, b"s1").unwrap();
        assert_eq!(first.record.status, GameStatus::Committed);
        assert_eq!(adapter.custody(&game), 200);

        let second = adapter.reveal(OPPONENT, game, SCISSORS, b"s2").unwrap();
        assert_eq!(second.record.status, GameStatus::Ended);

        assert_eq!(adapter.balance(&CREATOR), 900 + 194);
        assert_eq!(adapter.balance(&OPPONENT), 900);
        assert_eq!(adapter.balance(&HOUSE), 6);
        assert_eq!(adapter.custody(&game), 0);
        assert_eq!(adapter.ledger().total_supply(), 3_000);
    }

    #[test]
    fn test_tie_scenario() {
        let (mut adapter, _) = setup();
        let game = committed(&mut adapter, ROCK, ROCK);

        adapter.reveal(OPPONENT, game, ROCK, b"s2").unwrap();
        adapter.reveal(CREATOR, game, ROCK, b"s1").unwrap();

        assert_eq!(adapter.balance(&CREATOR), 1_000);
        assert_eq!(adapter.balance(&OPPONENT), 1_000);
        assert_eq!(adapter.balance(&HOUSE), 0);
        assert_eq!(adapter.fetch(&game).unwrap().status, GameStatus::Ended);
    }

    #[test]
    fn test_cheating_rejected_scenario() {
        let (mut adapter, _) = setup();
        let game = committed(&mut adapter, ROCK, SCISSORS);
        let before = adapter.fetch(&game).unwrap();

        let result = adapter.reveal(OPPONENT, game, PAPER, b"s2");
        assert_eq!(result, Err(EscrowError::Game(GameError::InvalidReveal)));

        let after = adapter.fetch(&game).unwrap();
        assert_eq!(after, before);
        assert_eq!(after.opponent_move, None);
        assert_eq!(adapter.custody(&game), 200);

        // Retry with the real move still works.
        assert!(adapter.reveal(OPPONENT, game, SCISSORS, b"s2").is_ok());
    }

    #[test]
    fn test_late_join_scenario() {
        let (mut adapter, _) = setup();
        let game = committed(&mut adapter, ROCK, SCISSORS);

        let result = adapter.join(STRANGER, game, commit(Move::Paper, b"s3"));
        assert_eq!(result, Err(EscrowError::Game(GameError::GameNotOpen)));

        let record = adapter.fetch(&game).unwrap();
        assert_eq!(record.opponent, Some(OPPONENT));
        assert_eq!(record.opponent_commitment, commit(Move::Scissors, b"s2"));
        assert_eq!(adapter.balance(&STRANGER), 1_000);
    }

    #[test]
    fn test_double_reveal() {
        let (mut adapter, _) = setup();
        let game = committed(&mut adapter, ROCK, SCISSORS);
        adapter.reveal(CREATOR, game, ROCK, b"s1").unwrap();

        assert_eq!(
            adapter.reveal(CREATOR, game, ROCK, b"s1"),
            Err(EscrowError::Game(GameError::AlreadyRevealed))
        );
    }

    #[test]
    fn test_invalid_move_rejected_before_load() {
        let (mut adapter, _) = setup();
        let missing = Address::new([5; 32]);
        assert_eq!(
            adapter.reveal(CREATOR, missing, 3, b"s1"),
            Err(EscrowError::Game(GameError::InvalidMove(3)))
        );
    }

    #[test]
    fn test_duplicate_create_passes_ledger_error() {
        let (mut adapter, _) = setup();
        adapter.create(CREATOR, 100, commit(Move::Rock, b"a")).unwrap();
        let result = adapter.create(CREATOR, 100, commit(Move::Paper, b"b"));

        let (address, _) = derive_address(&CREATOR, 100);
        assert_eq!(result, Err(EscrowError::Ledger(LedgerError::AccountExists(address))));
        assert_eq!(adapter.balance(&CREATOR), 900);

        // A different wager is a different record.
        assert!(adapter.create(CREATOR, 101, commit(Move::Paper, b"b")).is_ok());
    }

    #[test]
    fn test_insufficient_funds_passthrough() {
        let (mut adapter, _) = setup();
        let result = adapter.create(CREATOR, 1_001, commit(Move::Rock, b"a"));
        assert_eq!(
            result,
            Err(EscrowError::Ledger(LedgerError::InsufficientFunds { needed: 1_001, available: 1_000 }))
        );
        assert_eq!(adapter.ledger().record_count(), 0);
    }

    #[test]
    fn test_join_unknown_game() {
        let (mut adapter, _) = setup();
        let missing = Address::new([5; 32]);
        assert_eq!(
            adapter.join(OPPONENT, missing, commit(Move::Rock, b"a")),
            Err(EscrowError::NotFound(missing))
        );
    }

    #[test]
    fn test_record_at_wrong_address_rejected() {
        let (mut adapter, _) = setup();
        let created = adapter.create(CREATOR, 100, commit(Move::Rock, b"a")).unwrap();
        let bogus = Address::new([7; 32]);
        adapter
            .ledger_mut()
            .commit(Batch {
                address: bogus,
                write: RecordWrite::Create(created.record.to_bytes().unwrap()),
                transfers: vec![],
            })
            .unwrap();

        assert_eq!(adapter.fetch(&bogus), Err(EscrowError::AddressMismatch(bogus)));
    }

    #[test]
    fn test_forfeit_scenario() {
        let (mut adapter, clock) = setup();
        let game = committed(&mut adapter, PAPER, ROCK);
        adapter.reveal(OPPONENT, game, ROCK, b"s2").unwrap();

        let early = adapter.claim_forfeit(OPPONENT, game);
        assert!(matches!(early, Err(EscrowError::Game(GameError::RevealWindowOpen { .. }))));

        clock.advance(3_600);
        let receipt = adapter.claim_forfeit(OPPONENT, game).unwrap();
        assert_eq!(receipt.record.status, GameStatus::Ended);
        assert_eq!(adapter.balance(&OPPONENT), 900 + 194);
        assert_eq!(adapter.balance(&HOUSE), 6);

        // Creator's late reveal lands on an ended game.
        assert_eq!(
            adapter.reveal(CREATOR, game, PAPER, b"s1"),
            Err(EscrowError::Game(GameError::GameAlreadyEnded))
        );
    }

    #[test]
    fn test_full_lifecycle_events() {
        let (mut adapter, _) = setup();
        let created = adapter.create(CREATOR, 100, commit(Move::Paper, b"s1")).unwrap();
        assert!(matches!(created.events[0], GameEvent::Created { wager: 100, .. }));

        let joined = adapter.join(OPPONENT, created.address, commit(Move::Rock, b"s2")).unwrap();
        assert!(matches!(joined.events[0], GameEvent::Joined { .. }));

        adapter.reveal(CREATOR, created.address, PAPER, b"s1").unwrap();
        let last = adapter.reveal(OPPONENT, created.address, ROCK, b"s2").unwrap();
        assert_eq!(last.events.len(), 2);
        assert!(last.events[1].is_terminal());
    }

    #[test]
    fn test_copied_commitment_cannot_force_tie() {
        let (mut adapter, _) = setup();
        let created = adapter.create(CREATOR, 100, commit(Move::Rock, b"creator-secret")).unwrap();

        let result = adapter.join(OPPONENT, created.address, created.record.creator_commitment);
        assert_eq!(result, Err(EscrowError::Game(GameError::DuplicateCommitment)));

        let record = adapter.fetch(&created.address).unwrap();
        assert_eq!(record.status, GameStatus::Open);
        assert_eq!(record.opponent, None);
        assert_eq!(adapter.balance(&OPPONENT), 1_000);
        assert_eq!(adapter.custody(&created.address), 100);
    }

    #[test]
    fn test_over_escrow_rejected_before_commit() {
        let (mut adapter, _) = setup();
        let mut transition = adapter
            .coordinator()
            .create(CREATOR, 100, commit(Move::Paper, b"s1"))
            .unwrap();
        transition.transfers.push(Transfer::Escrow { from: OPPONENT, amount: 101 });
        let address = transition.address;

        let result = adapter.apply(transition);
        assert_eq!(result, Err(EscrowError::CustodyInvariant { custody: 201, wager: 100 }));

        assert_eq!(adapter.ledger().load(&address), None);
        assert_eq!(adapter.balance(&CREATOR), 1_000);
        assert_eq!(adapter.balance(&OPPONENT), 1_000);
        assert_eq!(adapter.custody(&address), 0);
    }

    proptest! {
        #[test]
        fn prop_custody_bounded_by_pot(
            c in 0u8..3,
            o in 0u8..3,
            wager in 1u64..=1_000,
            creator_first in any::<bool>(),
            reveals in 0usize..=2,
            wait in 0u64..=7_200,
        ) {
            let (mut adapter, clock) = setup();
            let pot = wager * 2;

            let address = adapter.create(CREATOR, wager, commit(mv(c), b"c")).unwrap().address;
            prop_assert!(adapter.custody(&address) <= pot);
            adapter.join(OPPONENT, address, commit(mv(o), b"o")).unwrap();
            prop_assert_eq!(adapter.custody(&address), pot);

            let order: [(Identity, u8, &[u8]); 2] = if creator_first {
                [(CREATOR, c, &b"c"[..]), (OPPONENT, o, &b"o"[..])]
            } else {
                [(OPPONENT, o, &b"o"[..]), (CREATOR, c, &b"c"[..])]
            };
            for &(who, value, secret) in order.iter().take(reveals) {
                adapter.reveal(who, address, value, secret).unwrap();
                prop_assert!(adapter.custody(&address) <= pot);
            }

            if reveals == 1 {
                clock.advance(wait);
                let claim = adapter.claim_forfeit(order[0].0, address);
                prop_assert_eq!(claim.is_ok(), wait >= 3_600);
                prop_assert!(adapter.custody(&address) <= pot);
            }

            let record = adapter.fetch(&address).unwrap();
            if record.status == GameStatus::Ended {
                prop_assert_eq!(adapter.custody(&address), 0);
            } else {
                prop_assert_eq!(adapter.custody(&address), pot);
            }
            prop_assert_eq!(adapter.ledger().total_supply(), 3_000);
        }
    }
}
