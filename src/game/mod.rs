//! Game Logic Module
//!
//! Rules of a single wagered match. Pure: nothing in here reads a clock or
//! touches balances; callers pass the time in and apply the returned
//! transfers.
//!
//! ## Module Structure
//!
//! - `moves`: Rock/Paper/Scissors and who beats whom
//! - `commitment`: Commit-reveal hashing
//! - `record`: Persisted match state and its address
//! - `payout`: Pot, house fee and winner share
//! - `events`: What each transition did
//! - `coordinator`: Create, join, reveal, resolve, forfeit

pub mod commitment;
pub mod coordinator;
pub mod events;
pub mod moves;
pub mod payout;
pub mod record;

// Re-export key types
pub use commitment::{commit, verify, Commitment};
pub use coordinator::{CoordinatorConfig, GameCoordinator, GameError, Transfer, Transition};
pub use events::GameEvent;
pub use moves::{decide, Move, Outcome};
pub use payout::{split_pot, PotSplit, HOUSE_FEE_BPS};
pub use record::{derive_address, GameRecord, GameStatus, Side};
