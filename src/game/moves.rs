//! Moves and Outcomes
//!
//! Rock=0, Paper=1, Scissors=2. Each value beats the one before it
//! in the cycle, so the winner falls out of `(a - b) mod 3`.

use serde::{Deserialize, Serialize};

use crate::game::coordinator::GameError;

/// A revealed move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Move {
    /// Beats Scissors.
    Rock = 0,
    /// Beats Rock.
    Paper = 1,
    /// Beats Paper.
    Scissors = 2,
}

impl Move {
    /// All moves in value order.
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    /// Wire/commitment byte.
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Move {
    type Error = GameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Move::Rock),
            1 => Ok(Move::Paper),
            2 => Ok(Move::Scissors),
            other => Err(GameError::InvalidMove(other)),
        }
    }
}

/// Result of a resolved match, from the creator's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Same move on both sides.
    Tie,
    /// Creator's move beats opponent's.
    CreatorWins,
    /// Opponent's move beats creator's.
    OpponentWins,
}

/// Decide a match: `delta = (creator - opponent) mod 3`.
pub fn decide(creator: Move, opponent: Move) -> Outcome {
    let delta = (3 + creator.as_u8() - opponent.as_u8()) % 3;
    match delta {
        0 => Outcome::Tie,
        1 => Outcome::CreatorWins,
        _ => Outcome::OpponentWins,
    }
}
