//! Pot and Fee Arithmetic
//!
//! Integer-only. `house_fee + winner_share == pot` for every valid wager.

use serde::{Deserialize, Serialize};

use crate::game::coordinator::GameError;

/// House fee in basis points (3%).
pub const HOUSE_FEE_BPS: u64 = 300;

/// Basis point denominator.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Largest wager whose pot still fits in a `u64`.
pub const MAX_WAGER: u64 = u64::MAX / 2;

/// Split of a decisive pot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotSplit {
    /// Both stakes combined.
    pub pot: u64,
    /// Retained by the house.
    pub house_fee: u64,
    /// Paid to the winner.
    pub winner_share: u64,
}

/// Combined stake of both parties.
pub fn pot(wager: u64) -> Result<u64, GameError> {
    wager.checked_mul(2).ok_or(GameError::Overflow)
}

/// Compute the house fee and winner share for a decisive result.
pub fn split_pot(wager: u64) -> Result<PotSplit, GameError> {
    let pot = pot(wager)?;
    // u128 keeps pot * bps from overflowing for large pots
    let house_fee = (pot as u128 * HOUSE_FEE_BPS as u128 / BPS_DENOMINATOR as u128) as u64;
    let winner_share = pot.checked_sub(house_fee).ok_or(GameError::Overflow)?;

    Ok(PotSplit {
        pot,
        house_fee,
        winner_share,
    })
}
