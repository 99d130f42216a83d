//! Ledger Interface
//!
//! The external store the core runs against. It owns balances, record
//! bytes and the funds held in each record's custody, and it applies a
//! whole operation ([`Batch`]) atomically or not at all.
//!
//! - `memory.rs`  - Reference in-memory ledger
//! - `adapter.rs` - Drives the coordinator against a ledger

pub mod adapter;
pub mod memory;

use crate::core::identity::{Address, Identity};
use crate::game::coordinator::Transfer;

pub use adapter::{EscrowError, LedgerAdapter};
pub use memory::{Clock, InMemoryLedger, ManualClock, SystemClock};

/// Errors raised by the ledger itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Party cannot cover an escrow transfer.
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds {
        /// Amount requested.
        needed: u64,
        /// Amount available.
        available: u64,
    },

    /// Record custody cannot cover a disbursement.
    #[error("insufficient custody: need {needed}, have {available}")]
    InsufficientCustody {
        /// Amount requested.
        needed: u64,
        /// Amount in custody.
        available: u64,
    },

    /// Creating an account at an address that already exists.
    #[error("account already exists: {0}")]
    AccountExists(Address),

    /// Updating an account that does not exist.
    #[error("account not found: {0}")]
    AccountNotFound(Address),

    /// Balance arithmetic overflow.
    #[error("balance overflow")]
    Overflow,
}

/// How a batch writes the record account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordWrite {
    /// Create a new account; fails if it exists.
    Create(Vec<u8>),
    /// Overwrite an existing account; fails if it is missing.
    Update(Vec<u8>),
}

/// Everything one operation changes, applied atomically.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    /// Record account touched by the operation.
    pub address: Address,
    /// New record bytes.
    pub write: RecordWrite,
    /// Fund movements into and out of the record's custody.
    pub transfers: Vec<Transfer>,
}

/// External ledger collaborator.
pub trait Ledger {
    /// Current ledger time (Unix seconds).
    fn now(&self) -> u64;

    /// Raw bytes of a record account, if it exists.
    fn load(&self, address: &Address) -> Option<Vec<u8>>;

    /// Spendable balance of a party.
    fn balance(&self, identity: &Identity) -> u64;

    /// Funds held in a record's custody.
    fn custody(&self, address: &Address) -> u64;

    /// Apply a batch. On error nothing is changed.
    fn commit(&mut self, batch: Batch) -> Result<(), LedgerError>;
}
