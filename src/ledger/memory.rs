//! In-Memory Ledger
//!
//! Reference [`Ledger`] used by the service and the tests.
//! `BTreeMap` everywhere so iteration and dumps are deterministic.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::core::identity::{Address, Identity};
use crate::game::coordinator::Transfer;
use crate::ledger::{Batch, Ledger, LedgerError, RecordWrite};

// =============================================================================
// CLOCKS
// =============================================================================

/// Source of ledger time.
pub trait Clock: Send + Sync {
    /// Current Unix time in seconds.
    fn now(&self) -> u64;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// Settable clock for tests and simulations.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Start at a given time.
    pub fn at(now: u64) -> Self {
        Self { now: Arc::new(AtomicU64::new(now)) }
    }

    /// Move time forward.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// Jump to an absolute time.
    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// =============================================================================
// LEDGER
// =============================================================================

/// Ledger kept entirely in memory.
pub struct InMemoryLedger {
    balances: BTreeMap<Identity, u64>,
    records: BTreeMap<Address, Vec<u8>>,
    custody: BTreeMap<Address, u64>,
    clock: Box<dyn Clock>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    /// Empty ledger on the wall clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Empty ledger on a custom clock.
    pub fn with_clock<C: Clock + 'static>(clock: C) -> Self {
        Self {
            balances: BTreeMap::new(),
            records: BTreeMap::new(),
            custody: BTreeMap::new(),
            clock: Box::new(clock),
        }
    }

    /// Add funds to a party (dev faucet).
    pub fn credit(&mut self, identity: Identity, amount: u64) -> Result<u64, LedgerError> {
        let balance = self.balances.entry(identity).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        debug!("Credited {} to {}, balance {}", amount, identity.short(), *balance);
        Ok(*balance)
    }

    /// Whether a party has ever held a balance.
    pub fn has_account(&self, identity: &Identity) -> bool {
        self.balances.contains_key(identity)
    }

    /// Number of record accounts.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Sum of all balances and custody. Constant across commits.
    pub fn total_supply(&self) -> u128 {
        let balances: u128 = self.balances.values().map(|v| *v as u128).sum();
        let custody: u128 = self.custody.values().map(|v| *v as u128).sum();
        balances + custody
    }
}

impl Ledger for InMemoryLedger {
    fn now(&self) -> u64 {
        self.clock.now()
    }

    fn load(&self, address: &Address) -> Option<Vec<u8>> {
        self.records.get(address).cloned()
    }

    fn balance(&self, identity: &Identity) -> u64 {
        self.balances.get(identity).copied().unwrap_or(0)
    }

    fn custody(&self, address: &Address) -> u64 {
        self.custody.get(address).copied().unwrap_or(0)
    }

    fn commit(&mut self, batch: Batch) -> Result<(), LedgerError> {
        let exists = self.records.contains_key(&batch.address);
        match &batch.write {
            RecordWrite::Create(_) if exists => return Err(LedgerError::AccountExists(batch.address)),
            RecordWrite::Update(_) if !exists => return Err(LedgerError::AccountNotFound(batch.address)),
            _ => {}
        }

        // Stage every balance change on copies; commit only if all succeed.
        let mut balances: BTreeMap<Identity, u64> = BTreeMap::new();
        let mut custody = self.custody(&batch.address);

        for transfer in &batch.transfers {
            match *transfer {
                Transfer::Escrow { from, amount } => {
                    let available = *balances.entry(from).or_insert_with(|| self.balance(&from));
                    let remaining = available
                        .checked_sub(amount)
                        .ok_or(LedgerError::InsufficientFunds { needed: amount, available })?;
                    balances.insert(from, remaining);
                    custody = custody.checked_add(amount).ok_or(LedgerError::Overflow)?;
                }
                Transfer::Disburse { to, amount } => {
                    custody = custody
                        .checked_sub(amount)
                        .ok_or(LedgerError::InsufficientCustody { needed: amount, available: custody })?;
                    let current = *balances.entry(to).or_insert_with(|| self.balance(&to));
                    balances.insert(to, current.checked_add(amount).ok_or(LedgerError::Overflow)?);
                }
            }
        }

        self.balances.extend(balances);
        self.custody.insert(batch.address, custody);
        let data = match batch.write {
            RecordWrite::Create(data) | RecordWrite::Update(data) => data,
        };
        self.records.insert(batch.address, data);

        debug!(
            "Committed batch for {} ({} transfers, custody {})",
            batch.address.short(),
            batch.transfers.len(),
            custody
        );
        Ok(())
    }
}
