//! # RPS Escrow
//!
//! Two-party, wagered rock-paper-scissors with commit-reveal moves and a
//! ledger-held pot.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        RPS ESCROW                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  ├── hash.rs     - Domain-separated SHA-256                  │
//! │  └── identity.rs - 32-byte identities and addresses          │
//! │                                                              │
//! │  game/           - Match rules (pure)                        │
//! │  ├── moves.rs    - Moves and outcomes                        │
//! │  ├── commitment.rs - Commit-reveal                           │
//! │  ├── record.rs   - Game record and address derivation        │
//! │  ├── payout.rs   - Pot, house fee, winner share              │
//! │  ├── events.rs   - Transition events                         │
//! │  └── coordinator.rs - create / join / reveal / forfeit       │
//! │                                                              │
//! │  ledger/         - Balances and custody                      │
//! │  ├── mod.rs      - Ledger trait, atomic batches              │
//! │  ├── memory.rs   - In-memory ledger and clocks               │
//! │  └── adapter.rs  - Runs the coordinator against a ledger     │
//! │                                                              │
//! │  network/        - Service surface                           │
//! │  ├── auth.rs     - JWT validation                            │
//! │  ├── protocol.rs - JSON message types                        │
//! │  └── server.rs   - WebSocket server                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - A move is bound by its commitment before the other side's is known
//! - Every operation commits to the ledger as one batch or not at all
//! - A record never holds more than twice its wager
//! - Pot = house fee + winner share, exactly (fees floor)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod ledger;
pub mod network;

// Re-export commonly used types
pub use crate::core::identity::{Address, Identity};
pub use config::EscrowConfig;
pub use game::{Commitment, GameCoordinator, GameError, GameRecord, GameStatus, Move, Outcome};
pub use ledger::{EscrowError, InMemoryLedger, Ledger, LedgerAdapter};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
