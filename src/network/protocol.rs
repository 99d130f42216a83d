//! Protocol Messages
//!
//! JSON wire format for client-server communication over WebSocket.
//! Byte fields (identities, addresses, commitments, secrets) travel as hex.

use serde::{Deserialize, Serialize};

use crate::core::identity::{Address, Identity};
use crate::game::commitment::Commitment;
use crate::game::coordinator::GameError;
use crate::game::events::GameEvent;
use crate::game::record::GameRecord;
use crate::ledger::{EscrowError, LedgerError};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Authenticate with a JWT.
    Auth(AuthRequest),

    /// Open a match.
    Create(CreateRequest),

    /// Join an open match.
    Join(JoinRequest),

    /// Reveal a committed move.
    Reveal(RevealRequest),

    /// Claim the pot after the other side failed to reveal.
    ClaimForfeit {
        /// Game address.
        game: Address,
    },

    /// Read a game record.
    Fetch {
        /// Game address.
        game: Address,
    },

    /// Read own balance.
    Balance,

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp.
        timestamp: u64,
    },
}

/// Authentication request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    /// JWT from the auth provider.
    pub token: String,
}

/// Open a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Stake per side.
    pub wager: u64,
    /// Creator's move commitment.
    pub commitment: Commitment,
}

/// Join a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Game address.
    pub game: Address,
    /// Joiner's move commitment.
    pub commitment: Commitment,
}

/// Reveal a move.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealRequest {
    /// Game address.
    pub game: Address,
    /// Rock=0, Paper=1, Scissors=2.
    pub move_value: u8,
    /// Hex-encoded secret used in the commitment.
    pub secret: String,
}

impl RevealRequest {
    /// Decode the hex secret.
    pub fn secret_bytes(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(&self.secret)
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Authentication result.
    AuthResult(AuthResult),

    /// Current state of a game, plus what just happened to it.
    Game(GameUpdate),

    /// Balance of the authenticated identity.
    Balance {
        /// Identity queried.
        identity: Identity,
        /// Spendable amount.
        amount: u64,
    },

    /// Pong response.
    Pong {
        /// Echoed client timestamp.
        timestamp: u64,
        /// Server time (ms).
        server_time: u64,
    },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown {
        /// Reason.
        reason: String,
    },
}

/// Authentication result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResult {
    /// Whether auth succeeded.
    pub success: bool,
    /// Ledger identity if successful.
    pub identity: Option<Identity>,
    /// Error message if failed.
    pub error: Option<String>,
    /// Server version.
    pub server_version: String,
}

/// Game record snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameUpdate {
    /// Record address.
    pub address: Address,
    /// Record fields.
    pub record: GameRecord,
    /// Events from the operation (empty for fetches).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<GameEvent>,
}

/// Server error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    /// Build from a code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Authentication failed.
    AuthFailed,
    /// Not authenticated.
    NotAuthenticated,
    /// JWT has expired.
    TokenExpired,
    /// Malformed message or field.
    InvalidInput,
    /// Wager zero or too large.
    InvalidWager,
    /// Move outside {0, 1, 2}.
    InvalidMove,
    /// All-zero commitment.
    EmptyCommitment,
    /// Joiner reused the creator's commitment.
    DuplicateCommitment,
    /// No game at that address.
    GameNotFound,
    /// Game exists for this creator and wager.
    GameExists,
    /// Game not open for joining.
    GameNotOpen,
    /// Creator joining own game.
    SelfJoin,
    /// Game not yet joined.
    GameNotCommitted,
    /// Game already finished.
    GameAlreadyEnded,
    /// Caller not a party.
    Unauthorized,
    /// Move already revealed.
    AlreadyRevealed,
    /// Reveal does not match commitment.
    InvalidReveal,
    /// Forfeit conditions not met.
    ForfeitUnavailable,
    /// Forfeit window still open.
    RevealWindowOpen,
    /// Forfeits disabled.
    ForfeitDisabled,
    /// Not enough balance.
    InsufficientFunds,
    /// Internal error.
    InternalError,
}

impl From<&EscrowError> for ErrorCode {
    fn from(err: &EscrowError) -> Self {
        match err {
            EscrowError::Game(game) => match game {
                GameError::InvalidWager => ErrorCode::InvalidWager,
                GameError::InvalidMove(_) => ErrorCode::InvalidMove,
                GameError::EmptyCommitment => ErrorCode::EmptyCommitment,
                GameError::DuplicateCommitment => ErrorCode::DuplicateCommitment,
                GameError::GameNotOpen => ErrorCode::GameNotOpen,
                GameError::SelfJoin => ErrorCode::SelfJoin,
                GameError::GameNotCommitted => ErrorCode::GameNotCommitted,
                GameError::GameAlreadyEnded => ErrorCode::GameAlreadyEnded,
                GameError::Unauthorized => ErrorCode::Unauthorized,
                GameError::AlreadyRevealed => ErrorCode::AlreadyRevealed,
                GameError::InvalidReveal => ErrorCode::InvalidReveal,
                GameError::ForfeitUnavailable => ErrorCode::ForfeitUnavailable,
                GameError::RevealWindowOpen { .. } => ErrorCode::RevealWindowOpen,
                GameError::ForfeitDisabled => ErrorCode::ForfeitDisabled,
                GameError::Overflow => ErrorCode::InternalError,
            },
            EscrowError::Ledger(ledger) => match ledger {
                LedgerError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
                LedgerError::AccountExists(_) => ErrorCode::GameExists,
                LedgerError::AccountNotFound(_) => ErrorCode::GameNotFound,
                LedgerError::InsufficientCustody { .. } | LedgerError::Overflow => ErrorCode::InternalError,
            },
            EscrowError::NotFound(_) => ErrorCode::GameNotFound,
            EscrowError::AddressMismatch(_)
            | EscrowError::CorruptRecord(_)
            | EscrowError::Encode(_)
            | EscrowError::CustodyInvariant { .. } => ErrorCode::InternalError,
        }
    }
}

impl From<&EscrowError> for ServerError {
    fn from(err: &EscrowError) -> Self {
        Self::new(ErrorCode::from(err), err.to_string())
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
