//! Network Layer
//!
//! WebSocket service in front of the escrow. Nothing here decides game
//! outcomes; every request is forwarded to the `ledger` adapter.

pub mod auth;
pub mod protocol;
pub mod server;

pub use auth::{validate_token, AuthConfig, AuthError, TokenClaims};
pub use protocol::{ClientMessage, ErrorCode, GameUpdate, ServerError, ServerMessage};
pub use server::{GameServer, GameServerError, ServerConfig, Session};
