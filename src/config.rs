//! Environment Configuration
//!
//! | Variable | Default |
//! |---|---|
//! | `RPS_BIND_ADDR` | `0.0.0.0:8080` |
//! | `RPS_MAX_CONNECTIONS` | `1000` |
//! | `RPS_IDLE_TIMEOUT_SECS` | `300` |
//! | `RPS_HOUSE_IDENTITY` | all-zero identity |
//! | `RPS_REVEAL_TIMEOUT_SECS` | `86400` (`0` disables forfeits) |
//! | `RPS_STARTING_BALANCE` | `0` |
//! | `AUTH_*` | see [`AuthConfig::from_env`] |

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::core::identity::Identity;
use crate::game::coordinator::CoordinatorConfig;
use crate::network::auth::AuthConfig;
use crate::network::server::ServerConfig;

/// Invalid environment value.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Variable present but unparsable.
    #[error("invalid value for {var}: {reason}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Parse failure.
        reason: String,
    },
}

/// Everything the server binary needs.
#[derive(Clone, Debug, Default)]
pub struct EscrowConfig {
    /// Network settings.
    pub server: ServerConfig,
    /// Token validation.
    pub auth: AuthConfig,
    /// Game rules.
    pub coordinator: CoordinatorConfig,
}

impl EscrowConfig {
    /// Build from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut server = ServerConfig::default();
        if let Some(addr) = parse_var::<SocketAddr>("RPS_BIND_ADDR")? {
            server.bind_addr = addr;
        }
        if let Some(max) = parse_var::<usize>("RPS_MAX_CONNECTIONS")? {
            server.max_connections = max;
        }
        if let Some(secs) = parse_var::<u64>("RPS_IDLE_TIMEOUT_SECS")? {
            server.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(balance) = parse_var::<u64>("RPS_STARTING_BALANCE")? {
            server.starting_balance = balance;
        }

        let mut coordinator = CoordinatorConfig::default();
        if let Ok(hex) = std::env::var("RPS_HOUSE_IDENTITY") {
            coordinator.house = Identity::from_hex(&hex).map_err(|e| ConfigError::Invalid {
                var: "RPS_HOUSE_IDENTITY",
                reason: e.to_string(),
            })?;
        }
        if let Some(secs) = parse_var::<u64>("RPS_REVEAL_TIMEOUT_SECS")? {
            coordinator.reveal_timeout_secs = (secs > 0).then_some(secs);
        }

        Ok(Self {
            server,
            auth: AuthConfig::from_env(),
            coordinator,
        })
    }
}

fn parse_var<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid { var, reason: e.to_string() }),
        Err(_) => Ok(None),
    }
}
