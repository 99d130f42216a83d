//! Game Events
//!
//! Emitted by each successful transition, for logging and for clients.

use serde::{Deserialize, Serialize};

use crate::core::identity::Identity;
use crate::game::moves::{Move, Outcome};
use crate::game::record::Side;

/// Something that happened to a game record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    /// Match opened and creator's stake escrowed.
    Created {
        creator: Identity,
        wager: u64,
    },

    /// Opponent joined and escrowed their stake.
    Joined {
        opponent: Identity,
    },

    /// One side revealed a verified move.
    Revealed {
        side: Side,
        #[serde(rename = "move")]
        mv: Move,
    },

    /// Both moves known; pot disbursed.
    Resolved {
        outcome: Outcome,
        winner: Option<Identity>,
        winner_share: u64,
        house_fee: u64,
    },

    /// Only one side revealed before the window closed; the revealer takes the pot.
    Forfeited {
        winner: Identity,
        winner_share: u64,
        house_fee: u64,
    },
}

impl GameEvent {
    /// Short name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::Created { .. } => "created",
            GameEvent::Joined { .. } => "joined",
            GameEvent::Revealed { .. } => "revealed",
            GameEvent::Resolved { .. } => "resolved",
            GameEvent::Forfeited { .. } => "forfeited",
        }
    }

    /// Whether this event finishes the match.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GameEvent::Resolved { .. } | GameEvent::Forfeited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_tag() {
        let event = GameEvent::Revealed {
            side: Side::Opponent,
            mv: Move::Scissors,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"revealed\""));
        assert!(json.contains("\"side\":\"opponent\""));
        assert!(json.contains("\"move\":\"Scissors\""));
    }

    #[test]
    fn test_terminal_events() {
        let resolved = GameEvent::Resolved {
            outcome: Outcome::Tie,
            winner: None,
            winner_share: 0,
            house_fee: 0,
        };
        assert!(resolved.is_terminal());
        assert!(!GameEvent::Joined { opponent: Identity::new([1; 32]) }.is_terminal());
        assert_eq!(resolved.name(), "resolved");
    }
}
