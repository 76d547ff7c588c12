//! Game simulation modules

pub mod combat;
pub mod fighter;
pub mod input;
pub mod r#match;
pub mod physics;
pub mod resolver;
pub mod snapshot;
pub mod sprite;

pub use r#match::{MatchContext, MatchHandle, MatchRegistry};

use serde::{Deserialize, Serialize};

use crate::ws::protocol::ClientMsg;

/// One of the two sides of a duel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerSlot {
    Player1,
    Player2,
}

impl PlayerSlot {
    pub const ALL: [PlayerSlot; 2] = [PlayerSlot::Player1, PlayerSlot::Player2];

    pub fn index(&self) -> usize {
        match self {
            PlayerSlot::Player1 => 0,
            PlayerSlot::Player2 => 1,
        }
    }

    /// Player 2 is mirrored
    pub fn is_player2(&self) -> bool {
        *self == PlayerSlot::Player2
    }

    pub fn opponent(&self) -> PlayerSlot {
        match self {
            PlayerSlot::Player1 => PlayerSlot::Player2,
            PlayerSlot::Player2 => PlayerSlot::Player1,
        }
    }
}

/// What a connection did
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    Joined,
    Message(ClientMsg),
    Left,
}

/// Player input forwarded from a WebSocket session to its match
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub player: PlayerSlot,
    pub event: PlayerEvent,
    pub received_at: u64,
}
