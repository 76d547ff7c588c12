//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::combat::{AttackType, Facing, HitResult, Rect};
use crate::game::fighter::{CurrentAction, HoldPhase};
use crate::game::physics::Vec2;
use crate::game::r#match::MatchPhase;
use crate::game::resolver::MatchWinner;
use crate::game::sprite::SpriteKind;
use crate::game::PlayerSlot;
use crate::pose::{ClassifierKind, Landmark, PoseLabel};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Pose classified by the client's own detector
    Pose {
        /// Label string, unknown values are read as STAND
        pose: String,
    },

    /// Raw skeleton to classify server side
    Landmarks {
        landmarks: Vec<Option<Landmark>>,
        #[serde(default)]
        classifier: ClassifierKind,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave current match
    LeaveMatch,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after a slot was claimed
    Welcome {
        player: PlayerSlot,
        match_id: Uuid,
        server_time: u64,
    },

    PlayerJoined {
        player: PlayerSlot,
    },

    PlayerLeft {
        player: PlayerSlot,
        reason: String,
    },

    /// Match countdown running
    MatchCountdown {
        seconds_remaining: u32,
    },

    /// Match has started
    MatchStarted {
        tick: u64,
    },

    /// Render state (sent at the snapshot rate)
    Snapshot {
        /// Server tick number
        tick: u64,
        phase: MatchPhase,
        fighters: Vec<FighterSnapshot>,
    },

    /// An attack connected
    Hit {
        attacker: PlayerSlot,
        defender: PlayerSlot,
        #[serde(flatten)]
        result: HitResult,
    },

    /// A fighter's health bar changed
    HealthChanged {
        player: PlayerSlot,
        health_percent: u32,
    },

    /// Match has been decided
    MatchEnd {
        winner: MatchWinner,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMsg::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Everything a renderer needs to draw one fighter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FighterSnapshot {
    pub player: PlayerSlot,
    pub connected: bool,
    /// Latest pose driving this fighter
    pub pose: PoseLabel,

    /// Sprite set name
    pub sprite_set: String,
    /// Logical animation
    pub sprite: SpriteKind,
    /// Sheet actually drawn after fallbacks
    pub sheet: SpriteKind,
    pub image: String,
    pub frame_current: u32,
    pub frames_max: u32,

    pub position: Vec2,
    pub velocity: Vec2,
    pub facing: Facing,
    pub body_box: Rect,
    pub attack_box: Rect,

    /// Health (0-100)
    pub health: u32,
    pub is_attacking: bool,
    pub is_guarding: bool,
    pub is_crouching: bool,
    pub dead: bool,
    /// Attack being thrown, until its animation ends
    pub attack_type: Option<AttackType>,
    pub current_action: CurrentAction,
    pub hold_phase: Option<HoldPhase>,
    /// Guard posture frozen on its hold frame
    pub is_guard_holding: bool,
}
