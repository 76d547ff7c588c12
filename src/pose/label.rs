//! Discrete pose labels exchanged between detector and game core

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One recognized body pose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoseLabel {
    #[default]
    Stand,
    Punch,
    Kick,
    Guard,
    Crouch,
    Forward,
    Backward,
    CrouchPunch,
    CrouchKick,
    CrouchGuard,
    Idle,
}

impl PoseLabel {
    pub const ALL: [PoseLabel; 11] = [
        PoseLabel::Stand,
        PoseLabel::Punch,
        PoseLabel::Kick,
        PoseLabel::Guard,
        PoseLabel::Crouch,
        PoseLabel::Forward,
        PoseLabel::Backward,
        PoseLabel::CrouchPunch,
        PoseLabel::CrouchKick,
        PoseLabel::CrouchGuard,
        PoseLabel::Idle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PoseLabel::Stand => "STAND",
            PoseLabel::Punch => "PUNCH",
            PoseLabel::Kick => "KICK",
            PoseLabel::Guard => "GUARD",
            PoseLabel::Crouch => "CROUCH",
            PoseLabel::Forward => "FORWARD",
            PoseLabel::Backward => "BACKWARD",
            PoseLabel::CrouchPunch => "CROUCH_PUNCH",
            PoseLabel::CrouchKick => "CROUCH_KICK",
            PoseLabel::CrouchGuard => "CROUCH_GUARD",
            PoseLabel::Idle => "IDLE",
        }
    }

    /// Lenient parse for labels arriving from a detector.
    ///
    /// Unknown strings become `Stand` so version skew between detector
    /// and server never stalls a match.
    pub fn from_wire(raw: &str) -> Self {
        match raw.parse() {
            Ok(label) => label,
            Err(e) => {
                tracing::debug!(error = %e, "Unknown pose label, defaulting to STAND");
                PoseLabel::Stand
            }
        }
    }
}

impl fmt::Display for PoseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown pose label: {0:?}")]
pub struct UnknownPoseLabel(pub String);

impl FromStr for PoseLabel {
    type Err = UnknownPoseLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        PoseLabel::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownPoseLabel(s.to_string()))
    }
}
