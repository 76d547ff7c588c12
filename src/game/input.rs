//! Pose label → game input intent

use serde::Serialize;

use crate::pose::PoseLabel;

/// Per-frame input intent, recomputed from the current pose every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GameInput {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub attack: bool,
    pub kick: bool,
    pub guard: bool,
    pub crouch: bool,
    pub animation_name: &'static str,
}

impl Default for GameInput {
    fn default() -> Self {
        Self {
            left: false,
            right: false,
            jump: false,
            attack: false,
            kick: false,
            guard: false,
            crouch: false,
            animation_name: "stand",
        }
    }
}

/// Map a pose to an input intent.
///
/// Player 2 faces the other way, so its FORWARD/BACKWARD produce the
/// opposite horizontal direction. Everything else is symmetric.
pub fn map_input(pose: PoseLabel, is_player2: bool) -> GameInput {
    let neutral = GameInput::default();
    match pose {
        PoseLabel::CrouchPunch => GameInput {
            attack: true,
            crouch: true,
            animation_name: "crouch_punch",
            ..neutral
        },
        PoseLabel::CrouchKick => GameInput {
            kick: true,
            crouch: true,
            animation_name: "crouch_kick",
            ..neutral
        },
        PoseLabel::Punch => GameInput {
            attack: true,
            animation_name: "punch",
            ..neutral
        },
        PoseLabel::Kick => GameInput {
            kick: true,
            animation_name: "kick",
            ..neutral
        },
        PoseLabel::CrouchGuard => GameInput {
            guard: true,
            crouch: true,
            animation_name: "crouch_guard",
            ..neutral
        },
        PoseLabel::Guard => GameInput {
            guard: true,
            animation_name: "guard",
            ..neutral
        },
        PoseLabel::Crouch => GameInput {
            crouch: true,
            animation_name: "crouch",
            ..neutral
        },
        PoseLabel::Forward => GameInput {
            left: is_player2,
            right: !is_player2,
            animation_name: "forward",
            ..neutral
        },
        PoseLabel::Backward => GameInput {
            left: !is_player2,
            right: is_player2,
            animation_name: "backward",
            ..neutral
        },
        PoseLabel::Stand | PoseLabel::Idle => neutral,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stand_is_neutral() {
        let input = map_input(PoseLabel::Stand, false);
        assert_eq!(input, GameInput::default());
        assert_eq!(input.animation_name, "stand");
        assert_eq!(map_input(PoseLabel::Idle, true), GameInput::default());
    }

    #[test]
    fn test_unknown_wire_label_maps_to_stand() {
        let input = map_input(PoseLabel::from_wire("MOONWALK"), false);
        assert_eq!(input, GameInput::default());
    }

    #[test]
    fn test_forward_backward_mirror_for_player2() {
        let p1 = map_input(PoseLabel::Forward, false);
        assert!(p1.right && !p1.left);
        let p2 = map_input(PoseLabel::Forward, true);
        assert!(p2.left && !p2.right);

        let p1 = map_input(PoseLabel::Backward, false);
        assert!(p1.left && !p1.right);
        let p2 = map_input(PoseLabel::Backward, true);
        assert!(p2.right && !p2.left);
        assert_eq!(p2.animation_name, "backward");
    }

    #[test]
    fn test_actions_are_symmetric() {
        for pose in PoseLabel::ALL {
            if matches!(pose, PoseLabel::Forward | PoseLabel::Backward) {
                continue;
            }
            assert_eq!(map_input(pose, false), map_input(pose, true), "{pose}");
        }
    }

    #[test]
    fn test_crouch_variants_set_both_flags() {
        let input = map_input(PoseLabel::CrouchKick, false);
        assert!(input.kick && input.crouch && !input.attack);
        let input = map_input(PoseLabel::CrouchGuard, false);
        assert!(input.guard && input.crouch);
        assert_eq!(input.animation_name, "crouch_guard");
    }
}
