//! Combat system - attack geometry, active frames, damage, hit detection

use serde::Serialize;

use super::sprite::SpriteKind;

/// Health every fighter starts with
pub const MAX_HEALTH: u32 = 100;
/// Damage of a clean hit
pub const BASE_DAMAGE: u32 = 20;
/// Damage of a hit taken while guarding
pub const GUARD_DAMAGE: u32 = BASE_DAMAGE / 2;

/// Axis-aligned rectangle in arena pixels (top-left origin)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Edge contact counts as overlap
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x + self.width >= other.x
            && self.x <= other.x + other.width
            && self.y + self.height >= other.y
            && self.y <= other.y + other.height
    }
}

/// Which way a fighter faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Right,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackType {
    Punch,
    Kick,
    CrouchPunch,
    CrouchKick,
}

/// Attack box and timing for one attack type.
///
/// Offsets are measured from the body's leading edge when facing right
/// and mirrored when facing left.
#[derive(Debug, Clone, Copy)]
pub struct AttackStats {
    pub offset_x: f32,
    pub offset_y: f32,
    pub width: f32,
    pub height: f32,
    /// Only frame on which the attack can connect
    pub active_frame: u32,
}

impl AttackStats {
    /// Box carried while not attacking
    pub const IDLE: AttackStats = AttackStats {
        offset_x: 100.0,
        offset_y: 50.0,
        width: 160.0,
        height: 50.0,
        active_frame: 0,
    };

    pub fn for_type(attack: AttackType) -> Self {
        match attack {
            AttackType::Punch => Self {
                offset_x: 100.0,
                offset_y: 50.0,
                width: 160.0,
                height: 50.0,
                active_frame: 4,
            },
            AttackType::Kick => Self {
                offset_x: 100.0,
                offset_y: 80.0,
                width: 170.0,
                height: 50.0,
                active_frame: 2,
            },
            AttackType::CrouchPunch => Self {
                offset_x: 100.0,
                offset_y: 85.0,
                width: 150.0,
                height: 40.0,
                active_frame: 4,
            },
            AttackType::CrouchKick => Self {
                offset_x: 90.0,
                offset_y: 115.0,
                width: 180.0,
                height: 35.0,
                active_frame: 2,
            },
        }
    }

    /// Place this box relative to a body at `(x, y)` of `body_width`
    pub fn place(&self, x: f32, y: f32, body_width: f32, facing: Facing) -> Rect {
        let box_x = match facing {
            Facing::Right => x + self.offset_x,
            Facing::Left => x + body_width - self.offset_x - self.width,
        };
        Rect::new(box_x, y + self.offset_y, self.width, self.height)
    }
}

impl AttackType {
    pub fn sprite(&self) -> SpriteKind {
        match self {
            AttackType::Punch => SpriteKind::Punch,
            AttackType::Kick => SpriteKind::Kick,
            AttackType::CrouchPunch => SpriteKind::CrouchPunch,
            AttackType::CrouchKick => SpriteKind::CrouchKick,
        }
    }

    pub fn active_frame(&self) -> u32 {
        AttackStats::for_type(*self).active_frame
    }
}

/// Combat rules shared by fighters and the match resolver
pub struct CombatSystem;

impl CombatSystem {
    /// Damage of one hit given the defender's guard state
    pub fn damage(guarding: bool) -> u32 {
        if guarding {
            GUARD_DAMAGE
        } else {
            BASE_DAMAGE
        }
    }

    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_health: u32, damage: u32) -> (u32, bool) {
        let new_health = current_health.saturating_sub(damage);
        (new_health, new_health == 0)
    }

    pub fn health_percent(health: u32) -> u32 {
        health.min(MAX_HEALTH) * 100 / MAX_HEALTH
    }
}

/// Hit result from combat resolution
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HitResult {
    pub attack: AttackType,
    pub damage: u32,
    pub guarded: bool,
    pub defender_health: u32,
    pub defender_killed: bool,
}
