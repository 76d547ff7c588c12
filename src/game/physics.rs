//! Fighter physics: gravity, ground contact, arena bounds

use serde::Serialize;

/// 2D vector in arena pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

/// Arena and body constants shared by both fighters
#[derive(Debug, Clone, Copy)]
pub struct Arena {
    /// Arena width
    pub width: f32,
    /// Y of the floor line fighters stand on
    pub floor_y: f32,
    /// Downward acceleration per frame
    pub gravity: f32,
    /// Nominal body hitbox width
    pub body_width: f32,
    /// Nominal (standing) body hitbox height
    pub body_height: f32,
    /// Height multiplier while crouching
    pub crouch_factor: f32,
    /// Horizontal speed while moving
    pub move_speed: f32,
    /// Initial vertical velocity of a jump
    pub jump_velocity: f32,
    /// Distance of each spawn point from its arena edge
    pub spawn_margin: f32,
}

impl Default for Arena {
    fn default() -> Self {
        Self {
            width: 1024.0,
            floor_y: 480.0,
            gravity: 0.7,
            body_width: 50.0,
            body_height: 150.0,
            crouch_factor: 0.6,
            move_speed: 5.0,
            jump_velocity: -20.0,
            spawn_margin: 200.0,
        }
    }
}

impl Arena {
    /// Top-left y of a standing body resting on the floor
    pub fn ground_y(&self) -> f32 {
        self.floor_y - self.body_height
    }

    pub fn max_x(&self) -> f32 {
        self.width - self.body_width
    }
}

/// Physics system for updating fighter positions and velocities
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Integrate one frame. Returns (new_position, new_velocity).
    ///
    /// Ground contact uses the standing height so a crouch never lifts
    /// the fighter off the floor.
    pub fn integrate(position: Vec2, velocity: Vec2, arena: &Arena) -> (Vec2, Vec2) {
        let mut position = position + velocity;
        let mut velocity = velocity;

        if position.y + arena.body_height + velocity.y >= arena.floor_y {
            velocity.y = 0.0;
            position.y = arena.ground_y();
        } else {
            velocity.y += arena.gravity;
        }

        position.x = Self::clamp_x(position.x, arena);
        (position, velocity)
    }

    /// Keep a body fully inside the arena horizontally
    pub fn clamp_x(x: f32, arena: &Arena) -> f32 {
        x.clamp(0.0, arena.max_x())
    }

    pub fn is_on_ground(position: Vec2, arena: &Arena) -> bool {
        position.y >= arena.ground_y() - 0.001
    }
}
