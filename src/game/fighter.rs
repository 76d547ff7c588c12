//! Fighter state machine
//!
//! A fighter owns its physics, action legality, animation cursor and
//! health. It is driven once per frame by [`Fighter::update`] with the
//! input derived from its player's pose, and is only ever touched from
//! outside through [`Fighter::take_hit`] and [`Fighter::clear_attack`]
//! by the match resolver.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};

use super::combat::{AttackStats, AttackType, CombatSystem, Facing, Rect, MAX_HEALTH};
use super::input::GameInput;
use super::physics::{Arena, PhysicsSystem, Vec2};
use super::sprite::{Animation, SpriteKind, SpriteSet};
use super::PlayerSlot;

/// Postures with an enter, hold and exit animation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldKind {
    Guard,
    CrouchGuard,
    Crouch,
}

impl HoldKind {
    pub fn sprite(&self) -> SpriteKind {
        match self {
            HoldKind::Guard => SpriteKind::Guard,
            HoldKind::CrouchGuard => SpriteKind::CrouchGuard,
            HoldKind::Crouch => SpriteKind::Crouch,
        }
    }

    /// Last frame of the enter animation, frozen while held
    fn hold_frame(&self) -> u32 {
        match self {
            HoldKind::Guard => 2,
            HoldKind::CrouchGuard => 3,
            HoldKind::Crouch => 4,
        }
    }

    /// Last frame of the exit animation
    fn exit_frame(&self) -> u32 {
        match self {
            HoldKind::Guard => 5,
            HoldKind::CrouchGuard => 7,
            HoldKind::Crouch => 9,
        }
    }

    fn guards(&self) -> bool {
        matches!(self, HoldKind::Guard | HoldKind::CrouchGuard)
    }

    fn crouches(&self) -> bool {
        matches!(self, HoldKind::CrouchGuard | HoldKind::Crouch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldPhase {
    Enter,
    Holding,
    Exit,
}

/// An in-progress hold-and-release action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HoldAction {
    pub kind: HoldKind,
    pub phase: HoldPhase,
}

/// Hold action in progress, as reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrentAction {
    None,
    Guard,
    CrouchGuard,
    Crouch,
}

/// What the input asks for this frame, in priority order
#[derive(Debug, Clone, Copy, PartialEq)]
enum Request {
    Hold(HoldKind),
    Attack(AttackType),
    Move { direction: f32 },
    Idle,
}

impl Request {
    fn from_input(input: &GameInput) -> Self {
        if input.guard {
            if input.crouch {
                Request::Hold(HoldKind::CrouchGuard)
            } else {
                Request::Hold(HoldKind::Guard)
            }
        } else if input.kick && input.crouch {
            Request::Attack(AttackType::CrouchKick)
        } else if input.attack && input.crouch {
            Request::Attack(AttackType::CrouchPunch)
        } else if input.kick {
            Request::Attack(AttackType::Kick)
        } else if input.attack {
            Request::Attack(AttackType::Punch)
        } else if input.crouch {
            Request::Hold(HoldKind::Crouch)
        } else if input.left != input.right {
            Request::Move {
                direction: if input.right { 1.0 } else { -1.0 },
            }
        } else {
            Request::Idle
        }
    }
}

/// One player's character
#[derive(Debug, Clone)]
pub struct Fighter {
    slot: PlayerSlot,
    facing: Facing,
    arena: Arena,
    sprites: Arc<SpriteSet>,

    position: Vec2,
    velocity: Vec2,
    height: f32,

    health: u32,
    is_attacking: bool,
    is_guarding: bool,
    is_crouching: bool,
    dead: bool,

    attack_type: Option<AttackType>,
    attack_box: Rect,
    hold: Option<HoldAction>,
    animation: Animation,
}

impl Fighter {
    /// Spawn on the ground at the slot's side of the arena, facing the
    /// opponent
    pub fn new(slot: PlayerSlot, sprites: Arc<SpriteSet>, arena: Arena) -> Self {
        let (x, facing) = match slot {
            PlayerSlot::Player1 => (arena.spawn_margin, Facing::Right),
            PlayerSlot::Player2 => (arena.max_x() - arena.spawn_margin, Facing::Left),
        };
        let position = Vec2::new(x, arena.ground_y());
        let animation = Animation::new(&sprites, SpriteKind::Idle);

        Self {
            slot,
            facing,
            arena,
            attack_box: AttackStats::IDLE.place(position.x, position.y, arena.body_width, facing),
            sprites,
            position,
            velocity: Vec2::default(),
            height: arena.body_height,
            health: MAX_HEALTH,
            is_attacking: false,
            is_guarding: false,
            is_crouching: false,
            dead: false,
            attack_type: None,
            hold: None,
            animation,
        }
    }

    /// Advance one frame
    pub fn update(&mut self, input: &GameInput) {
        if self.dead {
            return;
        }

        let (position, velocity) =
            PhysicsSystem::integrate(self.position, self.velocity, &self.arena);
        self.position = position;
        self.velocity = velocity;

        self.height = if self.is_crouching {
            self.arena.body_height * self.arena.crouch_factor
        } else {
            self.arena.body_height
        };

        self.refresh_attack_box();

        self.velocity.x = 0.0;
        if !self.is_dying() {
            self.resolve_action(input);
        }

        self.animate();
    }

    /// Register a hit from the opponent. Returns the damage dealt.
    pub fn take_hit(&mut self) -> u32 {
        if self.is_dying() {
            return 0;
        }

        let guarding = self.is_guarding;
        let damage = CombatSystem::damage(guarding);
        let (health, killed) = CombatSystem::apply_damage(self.health, damage);
        self.health = health;

        if killed {
            debug!(player = ?self.slot, "Fighter knocked out");
            self.interrupt();
            self.animation.restart(&self.sprites, SpriteKind::Death);
        } else if !guarding {
            self.interrupt();
            self.animation.restart(&self.sprites, SpriteKind::TakeHit);
        }

        trace!(player = ?self.slot, damage, health, guarding, "Fighter hit");
        damage
    }

    /// Close the attack's hit window, after a hit or a miss
    pub fn clear_attack(&mut self) {
        self.is_attacking = false;
    }

    fn resolve_action(&mut self, input: &GameInput) {
        // attacks and hit reactions cannot be interrupted by input
        let kind = self.animation.kind();
        if (kind.is_attack() || kind == SpriteKind::TakeHit) && !self.animation.is_last_frame() {
            return;
        }
        if self.is_attacking {
            return;
        }
        // hit window closed and the swing is over
        self.attack_type = None;

        let request = Request::from_input(input);

        if let Some(hold) = self.hold {
            match hold.phase {
                HoldPhase::Exit => return,
                _ if request == Request::Hold(hold.kind) => return,
                _ => {
                    self.release_hold(hold.kind);
                    return;
                }
            }
        }

        if input.jump && PhysicsSystem::is_on_ground(self.position, &self.arena) {
            self.velocity.y = self.arena.jump_velocity;
        }

        match request {
            Request::Hold(kind) => self.enter_hold(kind),
            Request::Attack(attack) => self.start_attack(attack),
            Request::Move { direction } => {
                self.velocity.x = direction * self.arena.move_speed;
                let sprite = if input.animation_name == "backward" {
                    SpriteKind::Backward
                } else {
                    SpriteKind::Forward
                };
                self.show_grounded(sprite);
            }
            Request::Idle => self.show_grounded(SpriteKind::Idle),
        }
    }

    /// Show `sprite`, or the jump/fall sprite while airborne
    fn show_grounded(&mut self, sprite: SpriteKind) {
        let sprite = if self.velocity.y < 0.0 {
            SpriteKind::Jump
        } else if self.velocity.y > 0.0 {
            SpriteKind::Fall
        } else {
            sprite
        };
        self.animation.switch(&self.sprites, sprite);
    }

    fn start_attack(&mut self, attack: AttackType) {
        trace!(player = ?self.slot, ?attack, "Attack started");
        self.is_attacking = true;
        self.attack_type = Some(attack);
        self.animation.restart(&self.sprites, attack.sprite());
    }

    fn enter_hold(&mut self, kind: HoldKind) {
        self.hold = Some(HoldAction {
            kind,
            phase: HoldPhase::Enter,
        });
        self.is_guarding = kind.guards();
        self.is_crouching = kind.crouches();
        self.animation.restart(&self.sprites, kind.sprite());
    }

    fn release_hold(&mut self, kind: HoldKind) {
        self.hold = Some(HoldAction {
            kind,
            phase: HoldPhase::Exit,
        });
        self.is_guarding = false;
        self.is_crouching = false;
        let frame = self.animation.frame_current().max(self.hold_frame(kind) + 1);
        self.animation.jump_to(frame.min(self.exit_frame(kind)));
    }

    /// Cancel any attack or hold in progress
    fn interrupt(&mut self) {
        self.is_attacking = false;
        self.attack_type = None;
        self.hold = None;
        self.is_guarding = false;
        self.is_crouching = false;
    }

    fn hold_frame(&self, kind: HoldKind) -> u32 {
        kind.hold_frame().min(self.animation.last_frame())
    }

    fn exit_frame(&self, kind: HoldKind) -> u32 {
        kind.exit_frame()
            .min(self.animation.last_frame())
            .max(self.hold_frame(kind))
    }

    fn animate(&mut self) {
        if self.animation.tick() {
            self.advance_frame();
        }

        if self.animation.kind() == SpriteKind::Death && self.animation.is_last_frame() {
            debug!(player = ?self.slot, "Fighter dead");
            self.dead = true;
        }
    }

    fn advance_frame(&mut self) {
        if let Some(mut hold) = self.hold {
            let frame = self.animation.frame_current();
            match hold.phase {
                HoldPhase::Enter => {
                    if frame < self.hold_frame(hold.kind) {
                        self.animation.step();
                    }
                    if self.animation.frame_current() >= self.hold_frame(hold.kind) {
                        hold.phase = HoldPhase::Holding;
                    }
                    self.hold = Some(hold);
                }
                HoldPhase::Holding => {}
                HoldPhase::Exit => {
                    if frame < self.exit_frame(hold.kind) {
                        self.animation.step();
                    } else {
                        self.hold = None;
                        self.animation.switch(&self.sprites, SpriteKind::Idle);
                    }
                }
            }
            return;
        }

        let kind = self.animation.kind();
        let last = self.animation.is_last_frame();
        match kind {
            SpriteKind::Death if last => {}
            _ if kind.is_attack() && last => {
                self.is_attacking = false;
                self.attack_type = None;
                self.animation.switch(&self.sprites, SpriteKind::Idle);
            }
            SpriteKind::TakeHit if last => {
                self.animation.switch(&self.sprites, SpriteKind::Idle);
            }
            _ => self.animation.step(),
        }
    }

    fn refresh_attack_box(&mut self) {
        let stats = self
            .attack_type
            .map(AttackStats::for_type)
            .unwrap_or(AttackStats::IDLE);
        self.attack_box = stats.place(
            self.position.x,
            self.position.y,
            self.arena.body_width,
            self.facing,
        );
    }

    /// Dying or dead: health is gone and the death animation owns the sprite
    pub fn is_dying(&self) -> bool {
        self.dead || self.animation.kind() == SpriteKind::Death
    }

    /// Attack whose hit window is open, if any
    pub fn active_attack(&self) -> Option<AttackType> {
        self.attack_type.filter(|_| self.is_attacking)
    }

    /// Body hitbox; crouching lowers its top, feet stay on the ground
    pub fn body_box(&self) -> Rect {
        Rect::new(
            self.position.x,
            self.position.y + (self.arena.body_height - self.height),
            self.arena.body_width,
            self.height,
        )
    }

    pub fn attack_box(&self) -> Rect {
        self.attack_box
    }

    pub fn current_action(&self) -> CurrentAction {
        match self.hold.map(|h| h.kind) {
            None => CurrentAction::None,
            Some(HoldKind::Guard) => CurrentAction::Guard,
            Some(HoldKind::CrouchGuard) => CurrentAction::CrouchGuard,
            Some(HoldKind::Crouch) => CurrentAction::Crouch,
        }
    }

    /// True while a guard-type posture is frozen on its hold frame
    pub fn is_guard_holding(&self) -> bool {
        self.hold
            .is_some_and(|h| h.phase == HoldPhase::Holding && h.kind.guards())
    }

    pub fn hold_action(&self) -> Option<HoldAction> {
        self.hold
    }

    pub fn slot(&self) -> PlayerSlot {
        self.slot
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn health(&self) -> u32 {
        self.health
    }

    pub fn is_attacking(&self) -> bool {
        self.is_attacking
    }

    pub fn attack_type(&self) -> Option<AttackType> {
        self.attack_type
    }

    pub fn is_guarding(&self) -> bool {
        self.is_guarding
    }

    pub fn is_crouching(&self) -> bool {
        self.is_crouching
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn animation(&self) -> &Animation {
        &self.animation
    }

    pub fn sprites(&self) -> &SpriteSet {
        &self.sprites
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::map_input;
    use crate::game::resolver::MatchResolver;
    use crate::game::sprite::FRAMES_HOLD;
    use crate::pose::PoseLabel;

    fn fighter() -> Fighter {
        Fighter::new(
            PlayerSlot::Player1,
            Arc::new(SpriteSet::samurai_mack()),
            Arena::default(),
        )
    }

    fn input(pose: PoseLabel) -> GameInput {
        map_input(pose, false)
    }

    /// Run until the cursor has moved `frames` sprite frames
    fn run_frames(f: &mut Fighter, pose: PoseLabel, frames: u32) {
        for _ in 0..frames * FRAMES_HOLD {
            f.update(&input(pose));
        }
    }

    #[test]
    fn test_spawns_idle_on_ground() {
        let f = fighter();
        assert_eq!(f.health(), 100);
        assert_eq!(f.animation().kind(), SpriteKind::Idle);
        assert_eq!(f.position().y, Arena::default().ground_y());
        assert_eq!(f.facing(), Facing::Right);
        assert_eq!(f.current_action(), CurrentAction::None);
    }

    #[test]
    fn test_player2_faces_left() {
        let f = Fighter::new(
            PlayerSlot::Player2,
            Arc::new(SpriteSet::kenji()),
            Arena::default(),
        );
        assert_eq!(f.facing(), Facing::Left);
        assert!(f.attack_box().x < f.position().x);
    }

    #[test]
    fn test_forward_moves_right() {
        let mut f = fighter();
        let x = f.position().x;
        f.update(&input(PoseLabel::Forward));
        assert_eq!(f.velocity().x, 5.0);
        assert_eq!(f.animation().kind(), SpriteKind::Forward);
        f.update(&input(PoseLabel::Forward));
        assert_eq!(f.position().x, x + 5.0);
    }

    #[test]
    fn test_player2_forward_moves_left() {
        let mut f = Fighter::new(
            PlayerSlot::Player2,
            Arc::new(SpriteSet::kenji()),
            Arena::default(),
        );
        f.update(&map_input(PoseLabel::Forward, true));
        assert_eq!(f.velocity().x, -5.0);
        assert_eq!(f.animation().kind(), SpriteKind::Forward);
    }

    #[test]
    fn test_jump_uses_airborne_sprite() {
        let mut f = fighter();
        let jump = GameInput {
            jump: true,
            ..GameInput::default()
        };
        f.update(&jump);
        assert_eq!(f.velocity().y, Arena::default().jump_velocity);
        assert_eq!(f.animation().kind(), SpriteKind::Jump);

        f.update(&GameInput::default());
        assert!(f.position().y < Arena::default().ground_y());
        assert_eq!(f.animation().kind(), SpriteKind::Jump);
    }

    #[test]
    fn test_punch_starts_attack() {
        let mut f = fighter();
        f.update(&input(PoseLabel::Punch));
        assert!(f.is_attacking());
        assert_eq!(f.attack_type(), Some(AttackType::Punch));
        assert_eq!(f.animation().kind(), SpriteKind::Punch);
        assert_eq!(f.velocity().x, 0.0);
    }

    #[test]
    fn test_attack_is_uninterruptible() {
        let mut f = fighter();
        f.update(&input(PoseLabel::Punch));
        for pose in [PoseLabel::Crouch, PoseLabel::Guard, PoseLabel::Forward] {
            for _ in 0..FRAMES_HOLD * 2 {
                f.update(&input(pose));
                assert_eq!(f.animation().kind(), SpriteKind::Punch);
                assert_eq!(f.current_action(), CurrentAction::None);
            }
        }
        assert!(f.is_attacking());
    }

    #[test]
    fn test_lock_holds_after_hit_window_closes() {
        let mut f = fighter();
        f.update(&input(PoseLabel::Punch));
        f.clear_attack();
        f.update(&input(PoseLabel::Guard));
        assert_eq!(f.animation().kind(), SpriteKind::Punch);
    }

    #[test]
    fn test_attack_ends_after_full_cycle() {
        let mut f = fighter();
        f.update(&input(PoseLabel::Punch));
        // 11 punch frames, each shown FRAMES_HOLD updates
        for _ in 0..11 * FRAMES_HOLD {
            f.update(&input(PoseLabel::Stand));
        }
        assert!(!f.is_attacking());
        assert_eq!(f.attack_type(), None);
        assert_eq!(f.animation().kind(), SpriteKind::Idle);
    }

    #[test]
    fn test_attack_box_resets_after_resolved_attack() {
        let mut f = fighter();
        let mut opponent = Fighter::new(
            PlayerSlot::Player2,
            Arc::new(SpriteSet::kenji()),
            Arena::default(),
        );
        let idle_box = f.attack_box();
        let mut resolver = MatchResolver::new();

        for (i, attack) in [PoseLabel::Kick, PoseLabel::CrouchKick].into_iter().enumerate() {
            f.update(&input(attack));
            assert!(f.attack_type().is_some());
            for _ in 0..150 {
                f.update(&input(PoseLabel::Stand));
                opponent.update(&map_input(PoseLabel::Stand, true));
                resolver.resolve_frame(&mut f, &mut opponent);
            }
            assert!(!f.is_attacking(), "attack {i} still open");
            assert_eq!(f.attack_type(), None);
            assert_eq!(f.animation().kind(), SpriteKind::Idle);
            assert_eq!(f.attack_box(), idle_box);
        }
    }

    #[test]
    fn test_attack_priority() {
        let mut f = fighter();
        f.update(&input(PoseLabel::CrouchKick));
        assert_eq!(f.attack_type(), Some(AttackType::CrouchKick));

        let mut f = fighter();
        f.update(&input(PoseLabel::CrouchPunch));
        assert_eq!(f.attack_type(), Some(AttackType::CrouchPunch));
        assert_eq!(f.current_action(), CurrentAction::None);
    }

    #[test]
    fn test_guard_enter_hold_release() {
        let mut f = fighter();
        f.update(&input(PoseLabel::Guard));
        assert_eq!(f.current_action(), CurrentAction::Guard);
        assert!(f.is_guarding());
        assert_eq!(f.animation().kind(), SpriteKind::Guard);

        // enter animation plays 0 -> 2 then freezes
        run_frames(&mut f, PoseLabel::Guard, 6);
        assert_eq!(f.animation().frame_current(), 2);
        assert!(f.is_guard_holding());

        // release plays 3 -> 5 then reverts to idle
        f.update(&input(PoseLabel::Stand));
        assert!(!f.is_guarding());
        assert_eq!(f.animation().frame_current(), 3);
        assert_eq!(
            f.hold_action().map(|h| h.phase),
            Some(HoldPhase::Exit)
        );

        run_frames(&mut f, PoseLabel::Stand, 2);
        assert_eq!(f.animation().frame_current(), 5);
        assert_eq!(f.current_action(), CurrentAction::Guard);

        run_frames(&mut f, PoseLabel::Stand, 1);
        assert_eq!(f.current_action(), CurrentAction::None);
        assert_eq!(f.animation().kind(), SpriteKind::Idle);
    }

    #[test]
    fn test_crouch_shrinks_body() {
        let mut f = fighter();
        let standing = f.body_box();
        f.update(&input(PoseLabel::Crouch));
        assert!(f.is_crouching());
        f.update(&input(PoseLabel::Crouch));
        let crouched = f.body_box();
        assert!((crouched.height - standing.height * 0.6).abs() < 1e-4);
        let feet = |r: Rect| r.y + r.height;
        assert!((feet(crouched) - feet(standing)).abs() < 1e-4);
        // ground contact unaffected
        assert_eq!(f.position().y, Arena::default().ground_y());
    }

    #[test]
    fn test_crouch_holds_on_frame_four() {
        let mut f = fighter();
        run_frames(&mut f, PoseLabel::Crouch, 8);
        assert_eq!(f.animation().frame_current(), 4);
        assert_eq!(f.current_action(), CurrentAction::Crouch);
    }

    #[test]
    fn test_crouch_guard_holds_on_frame_three() {
        let mut f = fighter();
        run_frames(&mut f, PoseLabel::CrouchGuard, 8);
        assert_eq!(f.animation().frame_current(), 3);
        assert!(f.is_guarding() && f.is_crouching());
        assert!(f.is_guard_holding());
    }

    #[test]
    fn test_switching_hold_kind_exits_first() {
        let mut f = fighter();
        run_frames(&mut f, PoseLabel::Guard, 4);
        f.update(&input(PoseLabel::Crouch));
        assert_eq!(f.current_action(), CurrentAction::Guard);
        assert!(!f.is_guarding());
        run_frames(&mut f, PoseLabel::Crouch, 4);
        assert_eq!(f.current_action(), CurrentAction::Crouch);
    }

    #[test]
    fn test_take_hit_while_guarding_halves_damage() {
        let mut f = fighter();
        f.update(&input(PoseLabel::Guard));
        assert!(f.is_guarding());
        assert_eq!(f.take_hit(), 10);
        assert_eq!(f.health(), 90);
        // no stagger while blocking
        assert_eq!(f.animation().kind(), SpriteKind::Guard);
    }

    #[test]
    fn test_take_hit_staggers() {
        let mut f = fighter();
        assert_eq!(f.take_hit(), 20);
        assert_eq!(f.health(), 80);
        assert_eq!(f.animation().kind(), SpriteKind::TakeHit);

        // hit reaction locks out new actions
        f.update(&input(PoseLabel::Punch));
        assert!(!f.is_attacking());
        assert_eq!(f.animation().kind(), SpriteKind::TakeHit);
    }

    #[test]
    fn test_take_hit_cancels_attack() {
        let mut f = fighter();
        f.update(&input(PoseLabel::Kick));
        f.take_hit();
        assert!(!f.is_attacking());
        assert_eq!(f.active_attack(), None);
        assert_eq!(f.animation().kind(), SpriteKind::TakeHit);
    }

    #[test]
    fn test_lethal_hit_and_death_latch() {
        let mut f = fighter();
        for _ in 0..4 {
            f.take_hit();
        }
        assert_eq!(f.health(), 20);
        // health 15 scenario: saturates at zero
        f.health = 15;
        f.take_hit();
        assert_eq!(f.health(), 0);
        assert_eq!(f.animation().kind(), SpriteKind::Death);
        assert!(!f.is_dead());

        // 13 death frames; not dead until the last one is reached
        for _ in 0..12 * FRAMES_HOLD - 1 {
            f.update(&input(PoseLabel::Punch));
            assert!(!f.is_dead());
            assert!(!f.is_attacking());
        }
        f.update(&input(PoseLabel::Stand));
        assert!(f.is_dead());
        assert_eq!(f.animation().frame_current(), 12);

        let frozen = (f.position(), f.animation().clone());
        for _ in 0..50 {
            f.update(&input(PoseLabel::Forward));
        }
        assert_eq!((f.position(), f.animation().clone()), frozen);
        assert_eq!(f.take_hit(), 0);
        assert_eq!(f.health(), 0);
    }

    #[test]
    fn test_active_attack_tracks_hit_window() {
        let mut f = fighter();
        assert_eq!(f.active_attack(), None);
        f.update(&input(PoseLabel::Punch));
        assert_eq!(f.active_attack(), Some(AttackType::Punch));
        f.clear_attack();
        assert_eq!(f.active_attack(), None);
    }
}
