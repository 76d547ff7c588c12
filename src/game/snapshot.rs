//! Snapshot building

use crate::ws::protocol::{FighterSnapshot, ServerMsg};

use super::combat::CombatSystem;
use super::fighter::Fighter;
use super::{MatchContext, PlayerSlot};

/// Builds render snapshots for network transmission
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for important events)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a snapshot message
    pub fn build(&self, ctx: &MatchContext) -> ServerMsg {
        let fighters = PlayerSlot::ALL
            .into_iter()
            .map(|player| Self::fighter(ctx, ctx.fighter(player)))
            .collect();

        ServerMsg::Snapshot {
            tick: ctx.tick_count(),
            phase: ctx.phase(),
            fighters,
        }
    }

    fn fighter(ctx: &MatchContext, f: &Fighter) -> FighterSnapshot {
        let animation = f.animation();
        let (_, data) = f.sprites().resolve(animation.kind());

        FighterSnapshot {
            player: f.slot(),
            connected: ctx.is_connected(f.slot()),
            pose: ctx.pose(f.slot()),
            sprite_set: f.sprites().name().to_string(),
            sprite: animation.kind(),
            sheet: animation.sheet(),
            image: data.image.clone(),
            frame_current: animation.frame_current(),
            frames_max: animation.frames_max(),
            position: f.position(),
            velocity: f.velocity(),
            facing: f.facing(),
            body_box: f.body_box(),
            attack_box: f.attack_box(),
            health: CombatSystem::health_percent(f.health()),
            is_attacking: f.is_attacking(),
            is_guarding: f.is_guarding(),
            is_crouching: f.is_crouching(),
            dead: f.is_dead(),
            attack_type: f.attack_type(),
            current_action: f.current_action(),
            hold_phase: f.hold_action().map(|h| h.phase),
            is_guard_holding: f.is_guard_holding(),
        }
    }
}
