//! Per-frame hit detection between the two fighters

use serde::Serialize;
use tracing::{debug, info};

use super::combat::{AttackType, CombatSystem, HitResult};
use super::fighter::Fighter;
use super::PlayerSlot;

/// Outcome of a finished match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchWinner {
    Player1,
    Player2,
    Draw,
}

impl From<PlayerSlot> for MatchWinner {
    fn from(slot: PlayerSlot) -> Self {
        match slot {
            PlayerSlot::Player1 => MatchWinner::Player1,
            PlayerSlot::Player2 => MatchWinner::Player2,
        }
    }
}

/// Something the resolver did this frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MatchEvent {
    Hit {
        attacker: PlayerSlot,
        defender: PlayerSlot,
        #[serde(flatten)]
        result: HitResult,
    },
    HealthChanged {
        player: PlayerSlot,
        health_percent: u32,
    },
    Ended {
        winner: MatchWinner,
    },
}

/// A strike that will land this frame
struct Strike {
    attacker: PlayerSlot,
    attack: AttackType,
    connects: bool,
}

/// Applies cross-fighter effects once both fighters have updated
#[derive(Debug, Default)]
pub struct MatchResolver {
    winner: Option<MatchWinner>,
}

impl MatchResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run hit detection for one frame.
    ///
    /// Both directions are evaluated before either is applied, so two
    /// attacks landing on the same frame trade.
    pub fn resolve_frame(&mut self, p1: &mut Fighter, p2: &mut Fighter) -> Vec<MatchEvent> {
        let mut events = Vec::new();
        if self.winner.is_some() {
            return events;
        }

        let strikes: Vec<Strike> = [Self::check(p1, p2), Self::check(p2, p1)]
            .into_iter()
            .flatten()
            .collect();

        for strike in strikes {
            let (attacker, defender) = match strike.attacker {
                PlayerSlot::Player1 => (&mut *p1, &mut *p2),
                PlayerSlot::Player2 => (&mut *p2, &mut *p1),
            };
            let attack = strike.attack;
            attacker.clear_attack();

            if !strike.connects {
                continue;
            }

            let guarded = defender.is_guarding();
            let damage = defender.take_hit();
            let result = HitResult {
                attack,
                damage,
                guarded,
                defender_health: defender.health(),
                defender_killed: defender.health() == 0,
            };
            debug!(
                attacker = ?attacker.slot(),
                defender = ?defender.slot(),
                ?attack,
                damage,
                guarded,
                "Hit landed"
            );

            events.push(MatchEvent::Hit {
                attacker: attacker.slot(),
                defender: defender.slot(),
                result,
            });
            events.push(MatchEvent::HealthChanged {
                player: defender.slot(),
                health_percent: CombatSystem::health_percent(defender.health()),
            });
        }

        if let Some(winner) = Self::decide(p1, p2) {
            info!(?winner, "Match decided");
            self.winner = Some(winner);
            events.push(MatchEvent::Ended { winner });
        }

        events
    }

    /// Strike check for one direction: `None` unless the attacker is on
    /// its active frame this tick
    fn check(attacker: &Fighter, defender: &Fighter) -> Option<Strike> {
        let attack = attacker.active_attack()?;
        if attacker.animation().frame_current() != attack.active_frame() {
            return None;
        }
        Some(Strike {
            attacker: attacker.slot(),
            attack,
            connects: attacker.attack_box().overlaps(&defender.body_box()),
        })
    }

    fn decide(p1: &Fighter, p2: &Fighter) -> Option<MatchWinner> {
        match (p1.health() > 0, p2.health() > 0) {
            (true, true) => None,
            (true, false) => Some(p1.slot().into()),
            (false, true) => Some(p2.slot().into()),
            (false, false) => Some(MatchWinner::Draw),
        }
    }

    pub fn winner(&self) -> Option<MatchWinner> {
        self.winner
    }
}
