//! Match state and authoritative tick loop

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::pose::{ClassifierKind, Landmark, PoseLabel, PoseSmoother};
use crate::util::time::{unix_millis, SIMULATION_TPS, SNAPSHOT_TPS};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::fighter::Fighter;
use super::input::map_input;
use super::physics::Arena;
use super::resolver::{MatchEvent, MatchResolver, MatchWinner};
use super::snapshot::SnapshotBuilder;
use super::sprite::SpriteSet;
use super::{PlayerEvent, PlayerInput, PlayerSlot};

/// Seconds of countdown once both players are in
pub const COUNTDOWN_SECS: u32 = 3;
/// Seconds the simulation keeps running after the match is decided
pub const END_GRACE_SECS: u32 = 3;
/// Seconds an unjoined match is kept before it is dropped
pub const EMPTY_MATCH_TIMEOUT_SECS: u32 = 60;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Waiting for both players
    Waiting,
    /// Countdown before start
    Countdown,
    /// Match in progress
    InProgress,
    /// Match ended
    Ended,
}

/// Everything one duel owns: both fighters, their pose inputs and the
/// resolver. Advanced one frame at a time by [`MatchContext::tick`].
pub struct MatchContext {
    id: Uuid,
    phase: MatchPhase,
    tick: u64,
    fighters: [Fighter; 2],
    /// Latest pose per player, overwritten by newer ones
    poses: [PoseLabel; 2],
    smoothers: [PoseSmoother; 2],
    smoothing_streak: u32,
    connected: [bool; 2],
    resolver: MatchResolver,
    countdown_ticks: u32,
    grace_ticks: Option<u32>,
    /// Winner by default when a player walks out mid-match
    forfeit: Option<MatchWinner>,
}

impl MatchContext {
    pub fn new(id: Uuid, smoothing_streak: u32) -> Self {
        let arena = Arena::default();
        Self {
            id,
            phase: MatchPhase::Waiting,
            tick: 0,
            fighters: [
                Fighter::new(
                    PlayerSlot::Player1,
                    Arc::new(SpriteSet::samurai_mack()),
                    arena,
                ),
                Fighter::new(PlayerSlot::Player2, Arc::new(SpriteSet::kenji()), arena),
            ],
            poses: [PoseLabel::Idle; 2],
            smoothers: [
                PoseSmoother::new(smoothing_streak),
                PoseSmoother::new(smoothing_streak),
            ],
            smoothing_streak,
            connected: [false; 2],
            resolver: MatchResolver::new(),
            countdown_ticks: 0,
            grace_ticks: None,
            forfeit: None,
        }
    }

    /// Store a player's latest pose; it drives that fighter from the next tick
    pub fn set_pose(&mut self, player: PlayerSlot, pose: PoseLabel) {
        let slot = &mut self.poses[player.index()];
        if *slot != pose {
            trace!(match_id = %self.id, ?player, %pose, "Pose changed");
        }
        *slot = pose;
    }

    /// Classify a raw skeleton, smooth it and store the stable pose
    pub fn push_landmarks(
        &mut self,
        player: PlayerSlot,
        landmarks: &[Option<Landmark>],
        classifier: ClassifierKind,
    ) -> PoseLabel {
        let raw = classifier.classify(landmarks);
        let stable = self.smoothers[player.index()].push(raw);
        self.set_pose(player, stable);
        stable
    }

    pub fn join(&mut self, player: PlayerSlot) -> Vec<ServerMsg> {
        let connected = &mut self.connected[player.index()];
        if *connected {
            warn!(match_id = %self.id, ?player, "Player already in match");
            return Vec::new();
        }
        *connected = true;

        info!(
            match_id = %self.id,
            ?player,
            player_count = self.connected_count(),
            "Player joined match"
        );
        vec![ServerMsg::PlayerJoined { player }]
    }

    pub fn leave(&mut self, player: PlayerSlot, reason: &str) -> Vec<ServerMsg> {
        let i = player.index();
        if !self.connected[i] {
            return Vec::new();
        }
        self.connected[i] = false;
        self.poses[i] = PoseLabel::Idle;
        self.smoothers[i] = PoseSmoother::new(self.smoothing_streak);

        info!(match_id = %self.id, ?player, reason, "Player left match");
        let mut msgs = vec![ServerMsg::PlayerLeft {
            player,
            reason: reason.to_string(),
        }];

        match self.phase {
            MatchPhase::Countdown => {
                debug!(match_id = %self.id, "Countdown cancelled");
                self.phase = MatchPhase::Waiting;
            }
            MatchPhase::InProgress if self.winner().is_none() => {
                let winner = MatchWinner::from(player.opponent());
                info!(match_id = %self.id, ?winner, "Match forfeited");
                self.forfeit = Some(winner);
                self.phase = MatchPhase::Ended;
                msgs.push(ServerMsg::MatchEnd { winner });
            }
            _ => {}
        }
        msgs
    }

    /// Advance one frame
    pub fn tick(&mut self) -> Vec<ServerMsg> {
        let mut msgs = Vec::new();
        self.tick += 1;

        match self.phase {
            MatchPhase::Waiting => {
                if self.connected_count() == 2 {
                    self.phase = MatchPhase::Countdown;
                    self.countdown_ticks = COUNTDOWN_SECS * SIMULATION_TPS;
                    msgs.push(ServerMsg::MatchCountdown {
                        seconds_remaining: COUNTDOWN_SECS,
                    });
                }
            }
            MatchPhase::Countdown => {
                self.countdown_ticks = self.countdown_ticks.saturating_sub(1);
                if self.countdown_ticks == 0 {
                    self.phase = MatchPhase::InProgress;
                    msgs.push(ServerMsg::MatchStarted { tick: self.tick });
                    info!(match_id = %self.id, tick = self.tick, "Match started");
                } else if self.countdown_ticks % SIMULATION_TPS == 0 {
                    msgs.push(ServerMsg::MatchCountdown {
                        seconds_remaining: self.countdown_ticks / SIMULATION_TPS,
                    });
                }
            }
            MatchPhase::InProgress => {
                self.step(&mut msgs);
                match self.grace_ticks {
                    Some(0) => self.phase = MatchPhase::Ended,
                    Some(n) => self.grace_ticks = Some(n - 1),
                    None => {}
                }
            }
            MatchPhase::Ended => {}
        }

        msgs
    }

    /// Pose to input, fighter updates, then hit resolution
    fn step(&mut self, msgs: &mut Vec<ServerMsg>) {
        for player in PlayerSlot::ALL {
            let input = map_input(self.poses[player.index()], player.is_player2());
            self.fighters[player.index()].update(&input);
        }

        let [p1, p2] = &mut self.fighters;
        for event in self.resolver.resolve_frame(p1, p2) {
            match event {
                MatchEvent::HealthChanged {
                    player,
                    health_percent,
                } => msgs.push(ServerMsg::HealthChanged {
                    player,
                    health_percent,
                }),
                MatchEvent::Ended { winner } => {
                    info!(match_id = %self.id, ?winner, "Match decided");
                    self.grace_ticks = Some(END_GRACE_SECS * SIMULATION_TPS);
                    msgs.push(ServerMsg::MatchEnd { winner });
                }
                MatchEvent::Hit {
                    attacker,
                    defender,
                    result,
                } => msgs.push(ServerMsg::Hit {
                    attacker,
                    defender,
                    result,
                }),
            }
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn fighters(&self) -> &[Fighter; 2] {
        &self.fighters
    }

    pub fn fighter(&self, player: PlayerSlot) -> &Fighter {
        &self.fighters[player.index()]
    }

    pub fn pose(&self, player: PlayerSlot) -> PoseLabel {
        self.poses[player.index()]
    }

    pub fn is_connected(&self, player: PlayerSlot) -> bool {
        self.connected[player.index()]
    }

    pub fn connected_count(&self) -> usize {
        self.connected.iter().filter(|c| **c).count()
    }

    /// Knockout or forfeit winner, once decided
    pub fn winner(&self) -> Option<MatchWinner> {
        self.forfeit.or(self.resolver.winner())
    }

    pub fn is_finished(&self) -> bool {
        self.phase == MatchPhase::Ended
    }
}

/// Which player slots of a match are taken
#[derive(Debug, Default)]
struct SlotTable {
    taken: [bool; 2],
    /// Set once a winner is known; freed slots are not handed out again
    decided: bool,
    /// Set once the match task has stopped
    closed: bool,
}

/// Handle to a running match
#[derive(Clone, Debug)]
pub struct MatchHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<PlayerInput>,
    pub snapshot_tx: broadcast::Sender<ServerMsg>,
    slots: Arc<Mutex<SlotTable>>,
}

impl MatchHandle {
    /// Atomically take the first free slot
    pub fn claim_slot(&self) -> Option<PlayerSlot> {
        let mut table = self.slots.lock();
        if table.closed || table.decided {
            return None;
        }
        let slot = PlayerSlot::ALL
            .into_iter()
            .find(|s| !table.taken[s.index()])?;
        table.taken[slot.index()] = true;
        Some(slot)
    }

    pub fn release_slot(&self, slot: PlayerSlot) {
        self.slots.lock().taken[slot.index()] = false;
    }

    pub fn player_count(&self) -> usize {
        self.slots.lock().taken.iter().filter(|t| **t).count()
    }

    /// Still running, undecided and with a free slot
    pub fn is_open(&self) -> bool {
        let table = self.slots.lock();
        !table.closed && !table.decided && table.taken.iter().any(|t| !t)
    }

    pub fn is_decided(&self) -> bool {
        self.slots.lock().decided
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.snapshot_tx.subscribe()
    }
}

/// Why a connection could not be placed in a match
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("Match {0} not found")]
    NotFound(Uuid),

    #[error("Match {0} is full")]
    Full(Uuid),

    #[error("Match {0} is already decided")]
    Finished(Uuid),
}

impl JoinError {
    pub fn code(&self) -> &'static str {
        match self {
            JoinError::NotFound(_) => "match_not_found",
            JoinError::Full(_) => "match_full",
            JoinError::Finished(_) => "match_finished",
        }
    }
}

/// Registry of all active matches
pub struct MatchRegistry {
    matches: DashMap<Uuid, MatchHandle>,
    smoothing_streak: u32,
    /// Serializes placement so two lone players end up in the same match
    join_lock: Mutex<()>,
}

impl MatchRegistry {
    pub fn new(smoothing_streak: u32) -> Self {
        Self {
            matches: DashMap::new(),
            smoothing_streak,
            join_lock: Mutex::new(()),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    pub fn insert(&self, handle: MatchHandle) {
        self.matches.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.remove(id).map(|(_, h)| h)
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn total_players(&self) -> usize {
        self.matches
            .iter()
            .map(|m| m.value().player_count())
            .sum()
    }

    /// Create a match and spawn its task. The match deregisters itself
    /// when the task ends.
    pub fn create_match(self: &Arc<Self>) -> MatchHandle {
        let match_id = Uuid::new_v4();
        let (game_match, handle) = GameMatch::new(match_id, self.smoothing_streak);
        self.insert(handle.clone());

        info!(match_id = %match_id, "Created new match");

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            game_match.run().await;
            registry.remove(&match_id);
            debug!(match_id = %match_id, "Match removed from registry");
        });

        handle
    }

    /// Claim a slot in the requested match, or in the best open match
    /// (a lone waiting player first), or in a new one
    pub fn join(self: &Arc<Self>, match_id: Option<Uuid>) -> Result<(MatchHandle, PlayerSlot), JoinError> {
        if let Some(id) = match_id {
            let handle = self.get(&id).ok_or(JoinError::NotFound(id))?;
            if handle.is_decided() {
                return Err(JoinError::Finished(id));
            }
            let slot = handle.claim_slot().ok_or(JoinError::Full(id))?;
            return Ok((handle, slot));
        }

        let _guard = self.join_lock.lock();

        let mut open: Vec<MatchHandle> = self
            .matches
            .iter()
            .map(|m| m.value().clone())
            .filter(MatchHandle::is_open)
            .collect();
        open.sort_by_key(|h| std::cmp::Reverse(h.player_count()));

        for handle in open {
            if let Some(slot) = handle.claim_slot() {
                return Ok((handle, slot));
            }
        }

        let handle = self.create_match();
        let slot = handle.claim_slot().ok_or(JoinError::Full(handle.id))?;
        Ok((handle, slot))
    }
}

/// The authoritative game match
pub struct GameMatch {
    ctx: MatchContext,
    input_rx: mpsc::Receiver<PlayerInput>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    slots: Arc<Mutex<SlotTable>>,
    had_players: bool,
    decided: bool,
    idle_ticks: u32,
}

impl GameMatch {
    /// Create a new match
    pub fn new(id: Uuid, smoothing_streak: u32) -> (Self, MatchHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = broadcast::channel(64);
        let slots = Arc::new(Mutex::new(SlotTable::default()));

        let handle = MatchHandle {
            id,
            input_tx,
            snapshot_tx: snapshot_tx.clone(),
            slots: slots.clone(),
        };

        let snapshot_interval = SIMULATION_TPS / SNAPSHOT_TPS;
        let game_match = Self {
            ctx: MatchContext::new(id, smoothing_streak),
            input_rx,
            snapshot_tx,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval),
            slots,
            had_players: false,
            decided: false,
            idle_ticks: 0,
        };

        (game_match, handle)
    }

    /// Run the authoritative tick loop
    pub async fn run(mut self) {
        let match_id = self.ctx.id();
        info!(match_id = %match_id, "Match loop running");

        let tick_duration = Duration::from_micros(1_000_000 / SIMULATION_TPS as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            // Drain input queue
            self.process_inputs();

            // Run simulation tick
            let msgs = self.ctx.tick();
            self.broadcast(msgs);
            self.sync_outcome();

            if self.snapshot_builder.should_send() {
                let snapshot = self.snapshot_builder.build(&self.ctx);
                let _ = self.snapshot_tx.send(snapshot);
            }

            if self.ctx.is_finished() {
                info!(match_id = %match_id, winner = ?self.ctx.winner(), "Match ended");
                break;
            }

            if self.ctx.connected_count() == 0 {
                if self.had_players {
                    info!(
                        match_id = %match_id,
                        phase = ?self.ctx.phase(),
                        "All players left, ending match"
                    );
                    break;
                }
                self.idle_ticks += 1;
                if self.idle_ticks >= EMPTY_MATCH_TIMEOUT_SECS * SIMULATION_TPS {
                    info!(match_id = %match_id, "Nobody joined, dropping match");
                    break;
                }
            }
        }

        self.slots.lock().closed = true;
    }

    /// Stop matchmaking from placing players once the duel is decided
    fn sync_outcome(&mut self) {
        if !self.decided && self.ctx.winner().is_some() {
            self.decided = true;
            self.slots.lock().decided = true;
        }
    }

    /// Process all pending inputs from players
    fn process_inputs(&mut self) {
        while let Ok(input) = self.input_rx.try_recv() {
            let player = input.player;
            trace!(
                match_id = %self.ctx.id(),
                ?player,
                queued_ms = unix_millis().saturating_sub(input.received_at),
                "Input dequeued"
            );
            let msgs = match input.event {
                PlayerEvent::Joined => {
                    self.had_players = true;
                    self.ctx.join(player)
                }
                PlayerEvent::Left => self.ctx.leave(player, "disconnected"),
                PlayerEvent::Message(ClientMsg::LeaveMatch) => self.ctx.leave(player, "left"),
                PlayerEvent::Message(ClientMsg::Pose { pose }) => {
                    self.ctx.set_pose(player, PoseLabel::from_wire(&pose));
                    Vec::new()
                }
                PlayerEvent::Message(ClientMsg::Landmarks {
                    landmarks,
                    classifier,
                }) => {
                    self.ctx.push_landmarks(player, &landmarks, classifier);
                    Vec::new()
                }
                PlayerEvent::Message(ClientMsg::Ping { .. }) => Vec::new(),
            };
            self.broadcast(msgs);
        }
    }

    fn broadcast(&mut self, msgs: Vec<ServerMsg>) {
        for msg in msgs {
            if matches!(
                msg,
                ServerMsg::MatchStarted { .. } | ServerMsg::MatchEnd { .. }
            ) {
                self.snapshot_builder.force_next();
            }
            let _ = self.snapshot_tx.send(msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::combat::HitResult;
    use crate::game::sprite::{SpriteKind, FRAMES_HOLD};
    use crate::pose::landmark::*;

    fn context() -> MatchContext {
        MatchContext::new(Uuid::new_v4(), 3)
    }

    /// Join both players and run the countdown out
    fn started() -> MatchContext {
        let mut ctx = context();
        ctx.join(PlayerSlot::Player1);
        ctx.join(PlayerSlot::Player2);
        for _ in 0..=COUNTDOWN_SECS * SIMULATION_TPS {
            ctx.tick();
        }
        assert_eq!(ctx.phase(), MatchPhase::InProgress);
        ctx
    }

    fn run(ctx: &mut MatchContext, ticks: u32) -> Vec<ServerMsg> {
        (0..ticks).flat_map(|_| ctx.tick()).collect()
    }

    #[test]
    fn test_waits_for_both_players() {
        let mut ctx = context();
        ctx.join(PlayerSlot::Player1);
        assert!(run(&mut ctx, 100).is_empty());
        assert_eq!(ctx.phase(), MatchPhase::Waiting);

        ctx.join(PlayerSlot::Player2);
        let msgs = ctx.tick();
        assert!(matches!(
            msgs[..],
            [ServerMsg::MatchCountdown {
                seconds_remaining: 3
            }]
        ));
        assert_eq!(ctx.phase(), MatchPhase::Countdown);
    }

    #[test]
    fn test_countdown_then_start() {
        let mut ctx = context();
        ctx.join(PlayerSlot::Player1);
        ctx.join(PlayerSlot::Player2);
        let msgs = run(&mut ctx, COUNTDOWN_SECS * SIMULATION_TPS + 1);

        let seconds: Vec<u32> = msgs
            .iter()
            .filter_map(|m| match m {
                ServerMsg::MatchCountdown { seconds_remaining } => Some(*seconds_remaining),
                _ => None,
            })
            .collect();
        assert_eq!(seconds, vec![3, 2, 1]);
        assert!(matches!(msgs.last(), Some(ServerMsg::MatchStarted { .. })));
        assert_eq!(ctx.phase(), MatchPhase::InProgress);
    }

    #[test]
    fn test_leaving_cancels_countdown() {
        let mut ctx = context();
        ctx.join(PlayerSlot::Player1);
        ctx.join(PlayerSlot::Player2);
        ctx.tick();
        let msgs = ctx.leave(PlayerSlot::Player2, "disconnected");
        assert!(matches!(msgs[..], [ServerMsg::PlayerLeft { .. }]));
        assert_eq!(ctx.phase(), MatchPhase::Waiting);
    }

    #[test]
    fn test_double_join_ignored() {
        let mut ctx = context();
        assert_eq!(ctx.join(PlayerSlot::Player1).len(), 1);
        assert!(ctx.join(PlayerSlot::Player1).is_empty());
        assert_eq!(ctx.connected_count(), 1);
    }

    #[test]
    fn test_fighters_frozen_before_start() {
        let mut ctx = context();
        ctx.join(PlayerSlot::Player1);
        ctx.set_pose(PlayerSlot::Player1, PoseLabel::Forward);
        let x = ctx.fighter(PlayerSlot::Player1).position().x;
        run(&mut ctx, 30);
        assert_eq!(ctx.fighter(PlayerSlot::Player1).position().x, x);
    }

    #[test]
    fn test_latest_pose_wins() {
        let mut ctx = started();
        ctx.set_pose(PlayerSlot::Player1, PoseLabel::Punch);
        ctx.set_pose(PlayerSlot::Player1, PoseLabel::Guard);
        ctx.tick();
        let f = ctx.fighter(PlayerSlot::Player1);
        assert!(f.is_guarding());
        assert!(!f.is_attacking());
        // reading does not consume it
        ctx.tick();
        assert_eq!(ctx.pose(PlayerSlot::Player1), PoseLabel::Guard);
    }

    #[test]
    fn test_player2_forward_moves_toward_player1() {
        let mut ctx = started();
        let x = ctx.fighter(PlayerSlot::Player2).position().x;
        ctx.set_pose(PlayerSlot::Player2, PoseLabel::Forward);
        run(&mut ctx, 10);
        assert!(ctx.fighter(PlayerSlot::Player2).position().x < x);
    }

    #[test]
    fn test_landmarks_are_smoothed() {
        let mut ctx = started();
        let mut guard = vec![None; 33];
        guard[NOSE] = Some(Landmark::new(0.5, 0.2, 1.0));
        guard[LEFT_SHOULDER] = Some(Landmark::new(0.4, 0.3, 1.0));
        guard[RIGHT_SHOULDER] = Some(Landmark::new(0.6, 0.3, 1.0));
        guard[LEFT_ELBOW] = Some(Landmark::new(0.4, 0.42, 1.0));
        guard[LEFT_WRIST] = Some(Landmark::new(0.48, 0.42, 1.0));
        guard[RIGHT_ELBOW] = Some(Landmark::new(0.6, 0.42, 1.0));
        guard[RIGHT_WRIST] = Some(Landmark::new(0.52, 0.42, 1.0));

        let mut push = |landmarks: &[Option<Landmark>], kind| {
            ctx.push_landmarks(PlayerSlot::Player1, landmarks, kind)
        };
        assert_eq!(push(guard.as_slice(), ClassifierKind::Extended), PoseLabel::Idle);
        assert_eq!(push(guard.as_slice(), ClassifierKind::Extended), PoseLabel::Idle);
        assert_eq!(push(guard.as_slice(), ClassifierKind::Extended), PoseLabel::Guard);
        // a short skeleton is IDLE but needs its own streak
        assert_eq!(push(&[], ClassifierKind::Basic), PoseLabel::Guard);
        assert_eq!(ctx.pose(PlayerSlot::Player1), PoseLabel::Guard);
    }

    #[test]
    fn test_full_duel_to_knockout() {
        let mut ctx = started();

        // close the distance
        ctx.set_pose(PlayerSlot::Player1, PoseLabel::Forward);
        run(&mut ctx, 80);

        let mut msgs = Vec::new();
        for _ in 0..5 {
            ctx.set_pose(PlayerSlot::Player1, PoseLabel::Punch);
            msgs.extend(ctx.tick());
            ctx.set_pose(PlayerSlot::Player1, PoseLabel::Stand);
            msgs.extend(run(&mut ctx, 11 * FRAMES_HOLD));
        }

        let health: Vec<u32> = msgs
            .iter()
            .filter_map(|m| match m {
                ServerMsg::HealthChanged {
                    player: PlayerSlot::Player2,
                    health_percent,
                } => Some(*health_percent),
                _ => None,
            })
            .collect();
        assert_eq!(health, vec![80, 60, 40, 20, 0]);
        assert!(msgs.iter().any(|m| matches!(
            m,
            ServerMsg::MatchEnd {
                winner: MatchWinner::Player1
            }
        )));
        assert_eq!(ctx.winner(), Some(MatchWinner::Player1));
        let hits: Vec<&HitResult> = msgs
            .iter()
            .filter_map(|m| match m {
                ServerMsg::Hit {
                    attacker: PlayerSlot::Player1,
                    result,
                    ..
                } => Some(result),
                _ => None,
            })
            .collect();
        assert_eq!(hits.len(), 5);
        assert!(hits.iter().all(|h| h.damage == 20 && !h.guarded));
        assert!(hits[4].defender_killed);

        // simulation keeps running so the death animation completes
        run(&mut ctx, END_GRACE_SECS * SIMULATION_TPS + 1);
        assert!(ctx.is_finished());
        let loser = ctx.fighter(PlayerSlot::Player2);
        assert!(loser.is_dead());
        assert_eq!(loser.animation().kind(), SpriteKind::Death);
    }

    #[test]
    fn test_leaving_mid_match_forfeits() {
        let mut ctx = started();
        let msgs = ctx.leave(PlayerSlot::Player1, "left");
        assert!(msgs.iter().any(|m| matches!(
            m,
            ServerMsg::MatchEnd {
                winner: MatchWinner::Player2
            }
        )));
        assert!(ctx.is_finished());
    }

    #[test]
    fn test_slot_claims() {
        let (_game, handle) = GameMatch::new(Uuid::new_v4(), 3);
        assert_eq!(handle.claim_slot(), Some(PlayerSlot::Player1));
        assert_eq!(handle.claim_slot(), Some(PlayerSlot::Player2));
        assert_eq!(handle.claim_slot(), None);
        assert_eq!(handle.player_count(), 2);

        handle.release_slot(PlayerSlot::Player1);
        assert_eq!(handle.claim_slot(), Some(PlayerSlot::Player1));

        handle.release_slot(PlayerSlot::Player2);
        assert!(handle.is_open());
        handle.slots.lock().closed = true;
        assert_eq!(handle.claim_slot(), None);
        assert!(!handle.is_open());
    }

    #[tokio::test]
    async fn test_decided_match_takes_no_new_players() {
        let registry = Arc::new(MatchRegistry::new(3));
        let (mut game, handle) = GameMatch::new(Uuid::new_v4(), 3);
        registry.insert(handle.clone());

        for _ in 0..2 {
            let slot = handle.claim_slot().unwrap();
            game.ctx.join(slot);
        }
        for _ in 0..=COUNTDOWN_SECS * SIMULATION_TPS {
            game.ctx.tick();
        }

        // player 1 knocks player 2 out
        game.ctx.set_pose(PlayerSlot::Player1, PoseLabel::Forward);
        run(&mut game.ctx, 80);
        for _ in 0..5 {
            game.ctx.set_pose(PlayerSlot::Player1, PoseLabel::Punch);
            game.ctx.tick();
            game.ctx.set_pose(PlayerSlot::Player1, PoseLabel::Stand);
            run(&mut game.ctx, 11 * FRAMES_HOLD);
        }
        assert_eq!(game.ctx.winner(), Some(MatchWinner::Player1));
        game.sync_outcome();

        // the loser drops out during the grace period
        assert!(!game.ctx.is_finished());
        game.ctx.leave(PlayerSlot::Player2, "disconnected");
        handle.release_slot(PlayerSlot::Player2);
        assert!(handle.is_decided());
        assert!(!handle.is_open());
        assert_eq!(handle.claim_slot(), None);

        assert_eq!(
            registry.join(Some(handle.id)).unwrap_err(),
            JoinError::Finished(handle.id)
        );
        let (other, slot) = registry.join(None).unwrap();
        assert_ne!(other.id, handle.id);
        assert_eq!(slot, PlayerSlot::Player1);
        assert_eq!(game.ctx.winner(), Some(MatchWinner::Player1));
    }

    #[tokio::test]
    async fn test_registry_pairs_players() {
        let registry = Arc::new(MatchRegistry::new(3));

        let (first, slot1) = registry.join(None).unwrap();
        let (second, slot2) = registry.join(None).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(slot1, PlayerSlot::Player1);
        assert_eq!(slot2, PlayerSlot::Player2);

        let (third, slot3) = registry.join(None).unwrap();
        assert_ne!(third.id, first.id);
        assert_eq!(slot3, PlayerSlot::Player1);

        assert_eq!(registry.active_matches(), 2);
        assert_eq!(registry.total_players(), 3);
    }

    #[tokio::test]
    async fn test_registry_join_errors() {
        let registry = Arc::new(MatchRegistry::new(3));
        let missing = Uuid::new_v4();
        assert_eq!(
            registry.join(Some(missing)).unwrap_err(),
            JoinError::NotFound(missing)
        );

        let handle = registry.create_match();
        registry.join(Some(handle.id)).unwrap();
        registry.join(Some(handle.id)).unwrap();
        let err = registry.join(Some(handle.id)).unwrap_err();
        assert_eq!(err, JoinError::Full(handle.id));
        assert_eq!(err.code(), "match_full");
    }

    #[tokio::test]
    async fn test_match_loop_broadcasts_lifecycle() {
        let registry = Arc::new(MatchRegistry::new(3));
        let handle = registry.create_match();
        let mut rx = handle.subscribe();

        for _ in 0..2 {
            let slot = handle.claim_slot().unwrap();
            handle
                .input_tx
                .send(PlayerInput {
                    player: slot,
                    event: PlayerEvent::Joined,
                    received_at: unix_millis(),
                })
                .await
                .unwrap();
        }

        let countdown = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(ServerMsg::MatchCountdown { seconds_remaining }) = rx.recv().await {
                    return seconds_remaining;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(countdown, COUNTDOWN_SECS);

        // both leave: the loop ends and deregisters
        for player in PlayerSlot::ALL {
            handle
                .input_tx
                .send(PlayerInput {
                    player,
                    event: PlayerEvent::Left,
                    received_at: unix_millis(),
                })
                .await
                .unwrap();
        }
        tokio::time::timeout(Duration::from_secs(2), async {
            while registry.get(&handle.id).is_some() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();
        assert!(handle.slots.lock().closed);
        assert!(!handle.is_open());
    }
}
