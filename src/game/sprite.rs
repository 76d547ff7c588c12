//! Sprite sheets and the frame cursor embedded in every fighter

use std::collections::HashMap;

use serde::Serialize;

/// Logical animation a fighter can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpriteKind {
    Idle,
    Run,
    Jump,
    Fall,
    Attack1,
    TakeHit,
    Death,
    Punch,
    Kick,
    CrouchPunch,
    CrouchKick,
    Guard,
    CrouchGuard,
    Crouch,
    Forward,
    Backward,
}

impl SpriteKind {
    pub fn is_attack(&self) -> bool {
        matches!(
            self,
            SpriteKind::Attack1
                | SpriteKind::Punch
                | SpriteKind::Kick
                | SpriteKind::CrouchPunch
                | SpriteKind::CrouchKick
        )
    }

    /// Sheet to use when a set has no dedicated art for this kind
    fn fallback(&self) -> Option<SpriteKind> {
        match self {
            SpriteKind::Punch
            | SpriteKind::Kick
            | SpriteKind::CrouchPunch
            | SpriteKind::CrouchKick => Some(SpriteKind::Attack1),
            SpriteKind::Guard | SpriteKind::CrouchGuard | SpriteKind::Crouch => {
                Some(SpriteKind::Idle)
            }
            SpriteKind::Forward | SpriteKind::Backward => Some(SpriteKind::Run),
            _ => None,
        }
    }
}

/// One horizontal strip of animation frames
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpriteSheet {
    pub image: String,
    pub frames_max: u32,
}

impl SpriteSheet {
    pub fn new(image: impl Into<String>, frames_max: u32) -> Self {
        Self {
            image: image.into(),
            frames_max: frames_max.max(1),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SpriteSetError {
    #[error("Sprite set {set} is missing required sprite {kind:?}")]
    MissingRequired { set: String, kind: SpriteKind },
}

/// The art a character is drawn with. Base sheets are mandatory, pose
/// specific sheets are optional and fall back to a base sheet.
#[derive(Debug, Clone)]
pub struct SpriteSet {
    name: String,
    idle: SpriteSheet,
    run: SpriteSheet,
    jump: SpriteSheet,
    fall: SpriteSheet,
    attack1: SpriteSheet,
    take_hit: SpriteSheet,
    death: SpriteSheet,
    extra: HashMap<SpriteKind, SpriteSheet>,
}

impl SpriteSet {
    pub const REQUIRED: [SpriteKind; 7] = [
        SpriteKind::Idle,
        SpriteKind::Run,
        SpriteKind::Jump,
        SpriteKind::Fall,
        SpriteKind::Attack1,
        SpriteKind::TakeHit,
        SpriteKind::Death,
    ];

    /// Build a set from a sheet table, failing if a base sheet is missing
    pub fn from_sheets(
        name: impl Into<String>,
        mut sheets: HashMap<SpriteKind, SpriteSheet>,
    ) -> Result<Self, SpriteSetError> {
        let name = name.into();
        let mut take = |kind: SpriteKind| {
            sheets
                .remove(&kind)
                .ok_or_else(|| SpriteSetError::MissingRequired {
                    set: name.clone(),
                    kind,
                })
        };

        let idle = take(SpriteKind::Idle)?;
        let run = take(SpriteKind::Run)?;
        let jump = take(SpriteKind::Jump)?;
        let fall = take(SpriteKind::Fall)?;
        let attack1 = take(SpriteKind::Attack1)?;
        let take_hit = take(SpriteKind::TakeHit)?;
        let death = take(SpriteKind::Death)?;

        Ok(Self {
            name,
            idle,
            run,
            jump,
            fall,
            attack1,
            take_hit,
            death,
            extra: sheets,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve a kind to the sheet actually drawn, following fallbacks
    pub fn resolve(&self, kind: SpriteKind) -> (SpriteKind, &SpriteSheet) {
        let base = match kind {
            SpriteKind::Idle => Some(&self.idle),
            SpriteKind::Run => Some(&self.run),
            SpriteKind::Jump => Some(&self.jump),
            SpriteKind::Fall => Some(&self.fall),
            SpriteKind::Attack1 => Some(&self.attack1),
            SpriteKind::TakeHit => Some(&self.take_hit),
            SpriteKind::Death => Some(&self.death),
            _ => self.extra.get(&kind),
        };

        match (base, kind.fallback()) {
            (Some(sheet), _) => (kind, sheet),
            (None, Some(fallback)) => self.resolve(fallback),
            (None, None) => (SpriteKind::Idle, &self.idle),
        }
    }

    /// Player 1 character
    pub fn samurai_mack() -> Self {
        Self::builtin(
            "samurai_mack",
            "./img/samuraiMack",
            &[
                (SpriteKind::Punch, "Punch.png", 11),
                (SpriteKind::Kick, "Kick.png", 9),
                (SpriteKind::CrouchPunch, "Crouch_Punch.png", 10),
                (SpriteKind::CrouchKick, "Crouch_Kick.png", 8),
                (SpriteKind::Guard, "Guard.png", 6),
                (SpriteKind::CrouchGuard, "Crouch_Guard.png", 8),
                (SpriteKind::Crouch, "Crouch.png", 10),
                (SpriteKind::Forward, "Forward.png", 8),
                (SpriteKind::Backward, "Backward.png", 8),
            ],
        )
    }

    /// Player 2 character
    pub fn kenji() -> Self {
        Self::builtin(
            "kenji",
            "./img/kenji",
            &[
                (SpriteKind::Punch, "Punch.png", 11),
                (SpriteKind::Kick, "Kick.png", 9),
                (SpriteKind::CrouchPunch, "Crouch_Punch.png", 10),
                (SpriteKind::CrouchKick, "Crouch_Kick.png", 8),
                (SpriteKind::Guard, "Guard.png", 6),
                (SpriteKind::CrouchGuard, "Crouch_Guard.png", 8),
                (SpriteKind::Crouch, "Crouch.png", 10),
                (SpriteKind::Forward, "Forward.png", 8),
                (SpriteKind::Backward, "Backward.png", 8),
            ],
        )
    }

    fn builtin(name: &str, dir: &str, extra: &[(SpriteKind, &str, u32)]) -> Self {
        let sheet = |file: &str, frames| SpriteSheet::new(format!("{dir}/{file}"), frames);
        Self {
            name: name.to_string(),
            idle: sheet("Stand.png", 10),
            run: sheet("Forward.png", 8),
            jump: sheet("Stand.png", 10),
            fall: sheet("Stand.png", 10),
            attack1: sheet("Punch.png", 11),
            take_hit: sheet("Takehit.png", 7),
            death: sheet("Death.png", 13),
            extra: extra
                .iter()
                .map(|&(kind, file, frames)| (kind, sheet(file, frames)))
                .collect(),
        }
    }
}

/// Game frames each sprite frame stays on screen
pub const FRAMES_HOLD: u32 = 5;

/// Which sprite is showing and where its frame cursor is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Animation {
    kind: SpriteKind,
    sheet: SpriteKind,
    frames_max: u32,
    frame_current: u32,
    frames_elapsed: u32,
    frames_hold: u32,
}

impl Animation {
    pub fn new(set: &SpriteSet, kind: SpriteKind) -> Self {
        let (sheet, data) = set.resolve(kind);
        Self {
            kind,
            sheet,
            frames_max: data.frames_max,
            frame_current: 0,
            frames_elapsed: 0,
            frames_hold: FRAMES_HOLD,
        }
    }

    /// Switch to `kind` from frame 0. No-op if already showing it.
    pub fn switch(&mut self, set: &SpriteSet, kind: SpriteKind) -> bool {
        if self.kind == kind {
            return false;
        }
        self.restart(set, kind);
        true
    }

    /// Switch to `kind` from frame 0 even if already showing it
    pub fn restart(&mut self, set: &SpriteSet, kind: SpriteKind) {
        *self = Self {
            frames_hold: self.frames_hold,
            ..Self::new(set, kind)
        };
    }

    /// Count one game frame; true when the cursor is due to move
    pub fn tick(&mut self) -> bool {
        self.frames_elapsed += 1;
        self.frames_elapsed % self.frames_hold == 0
    }

    /// Move to the next frame, looping back to 0 after the last
    pub fn step(&mut self) {
        if self.is_last_frame() {
            self.frame_current = 0;
        } else {
            self.frame_current += 1;
        }
    }

    pub fn jump_to(&mut self, frame: u32) {
        self.frame_current = frame.min(self.last_frame());
        self.frames_elapsed = 0;
    }

    pub fn kind(&self) -> SpriteKind {
        self.kind
    }

    pub fn sheet(&self) -> SpriteKind {
        self.sheet
    }

    pub fn frame_current(&self) -> u32 {
        self.frame_current
    }

    pub fn frames_max(&self) -> u32 {
        self.frames_max
    }

    pub fn last_frame(&self) -> u32 {
        self.frames_max - 1
    }

    pub fn is_last_frame(&self) -> bool {
        self.frame_current >= self.last_frame()
    }
}
