//! Streak-based debouncing of raw per-frame classifications

use super::label::PoseLabel;

/// Default number of identical consecutive readings before a switch
pub const DEFAULT_STREAK: u32 = 3;

/// Holds a stable pose and only switches after a new label has been
/// observed `streak` times in a row.
#[derive(Debug, Clone)]
pub struct PoseSmoother {
    stable: PoseLabel,
    candidate: Option<PoseLabel>,
    candidate_count: u32,
    streak: u32,
}

impl PoseSmoother {
    pub fn new(streak: u32) -> Self {
        Self {
            stable: PoseLabel::Idle,
            candidate: None,
            candidate_count: 0,
            streak: streak.max(1),
        }
    }

    /// Feed one raw reading, returns the (possibly updated) stable pose
    pub fn push(&mut self, raw: PoseLabel) -> PoseLabel {
        if raw == self.stable {
            self.candidate = None;
            self.candidate_count = 0;
            return self.stable;
        }

        if self.candidate == Some(raw) {
            self.candidate_count += 1;
        } else {
            self.candidate = Some(raw);
            self.candidate_count = 1;
        }

        if self.candidate_count >= self.streak {
            self.stable = raw;
            self.candidate = None;
            self.candidate_count = 0;
        }

        self.stable
    }

    pub fn stable(&self) -> PoseLabel {
        self.stable
    }
}

impl Default for PoseSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_STREAK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switches_after_streak() {
        let mut s = PoseSmoother::default();
        assert_eq!(s.push(PoseLabel::Punch), PoseLabel::Idle);
        assert_eq!(s.push(PoseLabel::Punch), PoseLabel::Idle);
        assert_eq!(s.push(PoseLabel::Punch), PoseLabel::Punch);
    }

    #[test]
    fn test_interrupted_streak_restarts() {
        let mut s = PoseSmoother::default();
        s.push(PoseLabel::Punch);
        s.push(PoseLabel::Punch);
        s.push(PoseLabel::Kick);
        assert_eq!(s.push(PoseLabel::Punch), PoseLabel::Idle);
        assert_eq!(s.push(PoseLabel::Punch), PoseLabel::Idle);
        assert_eq!(s.push(PoseLabel::Punch), PoseLabel::Punch);
    }

    #[test]
    fn test_stable_reading_clears_candidate() {
        let mut s = PoseSmoother::default();
        s.push(PoseLabel::Guard);
        s.push(PoseLabel::Guard);
        s.push(PoseLabel::Idle);
        assert_eq!(s.push(PoseLabel::Guard), PoseLabel::Idle);
    }

    #[test]
    fn test_streak_of_one_is_passthrough() {
        let mut s = PoseSmoother::new(0);
        assert_eq!(s.push(PoseLabel::Kick), PoseLabel::Kick);
        assert_eq!(s.stable(), PoseLabel::Kick);
    }
}
