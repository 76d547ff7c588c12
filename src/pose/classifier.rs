//! Heuristic pose classification from a single landmark set
//!
//! Every distance threshold is a multiple of the body scale (shoulder or
//! hip width), every angle is in degrees. Classification is stateless:
//! the same skeleton always yields the same label.

use serde::{Deserialize, Serialize};

use super::label::PoseLabel;
use super::landmark::{
    angle, distance, get_scale, visible, Landmark, LEFT_ANKLE, LEFT_ELBOW, LEFT_HIP, LEFT_KNEE,
    LEFT_SHOULDER, LEFT_WRIST, MIN_LANDMARKS, NOSE, RIGHT_ANKLE, RIGHT_ELBOW, RIGHT_HIP,
    RIGHT_KNEE, RIGHT_SHOULDER, RIGHT_WRIST,
};

/// Classification thresholds (distances as multiples of scale)
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    /// Max elbow angle for a guarding arm
    pub guard_elbow_angle_max: f32,
    pub guard_wrist_to_face: f32,
    pub guard_wrist_to_shoulder: f32,

    /// Min elbow angle for an extended punching arm
    pub punch_elbow_angle_min: f32,
    pub punch_wrist_to_shoulder: f32,
    /// Max vertical offset between wrist and shoulder
    pub punch_wrist_y_align: f32,
    /// Min shoulder depth minus wrist depth for a punch toward the camera
    /// (raw z units, extended rules only)
    pub punch_wrist_z_forward: f32,

    /// Min knee angle for an extended kicking leg
    pub kick_knee_angle_min: f32,
    pub kick_ankle_x_to_hip: f32,
    pub kick_ankle_above_knee: f32,
    /// Min hip depth minus ankle depth for a kick toward the camera
    /// (raw z units, extended rules only)
    pub kick_ankle_z_forward: f32,

    /// Max knee angle for a crouching leg
    pub crouch_knee_angle_max: f32,
    /// Max vertical hip-to-ankle distance for a crouching leg
    pub crouch_hip_ankle_dist: f32,

    /// Min hip depth minus shoulder depth (raw z units)
    pub forward_lean_z: f32,
    /// Min shoulder depth minus ankle depth (raw z units)
    pub backward_lean_z: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            guard_elbow_angle_max: 130.0,
            guard_wrist_to_face: 1.2,
            guard_wrist_to_shoulder: 0.8,
            punch_elbow_angle_min: 150.0,
            punch_wrist_to_shoulder: 1.1,
            punch_wrist_y_align: 0.35,
            punch_wrist_z_forward: 0.2,
            kick_knee_angle_min: 165.0,
            kick_ankle_x_to_hip: 0.6,
            kick_ankle_above_knee: 0.3,
            kick_ankle_z_forward: 0.2,
            crouch_knee_angle_max: 140.0,
            crouch_hip_ankle_dist: 1.0,
            forward_lean_z: 0.1,
            backward_lean_z: 0.01,
        }
    }
}

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

impl Side {
    const BOTH: [Side; 2] = [Side::Left, Side::Right];

    fn shoulder(self) -> usize {
        match self {
            Side::Left => LEFT_SHOULDER,
            Side::Right => RIGHT_SHOULDER,
        }
    }

    fn elbow(self) -> usize {
        match self {
            Side::Left => LEFT_ELBOW,
            Side::Right => RIGHT_ELBOW,
        }
    }

    fn wrist(self) -> usize {
        match self {
            Side::Left => LEFT_WRIST,
            Side::Right => RIGHT_WRIST,
        }
    }

    fn hip(self) -> usize {
        match self {
            Side::Left => LEFT_HIP,
            Side::Right => RIGHT_HIP,
        }
    }

    fn knee(self) -> usize {
        match self {
            Side::Left => LEFT_KNEE,
            Side::Right => RIGHT_KNEE,
        }
    }

    fn ankle(self) -> usize {
        match self {
            Side::Left => LEFT_ANKLE,
            Side::Right => RIGHT_ANKLE,
        }
    }
}

/// Evaluates per-limb predicates for one skeleton at a known scale
struct Body<'a> {
    landmarks: &'a [Option<Landmark>],
    scale: f32,
    th: &'a Thresholds,
    /// Accept limbs extended toward the camera
    depth: bool,
}

impl<'a> Body<'a> {
    fn new(landmarks: &'a [Option<Landmark>], th: &'a Thresholds) -> Option<Self> {
        if landmarks.len() < MIN_LANDMARKS {
            return None;
        }
        let scale = get_scale(landmarks)?;
        Some(Self {
            landmarks,
            scale,
            th,
            depth: false,
        })
    }

    fn with_depth(mut self) -> Self {
        self.depth = true;
        self
    }

    fn lm(&self, index: usize) -> Option<&'a Landmark> {
        visible(self.landmarks, index)
    }

    /// Both arms bent with wrists near face or shoulders
    fn guard(&self) -> bool {
        let Some(nose) = self.lm(NOSE) else {
            return false;
        };
        Side::BOTH.iter().all(|&side| {
            let (Some(sh), Some(el), Some(wr)) = (
                self.lm(side.shoulder()),
                self.lm(side.elbow()),
                self.lm(side.wrist()),
            ) else {
                return false;
            };
            let close = distance(wr, nose) <= self.th.guard_wrist_to_face * self.scale
                || distance(wr, sh) <= self.th.guard_wrist_to_shoulder * self.scale;
            close && angle(sh, el, wr) <= self.th.guard_elbow_angle_max
        })
    }

    fn punch_arm(&self, side: Side) -> bool {
        let (Some(sh), Some(el), Some(wr)) = (
            self.lm(side.shoulder()),
            self.lm(side.elbow()),
            self.lm(side.wrist()),
        ) else {
            return false;
        };
        // smaller z is closer to the camera
        let reach = distance(wr, sh) >= self.th.punch_wrist_to_shoulder * self.scale
            || (self.depth && sh.z - wr.z >= self.th.punch_wrist_z_forward);
        angle(sh, el, wr) >= self.th.punch_elbow_angle_min
            && reach
            && (wr.y - sh.y).abs() <= self.th.punch_wrist_y_align * self.scale
    }

    fn punch(&self) -> bool {
        Side::BOTH.iter().any(|&side| self.punch_arm(side))
    }

    fn kick_leg(&self, side: Side) -> bool {
        let (Some(hip), Some(knee), Some(ankle)) = (
            self.lm(side.hip()),
            self.lm(side.knee()),
            self.lm(side.ankle()),
        ) else {
            return false;
        };
        let far_x = (ankle.x - hip.x).abs() >= self.th.kick_ankle_x_to_hip * self.scale;
        // y grows downward, so "above" means a smaller y
        let above_knee = ankle.y + self.th.kick_ankle_above_knee * self.scale <= knee.y;
        let toward_camera = self.depth && hip.z - ankle.z >= self.th.kick_ankle_z_forward;
        angle(hip, knee, ankle) >= self.th.kick_knee_angle_min
            && (far_x || above_knee || toward_camera)
    }

    fn kick(&self) -> bool {
        Side::BOTH.iter().any(|&side| self.kick_leg(side))
    }

    fn crouch_leg(&self, side: Side) -> bool {
        let (Some(hip), Some(knee), Some(ankle)) = (
            self.lm(side.hip()),
            self.lm(side.knee()),
            self.lm(side.ankle()),
        ) else {
            return false;
        };
        angle(hip, knee, ankle) <= self.th.crouch_knee_angle_max
            && (hip.y - ankle.y).abs() <= self.th.crouch_hip_ankle_dist * self.scale
    }

    fn crouch(&self) -> bool {
        Side::BOTH.iter().any(|&side| self.crouch_leg(side))
    }

    fn mean_z(&self, a: usize, b: usize) -> Option<f32> {
        Some((self.lm(a)?.z + self.lm(b)?.z) / 2.0)
    }

    fn leaning_forward(&self) -> bool {
        match (
            self.mean_z(LEFT_SHOULDER, RIGHT_SHOULDER),
            self.mean_z(LEFT_HIP, RIGHT_HIP),
        ) {
            (Some(shoulders), Some(hips)) => hips - shoulders >= self.th.forward_lean_z,
            _ => false,
        }
    }

    fn leaning_backward(&self) -> bool {
        match (
            self.mean_z(LEFT_SHOULDER, RIGHT_SHOULDER),
            self.mean_z(LEFT_ANKLE, RIGHT_ANKLE),
        ) {
            (Some(shoulders), Some(ankles)) => shoulders - ankles >= self.th.backward_lean_z,
            _ => false,
        }
    }
}

/// Rule set applied to a raw skeleton
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    /// GUARD, PUNCH, KICK or IDLE
    Basic,
    /// Full label set
    #[default]
    Extended,
}

impl ClassifierKind {
    pub fn classify(self, landmarks: &[Option<Landmark>]) -> PoseLabel {
        match self {
            ClassifierKind::Basic => classify(landmarks),
            ClassifierKind::Extended => classify_extended(landmarks),
        }
    }
}

/// Classify with default thresholds. Returns GUARD, PUNCH, KICK or IDLE.
pub fn classify(landmarks: &[Option<Landmark>]) -> PoseLabel {
    classify_with(landmarks, &Thresholds::default())
}

/// Guard is checked first because its silhouette would otherwise be
/// masked by the punch and kick thresholds.
pub fn classify_with(landmarks: &[Option<Landmark>], th: &Thresholds) -> PoseLabel {
    let Some(body) = Body::new(landmarks, th) else {
        return PoseLabel::Idle;
    };

    if body.guard() {
        PoseLabel::Guard
    } else if body.punch() {
        PoseLabel::Punch
    } else if body.kick() {
        PoseLabel::Kick
    } else {
        PoseLabel::Idle
    }
}

/// Classify into the full label set, including crouch variants,
/// depth-based leans and punches or kicks thrown toward the camera.
/// Returns IDLE only when the skeleton is unusable, STAND when nothing
/// matches.
pub fn classify_extended(landmarks: &[Option<Landmark>]) -> PoseLabel {
    classify_extended_with(landmarks, &Thresholds::default())
}

pub fn classify_extended_with(landmarks: &[Option<Landmark>], th: &Thresholds) -> PoseLabel {
    let Some(body) = Body::new(landmarks, th).map(Body::with_depth) else {
        return PoseLabel::Idle;
    };

    let crouch = body.crouch();
    let guard = body.guard();
    let punch = body.punch();
    let kick = body.kick();

    match () {
        _ if crouch && punch => PoseLabel::CrouchPunch,
        _ if crouch && kick => PoseLabel::CrouchKick,
        _ if punch => PoseLabel::Punch,
        _ if kick => PoseLabel::Kick,
        _ if crouch && guard => PoseLabel::CrouchGuard,
        _ if guard => PoseLabel::Guard,
        _ if crouch => PoseLabel::Crouch,
        _ if body.leaning_forward() => PoseLabel::Forward,
        _ if body.leaning_backward() => PoseLabel::Backward,
        _ => PoseLabel::Stand,
    }
}
