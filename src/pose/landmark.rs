//! Body landmarks and the geometry helpers the classifiers are built on
//!
//! Coordinates follow the MediaPipe convention: normalized image space,
//! x grows to the right, y grows downward, z is relative depth (smaller
//! is closer to the camera).

use serde::{Deserialize, Serialize};

// ============================================================================
// LANDMARK INDICES (MediaPipe Pose - 33 total)
// ============================================================================

pub const NOSE: usize = 0;
pub const LEFT_SHOULDER: usize = 11;
pub const RIGHT_SHOULDER: usize = 12;
pub const LEFT_ELBOW: usize = 13;
pub const RIGHT_ELBOW: usize = 14;
pub const LEFT_WRIST: usize = 15;
pub const RIGHT_WRIST: usize = 16;
pub const LEFT_HIP: usize = 23;
pub const RIGHT_HIP: usize = 24;
pub const LEFT_KNEE: usize = 25;
pub const RIGHT_KNEE: usize = 26;
pub const LEFT_ANKLE: usize = 27;
pub const RIGHT_ANKLE: usize = 28;

/// Skeletons shorter than this cannot be classified
pub const MIN_LANDMARKS: usize = 29;

/// Confidence floor below which a landmark is treated as not detected
pub const MIN_VISIBILITY: f32 = 0.5;

/// A single detected body joint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Relative depth, absent from some detectors
    #[serde(default)]
    pub z: f32,
    /// Detection confidence in [0, 1]; detectors that omit it are trusted
    #[serde(default = "default_visibility")]
    pub visibility: f32,
}

fn default_visibility() -> f32 {
    1.0
}

impl Landmark {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            visibility,
        }
    }

    pub fn with_z(mut self, z: f32) -> Self {
        self.z = z;
        self
    }
}

/// Euclidean distance in the image plane
pub fn distance(a: &Landmark, b: &Landmark) -> f32 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Angle at vertex `b` between rays b→a and b→c, in degrees.
///
/// Returns 0 when either ray has zero length.
pub fn angle(a: &Landmark, b: &Landmark, c: &Landmark) -> f32 {
    let v1 = (a.x - b.x, a.y - b.y);
    let v2 = (c.x - b.x, c.y - b.y);

    let n1 = v1.0.hypot(v1.1);
    let n2 = v2.0.hypot(v2.1);
    if n1 == 0.0 || n2 == 0.0 {
        return 0.0;
    }

    let dot = v1.0 * v2.0 + v1.1 * v2.1;
    // Rounding can push the cosine just outside [-1, 1]
    let cos = (dot / (n1 * n2)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Whether a landmark is present and detected with enough confidence
pub fn is_visible(landmark: Option<&Landmark>) -> bool {
    landmark.is_some_and(|lm| lm.visibility >= MIN_VISIBILITY)
}

/// Fetch a landmark by index, `None` when out of range or absent
pub fn get(landmarks: &[Option<Landmark>], index: usize) -> Option<&Landmark> {
    landmarks.get(index).and_then(Option::as_ref)
}

/// Fetch a landmark only if it is visible
pub fn visible(landmarks: &[Option<Landmark>], index: usize) -> Option<&Landmark> {
    get(landmarks, index).filter(|lm| is_visible(Some(lm)))
}

/// Body-size normalization factor.
///
/// Shoulder width when both shoulders are visible and apart, otherwise
/// hip width under the same conditions, otherwise `None`.
pub fn get_scale(landmarks: &[Option<Landmark>]) -> Option<f32> {
    pair_width(landmarks, LEFT_SHOULDER, RIGHT_SHOULDER)
        .or_else(|| pair_width(landmarks, LEFT_HIP, RIGHT_HIP))
}

fn pair_width(landmarks: &[Option<Landmark>], left: usize, right: usize) -> Option<f32> {
    let l = visible(landmarks, left)?;
    let r = visible(landmarks, right)?;
    let d = distance(l, r);
    (d > 0.0).then_some(d)
}
