//! Pose recognition - landmark geometry, classification, smoothing

pub mod classifier;
pub mod label;
pub mod landmark;
pub mod smoothing;

pub use classifier::ClassifierKind;
pub use label::PoseLabel;
pub use landmark::Landmark;
pub use smoothing::PoseSmoother;
