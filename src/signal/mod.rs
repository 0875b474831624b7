pub mod fuser;
pub mod gaze;
pub mod posture;
pub mod rate_window;
pub mod source;

pub use fuser::fuse;
pub use posture::{score_posture, PostureEstimate, PostureMetrics};
pub use rate_window::{BlinkCounter, RateWindow};
pub use source::{gather_frame, DetectionSource};
