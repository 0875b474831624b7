//! Posture scoring from body-pose geometry.
//!
//! Three landmark pairs drive the score: nose vs. shoulder midpoint (neck
//! angle), shoulder midpoint vs. hip midpoint (back angle), and the two
//! shoulder heights (alignment). Landmarks are in the pose detector's
//! y-up normalized space.

use crate::models::detection::{BodyPose, Point3, PoseLandmark};
use crate::models::metric::PostureQuality;

/// Minimum per-landmark visibility for a measurement to be trusted.
pub const VISIBILITY_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostureMetrics {
    pub score: f64,
    pub neck_angle: f64,
    pub back_angle: f64,
    pub shoulder_alignment: f64,
    pub quality: PostureQuality,
}

/// Result of one posture evaluation. `Unknown` means required landmarks
/// were missing or below the visibility threshold; callers must treat it
/// distinctly from a poor numeric score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PostureEstimate {
    Measured(PostureMetrics),
    Unknown,
}

impl PostureEstimate {
    pub fn quality(&self) -> PostureQuality {
        match self {
            PostureEstimate::Measured(m) => m.quality,
            PostureEstimate::Unknown => PostureQuality::Unknown,
        }
    }
}

fn visible(landmark: &Option<PoseLandmark>) -> Option<Point3> {
    landmark
        .as_ref()
        .filter(|l| l.visibility >= VISIBILITY_THRESHOLD)
        .map(|l| l.point)
}

fn midpoint(a: Point3, b: Point3) -> Point3 {
    Point3::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0, (a.z + b.z) / 2.0)
}

/// Absolute deviation from vertical of the `from -> to` vector, in degrees.
fn deviation_from_vertical(from: Point3, to: Point3) -> f64 {
    let angle = (to.y - from.y).atan2(to.x - from.x).to_degrees();
    (angle - 90.0).abs()
}

/// Scores one frame of pose landmarks.
pub fn score_posture(pose: &BodyPose) -> PostureEstimate {
    let (nose, left_shoulder, right_shoulder, left_hip, right_hip) = match (
        visible(&pose.nose),
        visible(&pose.left_shoulder),
        visible(&pose.right_shoulder),
        visible(&pose.left_hip),
        visible(&pose.right_hip),
    ) {
        (Some(n), Some(ls), Some(rs), Some(lh), Some(rh)) => (n, ls, rs, lh, rh),
        _ => return PostureEstimate::Unknown,
    };

    let shoulder_mid = midpoint(left_shoulder, right_shoulder);
    let hip_mid = midpoint(left_hip, right_hip);

    let neck_angle = deviation_from_vertical(shoulder_mid, nose);
    let back_angle = deviation_from_vertical(hip_mid, shoulder_mid);
    let shoulder_alignment = (1.0 - (left_shoulder.y - right_shoulder.y).abs() * 5.0).max(0.0);

    let mut score: f64 = 100.0;
    if neck_angle > 30.0 {
        score -= 30.0;
    } else if neck_angle > 15.0 {
        score -= 15.0;
    }
    if back_angle > 20.0 {
        score -= 25.0;
    } else if back_angle > 10.0 {
        score -= 10.0;
    }
    if shoulder_alignment < 0.8 {
        score -= 15.0;
    }
    let score = score.clamp(0.0, 100.0);

    let quality = if score > 80.0 {
        PostureQuality::Good
    } else if score > 60.0 {
        PostureQuality::Acceptable
    } else {
        PostureQuality::Poor
    };

    PostureEstimate::Measured(PostureMetrics {
        score,
        neck_angle,
        back_angle,
        shoulder_alignment,
        quality,
    })
}
