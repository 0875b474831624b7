//! Fused per-frame metric snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PostureQuality {
    Good,
    Acceptable,
    Poor,
    /// Landmarks were missing or below the visibility threshold; no numeric
    /// posture score exists for this frame. Distinct from `Poor`.
    Unknown,
}

impl PostureQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostureQuality::Good => "good",
            PostureQuality::Acceptable => "acceptable",
            PostureQuality::Poor => "poor",
            PostureQuality::Unknown => "unknown",
        }
    }
}

/// The normalized result of fusing one frame's detection results.
/// Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSnapshot {
    pub timestamp: DateTime<Utc>,
    pub face_detected: bool,
    pub looking_at_screen: bool,
    pub eye_aspect_ratio: f64,
    pub blink_detected: bool,
    pub posture_score: f64,
    pub neck_angle: f64,
    pub back_angle: f64,
    pub shoulder_alignment: f64,
    pub posture_quality: PostureQuality,
    pub has_phone: bool,
    pub engagement_score: f64,
}

impl MetricSnapshot {
    /// Whether the subject counts as attentive this frame: present and
    /// looking at the screen.
    pub fn attentive(&self) -> bool {
        self.face_detected && self.looking_at_screen
    }

    /// Compares every signal field, ignoring the timestamp. Used to skip
    /// re-emitting a snapshot when nothing the detectors reported changed.
    pub fn same_signals(&self, other: &MetricSnapshot) -> bool {
        self.face_detected == other.face_detected
            && self.looking_at_screen == other.looking_at_screen
            && self.eye_aspect_ratio == other.eye_aspect_ratio
            && self.blink_detected == other.blink_detected
            && self.posture_score == other.posture_score
            && self.neck_angle == other.neck_angle
            && self.back_angle == other.back_angle
            && self.shoulder_alignment == other.shoulder_alignment
            && self.posture_quality == other.posture_quality
            && self.has_phone == other.has_phone
            && self.engagement_score == other.engagement_score
    }
}
