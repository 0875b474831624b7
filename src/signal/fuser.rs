//! Per-frame signal fusion.
//!
//! Merges one frame's detection results into a `MetricSnapshot`.
//! Deterministic and side-effect-free: window state and counters live in
//! the session accumulator, not here. Missing signals degrade to their
//! negative defaults (no objects means no phone, no pose means posture 0
//! and unknown, no mesh means not looking and no blink).

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::models::detection::DetectionSnapshot;
use crate::models::metric::{MetricSnapshot, PostureQuality};

use super::gaze::{average_eye_aspect_ratio, estimate_gaze};
use super::posture::{score_posture, PostureEstimate};

/// Object classes that count as a phone in frame.
const PHONE_CLASSES: &[&str] = &["cell phone", "phone", "mobile phone"];

/// Fuses one frame. `previous` is the last emitted snapshot; a blink is
/// flagged on the closed-eye onset so a closure spanning several frames
/// reads as one event entering the debounced counter.
pub fn fuse(
    detection: &DetectionSnapshot,
    previous: Option<&MetricSnapshot>,
    config: &EngineConfig,
    timestamp: DateTime<Utc>,
) -> MetricSnapshot {
    let face_detected = detection
        .face
        .as_ref()
        .map(|f| f.present && f.confidence >= config.face_confidence_threshold)
        .unwrap_or(false);

    let (eye_aspect_ratio, looking_at_screen) = match detection.landmarks.as_ref() {
        Some(landmarks) => {
            let ear = average_eye_aspect_ratio(landmarks).unwrap_or(0.0);
            let looking = estimate_gaze(landmarks)
                .map(|g| g.looking_at_screen(config.gaze_threshold))
                .unwrap_or(false);
            (ear, looking)
        }
        None => (0.0, false),
    };

    let eyes_closed = detection.landmarks.is_some() && eye_aspect_ratio < config.blink_ear_threshold;
    let previously_closed = previous
        .map(|p| p.eye_aspect_ratio < config.blink_ear_threshold)
        .unwrap_or(false);
    let blink_detected = eyes_closed && !previously_closed;

    let posture = detection
        .pose
        .as_ref()
        .map(score_posture)
        .unwrap_or(PostureEstimate::Unknown);
    let (posture_score, neck_angle, back_angle, shoulder_alignment, posture_quality) =
        match posture {
            PostureEstimate::Measured(m) => {
                (m.score, m.neck_angle, m.back_angle, m.shoulder_alignment, m.quality)
            }
            PostureEstimate::Unknown => (0.0, 0.0, 0.0, 0.0, PostureQuality::Unknown),
        };

    let has_phone = detection
        .objects
        .as_ref()
        .map(|objects| {
            objects.iter().any(|o| {
                o.confidence >= config.phone_confidence_threshold
                    && PHONE_CLASSES.contains(&o.class.as_str())
            })
        })
        .unwrap_or(false);

    let mut engagement_score: f64 = 0.0;
    if face_detected {
        engagement_score += 40.0;
    }
    if looking_at_screen {
        engagement_score += 40.0;
    }
    if posture_score > config.posture_engagement_cutoff {
        engagement_score += 20.0;
    }
    if has_phone {
        engagement_score -= 30.0;
    }
    let engagement_score = engagement_score.clamp(0.0, 100.0);

    MetricSnapshot {
        timestamp,
        face_detected,
        looking_at_screen,
        eye_aspect_ratio,
        blink_detected,
        posture_score,
        neck_angle,
        back_angle,
        shoulder_alignment,
        posture_quality,
        has_phone,
        engagement_score,
    }
}
