//! Threshold-driven coaching feedback.

use crate::models::{EyeStrainLevel, ImprovementArea, Severity};

/// The session figures the improvement rules inspect.
#[derive(Debug, Clone)]
pub(crate) struct ImprovementInputs {
    pub presence_pct: f64,
    pub average_posture: f64,
    pub completion_rate: f64,
    /// False when the material's page count is unknown; the completion
    /// rule is skipped rather than flagging every unpaged session.
    pub completion_known: bool,
    pub highlights: u32,
    pub eye_strain: EyeStrainLevel,
    pub blink_rate: f64,
    pub fatigue_score: f64,
}

fn area(name: &str, severity: Severity, message: &str, value: f64) -> ImprovementArea {
    ImprovementArea {
        area: name.to_string(),
        severity,
        message: message.to_string(),
        metric_value: value,
    }
}

/// Applies the threshold rules and returns the matches ranked most-severe
/// first; within a severity, rule order is preserved.
pub(crate) fn improvement_areas(inputs: &ImprovementInputs) -> Vec<ImprovementArea> {
    let mut areas = Vec::new();

    if inputs.presence_pct < 80.0 {
        areas.push(area(
            "presence",
            Severity::High,
            "You were away from the camera for a large part of the session. Staying in frame keeps the session productive.",
            inputs.presence_pct,
        ));
    }
    if inputs.average_posture < 70.0 {
        areas.push(area(
            "posture",
            Severity::Medium,
            "Your posture slipped often. Raise your screen and keep your shoulders level.",
            inputs.average_posture,
        ));
    }
    if inputs.completion_known && inputs.completion_rate < 60.0 {
        areas.push(area(
            "completion",
            Severity::High,
            "You covered less than 60% of the material. Plan a follow-up session to finish it.",
            inputs.completion_rate,
        ));
    }
    if inputs.highlights < 5 {
        areas.push(area(
            "highlights",
            Severity::Medium,
            "Few highlights were made. Marking key passages helps retention.",
            inputs.highlights as f64,
        ));
    }
    if inputs.eye_strain == EyeStrainLevel::High {
        areas.push(area(
            "eyeStrain",
            Severity::High,
            "Your blink rate was very low, a sign of eye strain. Look away from the screen regularly.",
            inputs.blink_rate,
        ));
    }
    if inputs.fatigue_score > 60.0 {
        areas.push(area(
            "fatigue",
            Severity::High,
            "Strong fatigue signals were detected. Consider shorter sessions with real breaks.",
            inputs.fatigue_score,
        ));
    }

    areas.sort_by(|a, b| b.severity.cmp(&a.severity));
    areas
}
