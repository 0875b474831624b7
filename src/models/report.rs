//! Post-session report types.
//!
//! Produced once, at session end, by the analytics aggregator. All score
//! fields are clamped: 0–100 everywhere except `quiz_readiness` (0–10).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Stable => "stable",
            Trend::Declining => "declining",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EyeStrainLevel {
    Low,
    Moderate,
    High,
}

impl EyeStrainLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EyeStrainLevel::Low => "low",
            EyeStrainLevel::Moderate => "moderate",
            EyeStrainLevel::High => "high",
        }
    }
}

/// Severity of a coaching improvement area. Ordering is by urgency, so
/// areas can be ranked most-severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Medium,
    High,
}

/// A contiguous stretch of the session with its mean engagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodStats {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub average_engagement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementReport {
    pub average_score: f64,
    /// Weighted composite per the product formula; the primary session score.
    pub weighted_score: f64,
    pub trend: Trend,
    pub best_period: Option<PeriodStats>,
    pub worst_period: Option<PeriodStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionReport {
    /// Percentage of samples flagged attentive (present + looking).
    pub focus_rate: f64,
    pub span_count: u32,
    pub average_span_secs: f64,
    pub longest_span_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub average_posture: f64,
    pub blink_rate: f64,
    pub eye_strain: EyeStrainLevel,
    pub fatigue_score: f64,
    pub health_score: f64,
    pub recommended_breaks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistractionReport {
    pub count: u32,
    pub rate_per_hour: f64,
    pub phone: u32,
    pub looking_away: u32,
    pub absence: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentReport {
    pub pages_visited: u32,
    pub highlights: u32,
    pub annotations: u32,
    pub completion_rate: f64,
}

/// One ranked coaching entry; `message` is shown to the learner verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImprovementArea {
    pub area: String,
    pub severity: Severity,
    pub message: String,
    pub metric_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub quiz_readiness: f64,
    pub retention_estimate: f64,
    pub productivity_score: f64,
    pub improvement_areas: Vec<ImprovementArea>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_minutes: f64,
    pub engagement: EngagementReport,
    pub attention: AttentionReport,
    pub health: HealthReport,
    pub distraction: DistractionReport,
    pub content: ContentReport,
    pub performance: PerformanceReport,
}
