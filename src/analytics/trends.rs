//! Cross-session progress summary.

use serde::{Deserialize, Serialize};

use crate::models::{SessionReport, Trend};

/// Rollup over a chronological sequence of session reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSessionSummary {
    pub sessions: u32,
    pub average_engagement: f64,
    pub average_productivity: f64,
    pub average_health: f64,
    pub trend: Trend,
    /// Improvement areas seen in at least half the sessions, most frequent
    /// first.
    pub recurring_improvement_areas: Vec<String>,
}

impl MultiSessionSummary {
    pub fn empty() -> Self {
        Self {
            sessions: 0,
            average_engagement: 0.0,
            average_productivity: 0.0,
            average_health: 0.0,
            trend: Trend::Stable,
            recurring_improvement_areas: Vec::new(),
        }
    }
}

/// Summarizes reports in the order given (expected oldest first). Pure and
/// deterministic.
pub fn summarize_sessions(reports: &[SessionReport]) -> MultiSessionSummary {
    summarize_sessions_with(reports, 5.0)
}

pub fn summarize_sessions_with(reports: &[SessionReport], dead_band: f64) -> MultiSessionSummary {
    if reports.is_empty() {
        return MultiSessionSummary::empty();
    }

    let n = reports.len() as f64;
    let average_engagement =
        reports.iter().map(|r| r.engagement.weighted_score).sum::<f64>() / n;
    let average_productivity = reports
        .iter()
        .map(|r| r.performance.productivity_score)
        .sum::<f64>()
        / n;
    let average_health = reports.iter().map(|r| r.health.health_score).sum::<f64>() / n;

    let trend = if reports.len() < 2 {
        Trend::Stable
    } else {
        let mid = reports.len() / 2;
        let first = reports[..mid]
            .iter()
            .map(|r| r.engagement.weighted_score)
            .sum::<f64>()
            / mid as f64;
        let second = reports[mid..]
            .iter()
            .map(|r| r.engagement.weighted_score)
            .sum::<f64>()
            / (reports.len() - mid) as f64;
        let delta = second - first;
        if delta > dead_band {
            Trend::Improving
        } else if delta < -dead_band {
            Trend::Declining
        } else {
            Trend::Stable
        }
    };

    // Count how many sessions flagged each area, preserving first-seen order.
    let mut counts: Vec<(String, usize)> = Vec::new();
    for report in reports {
        let mut seen: Vec<&str> = Vec::new();
        for improvement in &report.performance.improvement_areas {
            if seen.contains(&improvement.area.as_str()) {
                continue;
            }
            seen.push(&improvement.area);
            match counts.iter_mut().find(|(name, _)| *name == improvement.area) {
                Some((_, count)) => *count += 1,
                None => counts.push((improvement.area.clone(), 1)),
            }
        }
    }
    let threshold = reports.len().div_ceil(2);
    let mut recurring: Vec<(String, usize)> = counts
        .into_iter()
        .filter(|(_, count)| *count >= threshold)
        .collect();
    recurring.sort_by(|a, b| b.1.cmp(&a.1));
    let recurring_improvement_areas = recurring.into_iter().map(|(name, _)| name).collect();

    MultiSessionSummary {
        sessions: reports.len() as u32,
        average_engagement,
        average_productivity,
        average_health,
        trend,
        recurring_improvement_areas,
    }
}
