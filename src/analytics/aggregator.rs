//! Post-session analytics.
//!
//! `build_session_report` is a pure function of a session's accumulated
//! history: run twice on the same history it produces identical output.
//! Nothing here consults the wall clock.

use chrono::{DateTime, Duration, Utc};

use crate::models::{
    AttentionReport, ContentReport, DistractionReport, EngagementReport, EyeStrainLevel,
    HealthReport, MetricSnapshot, PeriodStats, PerformanceReport, SessionEventKind,
    SessionHistory, SessionReport, Trend,
};

use super::config::AnalyticsConfig;
use super::improvement::{improvement_areas, ImprovementInputs};

pub fn build_session_report(history: &SessionHistory) -> SessionReport {
    build_session_report_with(history, &AnalyticsConfig::default())
}

pub fn build_session_report_with(
    history: &SessionHistory,
    config: &AnalyticsConfig,
) -> SessionReport {
    let snapshots = &history.snapshots;
    let duration_min = history.duration_minutes().max(0.0);
    let duration_hours = duration_min / 60.0;

    let presence_pct = percentage(snapshots, |s| s.face_detected);
    let focus_rate = percentage(snapshots, MetricSnapshot::attentive);
    let focus_ratio = focus_rate / 100.0;
    let average_engagement = mean(snapshots, |s| s.engagement_score);
    let average_posture = mean(snapshots, |s| s.posture_score);

    let mut highlights = 0u32;
    let mut annotations = 0u32;
    let mut yawns = 0u32;
    let mut head_drops = 0u32;
    let mut pages: Vec<u32> = Vec::new();
    for event in &history.events {
        match event.kind {
            SessionEventKind::PageVisited { page } => {
                if !pages.contains(&page) {
                    pages.push(page);
                }
            }
            SessionEventKind::HighlightCreated => highlights += 1,
            SessionEventKind::AnnotationCreated => annotations += 1,
            SessionEventKind::Yawn => yawns += 1,
            SessionEventKind::HeadDrop => head_drops += 1,
        }
    }
    let pages_visited = pages.len() as u32;
    let interaction_count =
        history.events.iter().filter(|e| e.kind.is_interaction()).count() as f64;

    let completion_known = history.meta.total_pages > 0;
    let completion_rate = if completion_known {
        (pages_visited as f64 / history.meta.total_pages as f64 * 100.0).min(100.0)
    } else {
        0.0
    };

    let blink_count = debounced_blink_count(snapshots, config.blink_debounce_ms);
    let blink_rate = blink_count as f64 / duration_min.max(0.1);

    let weighted_engagement = weighted_engagement_score(
        config,
        presence_pct,
        average_posture,
        interaction_count,
        duration_min,
    );
    let fatigue_score = fatigue_score(config, yawns, head_drops, duration_min, duration_hours);
    let health_score = health_score(blink_rate, fatigue_score, average_posture, duration_min);
    let eye_strain = eye_strain_level(blink_rate);

    let (best_period, worst_period) = extreme_periods(history, config);
    let (span_count, average_span_secs, longest_span_secs) = attention_spans(snapshots);
    let distraction = distraction_report(snapshots, config, duration_hours);

    let quiz_readiness = quiz_readiness(
        config,
        completion_rate,
        highlights,
        weighted_engagement,
        duration_min,
        pages_visited,
    );
    let retention_estimate = (weighted_engagement * 0.6
        + (interaction_count / config.interaction_target * 20.0).min(20.0)
        + focus_ratio * 20.0)
        .clamp(0.0, 100.0);
    let productivity_score = (0.40 * weighted_engagement
        + 0.30 * completion_rate
        + 0.30
            * ((highlights + annotations) as f64 / config.highlight_target * 100.0).min(100.0))
    .clamp(0.0, 100.0);

    let improvement = improvement_areas(&ImprovementInputs {
        presence_pct,
        average_posture,
        completion_rate,
        completion_known,
        highlights,
        eye_strain,
        blink_rate,
        fatigue_score,
    });

    let recommended_breaks = if duration_min <= 0.0 {
        0
    } else {
        (duration_min / config.break_interval_min).ceil() as u32
            + u32::from(fatigue_score > 60.0)
    };

    SessionReport {
        session_id: history.session_id.clone(),
        started_at: history.started_at,
        ended_at: history.ended_at,
        duration_minutes: duration_min,
        engagement: EngagementReport {
            average_score: average_engagement,
            weighted_score: weighted_engagement,
            trend: engagement_trend(snapshots, config.trend_dead_band),
            best_period,
            worst_period,
        },
        attention: AttentionReport {
            focus_rate,
            span_count,
            average_span_secs,
            longest_span_secs,
        },
        health: HealthReport {
            average_posture,
            blink_rate,
            eye_strain,
            fatigue_score,
            health_score,
            recommended_breaks,
        },
        distraction,
        content: ContentReport {
            pages_visited,
            highlights,
            annotations,
            completion_rate,
        },
        performance: PerformanceReport {
            quiz_readiness,
            retention_estimate,
            productivity_score,
            improvement_areas: improvement,
        },
    }
}

fn mean(snapshots: &[MetricSnapshot], f: impl Fn(&MetricSnapshot) -> f64) -> f64 {
    if snapshots.is_empty() {
        return 0.0;
    }
    snapshots.iter().map(f).sum::<f64>() / snapshots.len() as f64
}

fn percentage(snapshots: &[MetricSnapshot], f: impl Fn(&MetricSnapshot) -> bool) -> f64 {
    if snapshots.is_empty() {
        return 0.0;
    }
    snapshots.iter().filter(|s| f(s)).count() as f64 / snapshots.len() as f64 * 100.0
}

/// Recounts blinks from stored history with the same debounce the live
/// counter applies, so offline reports match live ones.
fn debounced_blink_count(snapshots: &[MetricSnapshot], debounce_ms: i64) -> u64 {
    let debounce = Duration::milliseconds(debounce_ms);
    let mut count = 0u64;
    let mut last_counted: Option<DateTime<Utc>> = None;
    for snapshot in snapshots.iter().filter(|s| s.blink_detected) {
        let counts = match last_counted {
            Some(last) => snapshot.timestamp - last >= debounce,
            None => true,
        };
        if counts {
            last_counted = Some(snapshot.timestamp);
            count += 1;
        }
    }
    count
}

/// Weighted engagement composite: presence, posture, interaction volume,
/// session-length quality, and consistency.
fn weighted_engagement_score(
    config: &AnalyticsConfig,
    presence_pct: f64,
    average_posture: f64,
    interaction_count: f64,
    duration_min: f64,
) -> f64 {
    let normalized_interactions =
        (interaction_count / config.interaction_target * 100.0).min(100.0);
    let duration_score = duration_score(config, duration_min);
    let consistency = if presence_pct > 80.0 && average_posture > 70.0 {
        100.0
    } else {
        70.0
    };

    (config.weight_presence * presence_pct
        + config.weight_posture * average_posture
        + config.weight_interactions * normalized_interactions
        + config.weight_duration * duration_score
        + config.weight_consistency * consistency)
        .clamp(0.0, 100.0)
}

/// Peaks at 100 inside the optimal band, scales linearly up to it, and
/// decays 2 points per minute beyond it down to a floor of 50.
fn duration_score(config: &AnalyticsConfig, duration_min: f64) -> f64 {
    if duration_min < config.optimal_duration_min {
        duration_min / config.optimal_duration_min * 100.0
    } else if duration_min <= config.optimal_duration_max {
        100.0
    } else {
        (100.0 - 2.0 * (duration_min - config.optimal_duration_max)).max(50.0)
    }
}

fn fatigue_score(
    _config: &AnalyticsConfig,
    yawns: u32,
    head_drops: u32,
    duration_min: f64,
    duration_hours: f64,
) -> f64 {
    let (yawns_per_hour, drops_per_hour) = if duration_hours > 0.0 {
        (
            yawns as f64 / duration_hours,
            head_drops as f64 / duration_hours,
        )
    } else {
        (0.0, 0.0)
    };

    let mut score: f64 = 0.0;
    if yawns_per_hour > 6.0 {
        score += 40.0;
    } else if yawns_per_hour > 3.0 {
        score += 20.0;
    }
    if drops_per_hour > 3.0 {
        score += 40.0;
    } else if drops_per_hour > 1.0 {
        score += 20.0;
    }
    if duration_min > 90.0 {
        score += 20.0;
    }
    score.clamp(0.0, 100.0)
}

fn health_score(blink_rate: f64, fatigue_score: f64, average_posture: f64, duration_min: f64) -> f64 {
    let mut score: f64 = 100.0;
    if blink_rate < 10.0 {
        score -= 25.0;
    } else if blink_rate < 12.0 {
        score -= 15.0;
    }
    score -= 0.3 * fatigue_score;
    if average_posture < 60.0 {
        score -= 20.0;
    } else if average_posture < 80.0 {
        score -= 10.0;
    }
    if duration_min > 120.0 {
        score -= 20.0;
    } else if duration_min > 90.0 {
        score -= 10.0;
    }
    score.clamp(0.0, 100.0)
}

fn eye_strain_level(blink_rate: f64) -> EyeStrainLevel {
    if blink_rate >= 12.0 {
        EyeStrainLevel::Low
    } else if blink_rate >= 8.0 {
        EyeStrainLevel::Moderate
    } else {
        EyeStrainLevel::High
    }
}

fn quiz_readiness(
    config: &AnalyticsConfig,
    completion_rate: f64,
    highlights: u32,
    engagement: f64,
    duration_min: f64,
    pages_visited: u32,
) -> f64 {
    let time_score = if pages_visited == 0 {
        0.0
    } else {
        let secs_per_page = duration_min * 60.0 / pages_visited as f64;
        if secs_per_page < config.page_time_min_secs {
            2.0 * secs_per_page / config.page_time_min_secs
        } else if secs_per_page <= config.page_time_max_secs {
            2.0
        } else {
            (2.0 * (1.0 - (secs_per_page - config.page_time_max_secs) / config.page_time_max_secs))
                .max(0.0)
        }
    };

    let score = 3.0 * (completion_rate / 100.0)
        + (highlights as f64 / config.highlight_target).min(1.0) * 2.0
        + 3.0 * (engagement / 100.0)
        + time_score;
    (score.clamp(0.0, 10.0) * 10.0).round() / 10.0
}

/// First-half vs. second-half mean engagement, with a dead band so noise
/// does not read as a trend.
fn engagement_trend(snapshots: &[MetricSnapshot], dead_band: f64) -> Trend {
    if snapshots.len() < 4 {
        return Trend::Stable;
    }
    let mid = snapshots.len() / 2;
    let first = mean(&snapshots[..mid], |s| s.engagement_score);
    let second = mean(&snapshots[mid..], |s| s.engagement_score);
    let delta = second - first;
    if delta > dead_band {
        Trend::Improving
    } else if delta < -dead_band {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Best and worst fixed-width periods by mean engagement. Ties resolve to
/// the earliest bucket so the result is deterministic.
fn extreme_periods(
    history: &SessionHistory,
    config: &AnalyticsConfig,
) -> (Option<PeriodStats>, Option<PeriodStats>) {
    if history.snapshots.is_empty() {
        return (None, None);
    }

    let bucket = config.period_bucket_secs.max(1);
    let mut buckets: Vec<(i64, f64, usize)> = Vec::new();
    for snapshot in &history.snapshots {
        let offset = (snapshot.timestamp - history.started_at).num_seconds().max(0);
        let index = offset / bucket;
        match buckets.iter_mut().find(|(i, _, _)| *i == index) {
            Some((_, sum, n)) => {
                *sum += snapshot.engagement_score;
                *n += 1;
            }
            None => buckets.push((index, snapshot.engagement_score, 1)),
        }
    }

    let stats = |&(index, sum, n): &(i64, f64, usize)| {
        let start = history.started_at + Duration::seconds(index * bucket);
        let end = (start + Duration::seconds(bucket)).min(history.ended_at);
        PeriodStats {
            start,
            end,
            average_engagement: sum / n as f64,
        }
    };

    let best = buckets
        .iter()
        .max_by(|a, b| {
            let (mean_a, mean_b) = (a.1 / a.2 as f64, b.1 / b.2 as f64);
            mean_a
                .partial_cmp(&mean_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.0.cmp(&a.0))
        })
        .map(&stats);
    let worst = buckets
        .iter()
        .min_by(|a, b| {
            let (mean_a, mean_b) = (a.1 / a.2 as f64, b.1 / b.2 as f64);
            mean_a
                .partial_cmp(&mean_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        })
        .map(&stats);

    (best, worst)
}

/// Contiguous attentive runs: count, mean length, longest length.
fn attention_spans(snapshots: &[MetricSnapshot]) -> (u32, f64, f64) {
    let mut spans: Vec<f64> = Vec::new();
    let mut run_start: Option<DateTime<Utc>> = None;
    let mut run_end: Option<DateTime<Utc>> = None;

    for snapshot in snapshots {
        if snapshot.attentive() {
            if run_start.is_none() {
                run_start = Some(snapshot.timestamp);
            }
            run_end = Some(snapshot.timestamp);
        } else if let (Some(start), Some(end)) = (run_start.take(), run_end.take()) {
            spans.push((end - start).num_milliseconds() as f64 / 1_000.0);
        }
    }
    if let (Some(start), Some(end)) = (run_start, run_end) {
        spans.push((end - start).num_milliseconds() as f64 / 1_000.0);
    }

    if spans.is_empty() {
        return (0, 0.0, 0.0);
    }
    let count = spans.len() as u32;
    let average = spans.iter().sum::<f64>() / spans.len() as f64;
    let longest = spans.iter().cloned().fold(0.0, f64::max);
    (count, average, longest)
}

/// Distraction detection from the snapshot stream: phone sightings on the
/// rising edge, plus sustained absence and looking-away spells.
fn distraction_report(
    snapshots: &[MetricSnapshot],
    config: &AnalyticsConfig,
    duration_hours: f64,
) -> DistractionReport {
    let mut phone = 0u32;
    let mut prev_phone = false;
    for snapshot in snapshots {
        if snapshot.has_phone && !prev_phone {
            phone += 1;
        }
        prev_phone = snapshot.has_phone;
    }

    let absence = spell_count(snapshots, config.absence_spell_secs, |s| !s.face_detected);
    let looking_away = spell_count(snapshots, config.looking_away_spell_secs, |s| {
        s.face_detected && !s.looking_at_screen
    });

    let count = phone + absence + looking_away;
    let rate_per_hour = if duration_hours > 0.0 {
        count as f64 / duration_hours
    } else {
        0.0
    };

    DistractionReport {
        count,
        rate_per_hour,
        phone,
        looking_away,
        absence,
    }
}

fn spell_count(
    snapshots: &[MetricSnapshot],
    min_secs: f64,
    predicate: impl Fn(&MetricSnapshot) -> bool,
) -> u32 {
    let mut count = 0u32;
    let mut spell_start: Option<DateTime<Utc>> = None;
    let mut spell_end: Option<DateTime<Utc>> = None;

    let mut close = |start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>| {
        if let (Some(start), Some(end)) = (start, end) {
            if (end - start).num_milliseconds() as f64 / 1_000.0 >= min_secs {
                count += 1;
            }
        }
    };

    for snapshot in snapshots {
        if predicate(snapshot) {
            if spell_start.is_none() {
                spell_start = Some(snapshot.timestamp);
            }
            spell_end = Some(snapshot.timestamp);
        } else {
            close(spell_start.take(), spell_end.take());
        }
    }
    close(spell_start, spell_end);

    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PostureQuality, SessionEvent, SessionMeta, Severity};
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn snapshot(ms: i64) -> MetricSnapshot {
        MetricSnapshot {
            timestamp: at(ms),
            face_detected: true,
            looking_at_screen: true,
            eye_aspect_ratio: 0.32,
            blink_detected: false,
            posture_score: 75.0,
            neck_angle: 8.0,
            back_angle: 5.0,
            shoulder_alignment: 0.95,
            posture_quality: PostureQuality::Good,
            has_phone: false,
            engagement_score: 100.0,
        }
    }

    /// 45-minute session, one snapshot per second, 80% presence, posture
    /// 75, 10 interactions.
    fn reference_history() -> SessionHistory {
        let total = 45 * 60;
        let mut snapshots = Vec::with_capacity(total);
        for i in 0..total {
            let mut s = snapshot(i as i64 * 1_000);
            if i % 5 == 4 {
                // Every fifth sample away from the camera: 80% presence.
                s.face_detected = false;
                s.looking_at_screen = false;
                s.engagement_score = 0.0;
            }
            snapshots.push(s);
        }

        let mut events = Vec::new();
        for page in 0..10u32 {
            events.push(SessionEvent::new(
                at(page as i64 * 240_000),
                SessionEventKind::PageVisited { page },
            ));
        }

        SessionHistory {
            session_id: "ref".into(),
            started_at: at(0),
            ended_at: at(45 * 60 * 1_000),
            meta: SessionMeta {
                material_id: None,
                total_pages: 20,
            },
            snapshots,
            events,
        }
    }

    #[test]
    fn reference_session_reproduces_documented_weighting() {
        let report = build_session_report(&reference_history());

        // presence 80, posture 75 -> consistency 70 (presence not > 80).
        // interactions 10/20 -> 50; duration 45 min -> 100.
        let expected_engagement =
            0.30 * 80.0 + 0.15 * 75.0 + 0.15 * 50.0 + 0.10 * 100.0 + 0.30 * 70.0;
        assert!((report.engagement.weighted_score - expected_engagement).abs() < 1e-9);

        // productivity = 0.40*engagement + 0.30*completion + 0.30*0
        let expected_productivity = 0.40 * expected_engagement + 0.30 * 50.0;
        assert!(
            (report.performance.productivity_score - expected_productivity).abs() < 1e-9,
            "got {}",
            report.performance.productivity_score
        );

        assert_eq!(report.content.pages_visited, 10);
        assert!((report.content.completion_rate - 50.0).abs() < 1e-9);
        assert!((report.attention.focus_rate - 80.0).abs() < 1e-9);
    }

    #[test]
    fn aggregator_is_deterministic() {
        let history = reference_history();
        let first = build_session_report(&history);
        let second = build_session_report(&history);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn fatigue_never_exceeds_100() {
        let config = AnalyticsConfig::default();
        let score = fatigue_score(&config, 500, 500, 200.0, 200.0 / 60.0);
        assert_eq!(score, 100.0);
    }

    #[test]
    fn empty_history_produces_zeroed_report() {
        let history = SessionHistory {
            session_id: "empty".into(),
            started_at: at(0),
            ended_at: at(0),
            meta: SessionMeta::default(),
            snapshots: Vec::new(),
            events: Vec::new(),
        };
        let report = build_session_report(&history);
        assert_eq!(report.engagement.average_score, 0.0);
        assert_eq!(report.attention.focus_rate, 0.0);
        assert_eq!(report.distraction.count, 0);
        assert!(report.engagement.best_period.is_none());
        assert_eq!(report.health.recommended_breaks, 0);
    }

    #[test]
    fn duration_score_band() {
        let config = AnalyticsConfig::default();
        assert!((duration_score(&config, 22.5) - 50.0).abs() < 1e-9);
        assert_eq!(duration_score(&config, 45.0), 100.0);
        assert_eq!(duration_score(&config, 60.0), 100.0);
        assert!((duration_score(&config, 70.0) - 80.0).abs() < 1e-9);
        // Decay floors at 50 no matter how long the session runs.
        assert_eq!(duration_score(&config, 600.0), 50.0);
    }

    #[test]
    fn declining_engagement_is_reported() {
        let mut history = reference_history();
        let n = history.snapshots.len();
        for (i, s) in history.snapshots.iter_mut().enumerate() {
            s.engagement_score = if i < n / 2 { 90.0 } else { 40.0 };
        }
        let report = build_session_report(&history);
        assert_eq!(report.engagement.trend, Trend::Declining);
    }

    #[test]
    fn phone_spells_count_once_per_appearance() {
        let mut history = reference_history();
        // One continuous phone spell across 20 samples.
        for s in history.snapshots[100..120].iter_mut() {
            s.has_phone = true;
        }
        let report = build_session_report(&history);
        assert_eq!(report.distraction.phone, 1);
    }

    #[test]
    fn blink_recount_applies_debounce() {
        let mut history = reference_history();
        // Blink flags 100 ms apart: the second is inside the debounce.
        history.snapshots[10].blink_detected = true;
        history.snapshots[10].timestamp = at(10_000);
        history.snapshots[11].blink_detected = true;
        history.snapshots[11].timestamp = at(10_100);
        history.snapshots[20].blink_detected = true;
        let count = debounced_blink_count(&history.snapshots, 200);
        assert_eq!(count, 2);
    }

    #[test]
    fn fatigue_flags_raise_improvement_area() {
        let mut history = reference_history();
        for i in 0..10 {
            history.events.push(SessionEvent::new(
                at(i * 60_000),
                SessionEventKind::Yawn,
            ));
            history.events.push(SessionEvent::new(
                at(i * 60_000 + 1_000),
                SessionEventKind::HeadDrop,
            ));
        }
        let report = build_session_report(&history);
        // 10 yawns and 10 drops in 45 min are far over both hourly cutoffs.
        assert_eq!(report.health.fatigue_score, 80.0);
        assert!(report
            .performance
            .improvement_areas
            .iter()
            .any(|a| a.area == "fatigue" && a.severity == Severity::High));
    }
}
