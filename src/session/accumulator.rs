//! Mutable per-session state: counters, windows, buffers, lifecycle flag.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use log::warn;

use crate::config::EngineConfig;
use crate::models::{
    DetectionSnapshot, MetricSnapshot, SessionEvent, SessionHistory, SessionMeta, SessionReport,
};
use crate::signal::{fuse, BlinkCounter, RateWindow};
use crate::store::MetricKind;

/// One buffered record awaiting flush to the persistence collaborator.
#[derive(Debug, Clone)]
pub(crate) struct PendingRecord {
    pub kind: MetricKind,
    pub payload: serde_json::Value,
}

/// Owns everything mutable about one active session. Created on session
/// start, fed on every frame, drained by the flush loop, and frozen at
/// session end: once `ended` is set, every mutation is a no-op.
pub struct SessionAccumulator {
    session_id: String,
    started_at: DateTime<Utc>,
    meta: SessionMeta,
    frame_count: u64,
    attention: RateWindow,
    blinks: BlinkCounter,
    ring: VecDeque<MetricSnapshot>,
    ring_capacity: usize,
    events: Vec<SessionEvent>,
    pending: VecDeque<PendingRecord>,
    pending_capacity: usize,
    last_snapshot: Option<MetricSnapshot>,
    last_flush: Option<DateTime<Utc>>,
    ended: bool,
    report: Option<SessionReport>,
}

impl SessionAccumulator {
    pub fn new(
        session_id: String,
        meta: SessionMeta,
        started_at: DateTime<Utc>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            session_id,
            started_at,
            meta,
            frame_count: 0,
            attention: RateWindow::new(config.attention_window()),
            blinks: BlinkCounter::new(started_at, config.blink_debounce()),
            ring: VecDeque::with_capacity(config.snapshot_ring_capacity),
            ring_capacity: config.snapshot_ring_capacity,
            events: Vec::new(),
            pending: VecDeque::new(),
            pending_capacity: config.pending_buffer_capacity,
            last_snapshot: None,
            last_flush: None,
            ended: false,
            report: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn cached_report(&self) -> Option<&SessionReport> {
        self.report.as_ref()
    }

    pub fn last_flush(&self) -> Option<DateTime<Utc>> {
        self.last_flush
    }

    /// Fuses one frame into the session. On an ended session the frame is
    /// still fused (the result is returned to the caller) but nothing is
    /// recorded.
    pub fn apply_frame(
        &mut self,
        config: &EngineConfig,
        detection: &DetectionSnapshot,
        now: DateTime<Utc>,
    ) -> MetricSnapshot {
        let snapshot = fuse(detection, self.last_snapshot.as_ref(), config, now);
        if self.ended {
            return snapshot;
        }

        self.frame_count += 1;
        self.attention.record(now, snapshot.attentive());
        self.attention.purge(now);
        if snapshot.blink_detected {
            self.blinks.observe(now);
        }

        // Only emit to the persistence buffer when the detection results
        // materially changed since the previous snapshot.
        let changed = self
            .last_snapshot
            .as_ref()
            .map(|prev| !prev.same_signals(&snapshot))
            .unwrap_or(true);
        if changed {
            self.push_pending(MetricKind::Snapshot, &snapshot);
        }

        self.ring.push_back(snapshot.clone());
        while self.ring.len() > self.ring_capacity {
            self.ring.pop_front();
        }
        self.last_snapshot = Some(snapshot.clone());

        snapshot
    }

    pub fn record_event(&mut self, event: SessionEvent) {
        if self.ended {
            return;
        }
        self.push_pending(MetricKind::Event, &event);
        self.events.push(event);
    }

    fn push_pending<T: serde::Serialize>(&mut self, kind: MetricKind, value: &T) {
        match serde_json::to_value(value) {
            Ok(payload) => {
                self.pending.push_back(PendingRecord { kind, payload });
                while self.pending.len() > self.pending_capacity {
                    self.pending.pop_front();
                }
            }
            Err(err) => warn!("failed to serialize {} record: {err}", kind.as_str()),
        }
    }

    /// Hands the whole unsent buffer to the flush path and stamps the
    /// flush time.
    pub(crate) fn drain_pending(&mut self, now: DateTime<Utc>) -> Vec<PendingRecord> {
        self.last_flush = Some(now);
        self.pending.drain(..).collect()
    }

    /// Puts records a failed flush could not deliver back at the front of
    /// the buffer, oldest-first, so the next tick retries them in order.
    /// The buffer cap still holds; the oldest records beyond it are lost.
    pub(crate) fn requeue(&mut self, records: Vec<PendingRecord>) {
        for record in records.into_iter().rev() {
            self.pending.push_front(record);
        }
        while self.pending.len() > self.pending_capacity {
            self.pending.pop_front();
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn attention_rate(&mut self, now: DateTime<Utc>) -> u32 {
        self.attention.rate(now)
    }

    pub fn blink_rate(&self, now: DateTime<Utc>) -> f64 {
        self.blinks.rate_per_minute(now)
    }

    pub fn blink_count(&self) -> u64 {
        self.blinks.total()
    }

    pub fn engagement_score(&self) -> f64 {
        self.last_snapshot
            .as_ref()
            .map(|s| s.engagement_score)
            .unwrap_or(0.0)
    }

    /// Freezes the accumulated state into the aggregator input.
    pub fn history(&self, ended_at: DateTime<Utc>) -> SessionHistory {
        SessionHistory {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            ended_at,
            meta: self.meta.clone(),
            snapshots: self.ring.iter().cloned().collect(),
            events: self.events.clone(),
        }
    }

    pub fn mark_ended(&mut self, report: SessionReport) {
        self.ended = true;
        self.report = Some(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FaceDetection, SessionEventKind};
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn accumulator(config: &EngineConfig) -> SessionAccumulator {
        SessionAccumulator::new("s1".into(), SessionMeta::default(), at(0), config)
    }

    fn face_frame() -> DetectionSnapshot {
        DetectionSnapshot {
            face: Some(FaceDetection {
                present: true,
                confidence: 0.9,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn unchanged_frames_emit_once() {
        let config = EngineConfig::default();
        let mut acc = accumulator(&config);
        for i in 0..5 {
            acc.apply_frame(&config, &face_frame(), at(i * 100));
        }
        assert_eq!(acc.frame_count(), 5);
        // Identical signal fields: only the first frame hits the buffer.
        assert_eq!(acc.pending_len(), 1);

        acc.apply_frame(&config, &DetectionSnapshot::default(), at(600));
        assert_eq!(acc.pending_len(), 2);
    }

    #[test]
    fn ring_buffer_is_bounded() {
        let config = EngineConfig {
            snapshot_ring_capacity: 10,
            ..Default::default()
        };
        let mut acc = accumulator(&config);
        for i in 0..25 {
            acc.apply_frame(&config, &face_frame(), at(i * 100));
        }
        let history = acc.history(at(2_500));
        assert_eq!(history.snapshots.len(), 10);
        assert_eq!(history.snapshots[0].timestamp, at(1_500));
    }

    #[test]
    fn pending_buffer_drops_oldest_beyond_cap() {
        let config = EngineConfig {
            pending_buffer_capacity: 3,
            ..Default::default()
        };
        let mut acc = accumulator(&config);
        for i in 0..5 {
            acc.record_event(SessionEvent::new(
                at(i * 100),
                SessionEventKind::PageVisited { page: i as u32 },
            ));
        }
        assert_eq!(acc.pending_len(), 3);
        let drained = acc.drain_pending(at(1_000));
        assert_eq!(drained.len(), 3);
        assert_eq!(acc.pending_len(), 0);
        assert_eq!(acc.last_flush(), Some(at(1_000)));
    }

    #[test]
    fn requeue_preserves_order_under_cap() {
        let config = EngineConfig {
            pending_buffer_capacity: 4,
            ..Default::default()
        };
        let mut acc = accumulator(&config);
        for i in 0..3 {
            acc.record_event(SessionEvent::new(
                at(i * 100),
                SessionEventKind::HighlightCreated,
            ));
        }
        let drained = acc.drain_pending(at(500));
        acc.record_event(SessionEvent::new(at(600), SessionEventKind::Yawn));
        acc.requeue(drained);

        let replay = acc.drain_pending(at(700));
        assert_eq!(replay.len(), 4);
        // Requeued records come back first, then the newly buffered one.
        assert_eq!(replay[3].payload["kind"], "yawn");
    }

    #[test]
    fn mutations_after_end_are_no_ops() {
        let config = EngineConfig::default();
        let mut acc = accumulator(&config);
        acc.apply_frame(&config, &face_frame(), at(0));

        let history = acc.history(at(1_000));
        let report = crate::analytics::build_session_report(&history);
        acc.mark_ended(report);

        let fused = acc.apply_frame(&config, &face_frame(), at(1_100));
        assert!(fused.face_detected, "fusion still answers");
        acc.record_event(SessionEvent::new(at(1_200), SessionEventKind::Yawn));

        assert_eq!(acc.frame_count(), 1);
        assert_eq!(acc.history(at(2_000)).events.len(), 0);
        assert!(acc.is_ended());
        assert!(acc.cached_report().is_some());
    }

    #[test]
    fn attention_rate_reflects_window_contents() {
        let config = EngineConfig::default();
        let mut acc = accumulator(&config);
        // Face present but no mesh: present yet not looking, so 0%.
        for i in 0..10 {
            acc.apply_frame(&config, &face_frame(), at(i * 100));
        }
        assert_eq!(acc.attention_rate(at(1_000)), 0);
    }
}
