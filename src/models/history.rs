//! Immutable session history, the input to the post-session aggregator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::SessionEvent;
use super::metric::MetricSnapshot;
use super::session::SessionMeta;

/// Everything accumulated over one session, frozen at session end (or
/// reloaded from the store for offline re-analysis). The aggregator is a
/// pure function of this value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHistory {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub meta: SessionMeta,
    pub snapshots: Vec<MetricSnapshot>,
    pub events: Vec<SessionEvent>,
}

impl SessionHistory {
    pub fn duration_minutes(&self) -> f64 {
        (self.ended_at - self.started_at).num_milliseconds() as f64 / 60_000.0
    }
}
