//! Persistence collaborator contract and its SQLite implementation.
//!
//! The engine only depends on the `MetricStore` trait; the bundled
//! `SqliteStore` satisfies it with a worker-thread-backed database. The
//! idempotent-end contract is carried by the `AlreadyEnded` sentinel:
//! implementations return it when a terminal session is ended again, and
//! the engine treats it as success.

use std::fmt;
use std::future::Future;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{Session, SessionReport};

mod helpers;
mod migrations;
mod repositories;
mod sqlite;

pub use sqlite::SqliteStore;

/// What a metric record row holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Snapshot,
    Event,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Snapshot => "snapshot",
            MetricKind::Event => "event",
        }
    }
}

/// Sentinel error for ending a session that is already in a terminal
/// state. Callers must treat it as success, not failure.
#[derive(Debug, Clone, Copy)]
pub struct AlreadyEnded;

impl fmt::Display for AlreadyEnded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session already ended")
    }
}

impl std::error::Error for AlreadyEnded {}

/// Whether an error (anywhere in its context chain) is the idempotent-end
/// sentinel.
pub fn is_already_ended(err: &anyhow::Error) -> bool {
    err.downcast_ref::<AlreadyEnded>().is_some()
}

/// Persistence collaborator. Handles must be cheap to clone; every method
/// may fail transiently and the engine retries on its own cadence.
pub trait MetricStore: Clone + Send + Sync + 'static {
    fn create_session(&self, session: &Session) -> impl Future<Output = Result<()>> + Send;

    fn save_metric(
        &self,
        session_id: &str,
        kind: MetricKind,
        payload: serde_json::Value,
    ) -> impl Future<Output = Result<()>> + Send;

    fn save_report(
        &self,
        session_id: &str,
        report: &SessionReport,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Must fail with `AlreadyEnded` (not a generic error) when the session
    /// already reached a terminal state.
    fn end_session(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl MetricStore for SqliteStore {
    async fn create_session(&self, session: &Session) -> Result<()> {
        self.insert_session(session).await
    }

    async fn save_metric(
        &self,
        session_id: &str,
        kind: MetricKind,
        payload: serde_json::Value,
    ) -> Result<()> {
        self.insert_metric_record(session_id, kind, payload).await
    }

    async fn save_report(&self, session_id: &str, report: &SessionReport) -> Result<()> {
        self.insert_report(session_id, report).await
    }

    async fn end_session(&self, session_id: &str, ended_at: DateTime<Utc>) -> Result<()> {
        self.mark_session_ended(session_id, ended_at).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricSnapshot, PostureQuality, SessionStatus};
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn session(id: &str, status: SessionStatus) -> Session {
        Session {
            id: id.to_string(),
            started_at: at(0),
            ended_at: None,
            status,
            material_id: Some("chapter-3".into()),
            total_pages: 12,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    fn snapshot(ms: i64) -> MetricSnapshot {
        MetricSnapshot {
            timestamp: at(ms),
            face_detected: true,
            looking_at_screen: true,
            eye_aspect_ratio: 0.32,
            blink_detected: false,
            posture_score: 85.0,
            neck_angle: 5.0,
            back_angle: 4.0,
            shoulder_alignment: 0.97,
            posture_quality: PostureQuality::Good,
            has_phone: false,
            engagement_score: 100.0,
        }
    }

    #[tokio::test]
    async fn ending_twice_yields_the_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test.sqlite3")).unwrap();

        store
            .create_session(&session("s1", SessionStatus::Active))
            .await
            .unwrap();
        store.end_session("s1", at(60_000)).await.unwrap();

        let err = store.end_session("s1", at(61_000)).await.unwrap_err();
        assert!(is_already_ended(&err));

        let stored = store.get_session("s1").await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
        assert_eq!(stored.ended_at, Some(at(60_000)), "first end wins");
    }

    #[tokio::test]
    async fn ending_a_missing_session_is_a_real_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test.sqlite3")).unwrap();

        let err = store.end_session("ghost", at(0)).await.unwrap_err();
        assert!(!is_already_ended(&err));
    }

    #[tokio::test]
    async fn history_round_trips_snapshots_and_events() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test.sqlite3")).unwrap();

        store
            .create_session(&session("s1", SessionStatus::Active))
            .await
            .unwrap();
        for i in 0..3 {
            store
                .save_metric(
                    "s1",
                    MetricKind::Snapshot,
                    serde_json::to_value(snapshot(i * 100)).unwrap(),
                )
                .await
                .unwrap();
        }
        let event = crate::models::SessionEvent::new(
            at(250),
            crate::models::SessionEventKind::PageVisited { page: 4 },
        );
        store
            .save_metric("s1", MetricKind::Event, serde_json::to_value(&event).unwrap())
            .await
            .unwrap();
        store.end_session("s1", at(60_000)).await.unwrap();

        let history = store.load_history("s1").await.unwrap();
        assert_eq!(history.snapshots.len(), 3);
        assert_eq!(history.events, vec![event]);
        assert_eq!(history.meta.total_pages, 12);
        assert_eq!(history.ended_at, at(60_000));
    }

    #[tokio::test]
    async fn reopening_marks_stale_active_sessions_interrupted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite3");

        {
            let store = SqliteStore::open(path.clone()).unwrap();
            store
                .create_session(&session("crashed", SessionStatus::Active))
                .await
                .unwrap();
        }

        let store = SqliteStore::open(path).unwrap();
        let stored = store.get_session("crashed").await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Interrupted);
        assert!(stored.ended_at.is_some());
    }

    #[tokio::test]
    async fn report_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test.sqlite3")).unwrap();

        store
            .create_session(&session("s1", SessionStatus::Active))
            .await
            .unwrap();

        let history = crate::models::SessionHistory {
            session_id: "s1".into(),
            started_at: at(0),
            ended_at: at(600_000),
            meta: Default::default(),
            snapshots: vec![snapshot(0), snapshot(100)],
            events: Vec::new(),
        };
        let report = crate::analytics::build_session_report(&history);

        store.save_report("s1", &report).await.unwrap();
        let loaded = store.get_report("s1").await.unwrap().unwrap();
        assert_eq!(loaded, report);
    }
}
