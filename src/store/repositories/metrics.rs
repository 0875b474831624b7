use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::models::{MetricSnapshot, SessionEvent, SessionHistory, SessionMeta, SessionReport};
use crate::store::helpers::parse_kind;
use crate::store::sqlite::SqliteStore;
use crate::store::MetricKind;

impl SqliteStore {
    pub async fn insert_metric_record(
        &self,
        session_id: &str,
        kind: MetricKind,
        payload: serde_json::Value,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        let recorded_at = payload
            .get("timestamp")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO metric_records (session_id, kind, recorded_at, payload)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    session_id,
                    kind.as_str(),
                    recorded_at,
                    serde_json::to_string(&payload)?,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn insert_report(&self, session_id: &str, report: &SessionReport) -> Result<()> {
        let session_id = session_id.to_string();
        let payload = serde_json::to_string(report).context("failed to serialize report")?;
        self.execute(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO session_reports (session_id, created_at, payload)
                 VALUES (?1, ?2, ?3)",
                params![session_id, Utc::now().to_rfc3339(), payload],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_report(&self, session_id: &str) -> Result<Option<SessionReport>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let payload: Option<String> = conn
                .query_row(
                    "SELECT payload FROM session_reports WHERE session_id = ?1",
                    params![session_id],
                    |row| row.get(0),
                )
                .optional()?;

            payload
                .map(|raw| {
                    serde_json::from_str(&raw).context("failed to deserialize stored report")
                })
                .transpose()
        })
        .await
    }

    /// Reassembles a stored session's history for offline re-analysis.
    pub async fn load_history(&self, session_id: &str) -> Result<SessionHistory> {
        let session = self
            .get_session(session_id)
            .await?
            .ok_or_else(|| anyhow!("session {session_id} not found"))?;

        let owned_id = session_id.to_string();
        let (snapshots, events) = self
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT kind, payload FROM metric_records
                     WHERE session_id = ?1
                     ORDER BY id ASC",
                )?;

                let mut rows = stmt.query(params![owned_id])?;
                let mut snapshots: Vec<MetricSnapshot> = Vec::new();
                let mut events: Vec<SessionEvent> = Vec::new();
                while let Some(row) = rows.next()? {
                    let kind: String = row.get(0)?;
                    let payload: String = row.get(1)?;
                    match parse_kind(&kind)? {
                        MetricKind::Snapshot => snapshots.push(
                            serde_json::from_str(&payload)
                                .context("failed to deserialize stored snapshot")?,
                        ),
                        MetricKind::Event => events.push(
                            serde_json::from_str(&payload)
                                .context("failed to deserialize stored event")?,
                        ),
                    }
                }

                Ok((snapshots, events))
            })
            .await?;

        Ok(SessionHistory {
            session_id: session.id.clone(),
            started_at: session.started_at,
            ended_at: session.ended_at.unwrap_or(session.updated_at),
            meta: SessionMeta {
                material_id: session.material_id,
                total_pages: session.total_pages,
            },
            snapshots,
            events,
        })
    }
}
