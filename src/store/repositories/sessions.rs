use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::models::{Session, SessionStatus};
use crate::store::helpers::{parse_datetime, parse_optional_datetime, parse_status};
use crate::store::sqlite::SqliteStore;
use crate::store::AlreadyEnded;

fn row_to_session(row: &Row) -> Result<Session> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let status: String = row.get("status")?;
    let total_pages: i64 = row.get("total_pages")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Session {
        id: row.get("id")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
        status: parse_status(&status)?,
        material_id: row.get("material_id")?,
        total_pages: u32::try_from(total_pages)
            .map_err(|_| anyhow!("total_pages contains invalid value {total_pages}"))?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl SqliteStore {
    pub async fn insert_session(&self, session: &Session) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, started_at, ended_at, status, material_id, total_pages, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.started_at.to_rfc3339(),
                    record.ended_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.status.as_str(),
                    record.material_id,
                    i64::from(record.total_pages),
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, started_at, ended_at, status, material_id, total_pages, created_at, updated_at
                 FROM sessions
                 WHERE id = ?1",
            )?;

            let mut rows = stmt.query(params![session_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_session(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn list_sessions_paginated(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Session>> {
        let limit = limit as i64;
        let offset = offset as i64;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, started_at, ended_at, status, material_id, total_pages, created_at, updated_at
                 FROM sessions
                 WHERE status IN ('Completed', 'Interrupted')
                 ORDER BY started_at DESC
                 LIMIT ?1 OFFSET ?2",
            )?;

            let mut rows = stmt.query(params![limit, offset])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }

            Ok(sessions)
        })
        .await
    }

    /// Marks the session completed. Ending a session that already reached a
    /// terminal status yields the `AlreadyEnded` sentinel, which callers
    /// honoring the idempotent-end contract treat as success.
    pub async fn mark_session_ended(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let affected = conn.execute(
                "UPDATE sessions
                 SET status = ?1,
                     ended_at = ?2,
                     updated_at = ?3
                 WHERE id = ?4 AND status = 'Active'",
                params![
                    SessionStatus::Completed.as_str(),
                    ended_at.to_rfc3339(),
                    ended_at.to_rfc3339(),
                    session_id,
                ],
            )?;

            if affected == 0 {
                let exists: Option<String> = conn
                    .query_row(
                        "SELECT status FROM sessions WHERE id = ?1",
                        params![session_id],
                        |row| row.get(0),
                    )
                    .optional()?;

                return match exists {
                    Some(_) => Err(anyhow::Error::new(AlreadyEnded)),
                    None => Err(anyhow!("session {session_id} not found")),
                };
            }

            Ok(())
        })
        .await
    }

    /// Deletes a session; dependent metric records and the stored report go
    /// with it via ON DELETE CASCADE.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
            Ok(())
        })
        .await
    }
}
