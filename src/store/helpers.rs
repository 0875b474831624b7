use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::models::SessionStatus;

use super::MetricKind;

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_status(value: &str) -> Result<SessionStatus> {
    match value {
        "Active" => Ok(SessionStatus::Active),
        "Completed" => Ok(SessionStatus::Completed),
        "Interrupted" => Ok(SessionStatus::Interrupted),
        other => Err(anyhow!("unknown session status {other}")),
    }
}

pub fn parse_kind(value: &str) -> Result<MetricKind> {
    match value {
        "snapshot" => Ok(MetricKind::Snapshot),
        "event" => Ok(MetricKind::Event),
        other => Err(anyhow!("unknown metric record kind {other}")),
    }
}
