//! Content and behavior events recorded alongside metric snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Something that happened during the session beyond the per-frame signal
/// stream: content interactions fed by the surrounding app, and fatigue
/// markers fed by its detectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SessionEventKind {
    PageVisited { page: u32 },
    HighlightCreated,
    AnnotationCreated,
    Yawn,
    HeadDrop,
}

impl SessionEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEventKind::PageVisited { .. } => "pageVisited",
            SessionEventKind::HighlightCreated => "highlightCreated",
            SessionEventKind::AnnotationCreated => "annotationCreated",
            SessionEventKind::Yawn => "yawn",
            SessionEventKind::HeadDrop => "headDrop",
        }
    }

    /// Content interactions count toward the engagement and productivity
    /// interaction totals; fatigue markers do not.
    pub fn is_interaction(&self) -> bool {
        matches!(
            self,
            SessionEventKind::PageVisited { .. }
                | SessionEventKind::HighlightCreated
                | SessionEventKind::AnnotationCreated
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: SessionEventKind,
}

impl SessionEvent {
    pub fn new(timestamp: DateTime<Utc>, kind: SessionEventKind) -> Self {
        Self { timestamp, kind }
    }
}
