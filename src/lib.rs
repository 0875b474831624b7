//! Real-time study engagement analytics.
//!
//! Fuses noisy per-frame sensing signals (face presence, gaze and blink
//! state, body-pose geometry, detected objects) into bounded engagement,
//! posture, and attention metrics; manages session lifecycle with
//! throttled, idempotent persistence; and rolls finished sessions up into
//! coaching reports.
//!
//! The typical wiring: implement [`signal::DetectionSource`] over your
//! detector backends, open a [`store::SqliteStore`] (or any
//! [`store::MetricStore`]), and drive a [`session::SessionEngine`].

pub mod analytics;
pub mod config;
pub mod models;
pub mod session;
pub mod signal;
pub mod store;
mod utils;

pub use analytics::{build_session_report, summarize_sessions, MultiSessionSummary};
pub use config::{ConfigStore, EngineConfig};
pub use models::{
    DetectionSnapshot, MetricSnapshot, SessionEvent, SessionEventKind, SessionHistory,
    SessionMeta, SessionReport,
};
pub use session::SessionEngine;
pub use signal::DetectionSource;
pub use store::{MetricStore, SqliteStore};
