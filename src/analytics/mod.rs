pub mod aggregator;
pub mod config;
mod improvement;
pub mod trends;

pub use aggregator::{build_session_report, build_session_report_with};
pub use config::AnalyticsConfig;
pub use trends::{summarize_sessions, summarize_sessions_with, MultiSessionSummary};
