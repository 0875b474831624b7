//! Engine configuration with tunable thresholds, plus the JSON-file-backed
//! store used for user-facing overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Sense tick driving frame fusion (milliseconds).
    pub sense_interval_ms: u64,
    /// Persistence flush cadence (milliseconds), decoupled from the sense tick.
    pub flush_interval_ms: u64,
    /// Trailing window for the attention rate (seconds).
    pub attention_window_secs: u64,
    /// Minimum gap between counted blinks (milliseconds).
    pub blink_debounce_ms: i64,
    /// In-memory snapshot ring buffer size per session.
    pub snapshot_ring_capacity: usize,
    /// Cap on buffered-but-unsent records awaiting flush.
    pub pending_buffer_capacity: usize,
    /// Gaze offset below which the subject counts as looking at the screen.
    pub gaze_threshold: f64,
    /// Eye-aspect-ratio below which the eyes count as closed.
    pub blink_ear_threshold: f64,
    /// Minimum face-detector confidence to accept a presence result.
    pub face_confidence_threshold: f64,
    /// Minimum object-detector confidence for a phone sighting.
    pub phone_confidence_threshold: f64,
    /// Posture score above which posture contributes to engagement.
    pub posture_engagement_cutoff: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sense_interval_ms: 100,
            flush_interval_ms: 4_000,
            attention_window_secs: 60,
            blink_debounce_ms: 200,
            snapshot_ring_capacity: 1_000,
            pending_buffer_capacity: 600,
            gaze_threshold: 0.3,
            blink_ear_threshold: 0.2,
            face_confidence_threshold: 0.5,
            phone_confidence_threshold: 0.5,
            posture_engagement_cutoff: 70.0,
        }
    }
}

impl EngineConfig {
    pub fn sense_interval(&self) -> Duration {
        Duration::from_millis(self.sense_interval_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// A detector call that has not returned within one sense tick is
    /// treated as absent for that frame.
    pub fn detector_timeout(&self) -> Duration {
        self.sense_interval()
    }

    pub fn attention_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.attention_window_secs as i64)
    }

    pub fn blink_debounce(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.blink_debounce_ms)
    }
}

/// File-backed configuration store. Reads fall back to defaults when the
/// file is missing or unparsable; updates are persisted immediately.
pub struct ConfigStore {
    path: PathBuf,
    data: RwLock<EngineConfig>,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            EngineConfig::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        self.data.read().unwrap().clone()
    }

    pub fn update(&self, config: EngineConfig) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        *guard = config;
        self.persist(&guard)
    }

    fn persist(&self, data: &EngineConfig) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("failed to write config to {}", self.path.display()))
    }
}
