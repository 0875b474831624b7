//! Session lifecycle engine.
//!
//! Owns the two periodic activities of an active session: the fast sense
//! loop (detector fan-out + frame fusion) and the slower flush loop
//! (buffer drain into the persistence store). Termination cancels both
//! loops, flushes once, and is idempotent: every later `end_session` call
//! returns the cached report without further side effects.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::analytics::build_session_report;
use crate::config::EngineConfig;
use crate::models::{
    DetectionSnapshot, MetricSnapshot, Session, SessionEvent, SessionMeta, SessionReport,
    SessionStatus,
};
use crate::signal::{gather_frame, DetectionSource};
use crate::store::{is_already_ended, MetricStore};

use super::accumulator::SessionAccumulator;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

struct SessionTasks {
    cancel: CancellationToken,
    sense: JoinHandle<()>,
    flush: JoinHandle<()>,
}

type SharedState = Arc<Mutex<Option<SessionAccumulator>>>;

/// The engine surface consumed by the surrounding app. Cheap to clone;
/// all clones share the same session state.
pub struct SessionEngine<D: DetectionSource, S: MetricStore> {
    config: EngineConfig,
    source: Arc<D>,
    store: S,
    state: SharedState,
    tasks: Arc<Mutex<Option<SessionTasks>>>,
    end_lock: Arc<Mutex<()>>,
}

impl<D: DetectionSource, S: MetricStore> Clone for SessionEngine<D, S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            source: Arc::clone(&self.source),
            store: self.store.clone(),
            state: Arc::clone(&self.state),
            tasks: Arc::clone(&self.tasks),
            end_lock: Arc::clone(&self.end_lock),
        }
    }
}

impl<D: DetectionSource, S: MetricStore> SessionEngine<D, S> {
    pub fn new(source: D, store: S, config: EngineConfig) -> Self {
        Self {
            config,
            source: Arc::new(source),
            store,
            state: Arc::new(Mutex::new(None)),
            tasks: Arc::new(Mutex::new(None)),
            end_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Starts a session: persists the session row, allocates the
    /// accumulator, and spawns the sense and flush loops.
    pub async fn start_session(&self, meta: SessionMeta) -> Result<String> {
        {
            let state = self.state.lock().await;
            if state.as_ref().map(|acc| !acc.is_ended()).unwrap_or(false) {
                bail!("session already active");
            }
        }

        let session_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();

        let session = Session {
            id: session_id.clone(),
            started_at,
            ended_at: None,
            status: SessionStatus::Active,
            material_id: meta.material_id.clone(),
            total_pages: meta.total_pages,
            created_at: started_at,
            updated_at: started_at,
        };
        self.store
            .create_session(&session)
            .await
            .context("failed to start session")?;

        {
            let mut state = self.state.lock().await;
            *state = Some(SessionAccumulator::new(
                session_id.clone(),
                meta,
                started_at,
                &self.config,
            ));
        }

        self.spawn_loops(session_id.clone()).await;
        log_info!("session {session_id} started");

        Ok(session_id)
    }

    /// Fuses one frame of externally gathered detections into the active
    /// session. The sense loop uses the same path with its own detections.
    pub async fn record_frame(&self, detections: &DetectionSnapshot) -> Result<MetricSnapshot> {
        let mut state = self.state.lock().await;
        match state.as_mut() {
            Some(acc) => Ok(acc.apply_frame(&self.config, detections, Utc::now())),
            None => bail!("no active session"),
        }
    }

    pub async fn record_event(&self, event: SessionEvent) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.as_mut() {
            Some(acc) => {
                acc.record_event(event);
                Ok(())
            }
            None => bail!("no active session"),
        }
    }

    /// Attentive percentage over the trailing window; 0 with no session.
    pub async fn attention_rate(&self) -> u32 {
        let mut state = self.state.lock().await;
        state
            .as_mut()
            .map(|acc| acc.attention_rate(Utc::now()))
            .unwrap_or(0)
    }

    /// Debounced blinks per minute; 0.0 with no session.
    pub async fn blink_rate(&self) -> f64 {
        let state = self.state.lock().await;
        state
            .as_ref()
            .map(|acc| acc.blink_rate(Utc::now()))
            .unwrap_or(0.0)
    }

    /// Engagement score of the latest snapshot; 0.0 with no session.
    pub async fn engagement_score(&self) -> f64 {
        let state = self.state.lock().await;
        state
            .as_ref()
            .map(|acc| acc.engagement_score())
            .unwrap_or(0.0)
    }

    /// Ends the session: stops both loops, flushes the remaining buffer
    /// exactly once, persists and returns the report. Safe to call from
    /// several places concurrently; every call after the first returns the
    /// same report and performs no further persistence writes.
    pub async fn end_session(&self) -> Result<SessionReport> {
        let _end_guard = self.end_lock.lock().await;

        {
            let state = self.state.lock().await;
            match state.as_ref() {
                Some(acc) => {
                    if let Some(report) = acc.cached_report() {
                        log_info!("session {} already ended", acc.session_id());
                        return Ok(report.clone());
                    }
                }
                None => bail!("no active session"),
            }
        }

        // Stop both timers before touching the buffer so the final flush
        // cannot race a concurrent tick.
        let tasks = self.tasks.lock().await.take();
        if let Some(tasks) = tasks {
            tasks.cancel.cancel();
            tasks
                .sense
                .await
                .context("sense loop task failed to join")?;
            tasks
                .flush
                .await
                .context("flush loop task failed to join")?;
        }

        let ended_at = Utc::now();
        let session_id = {
            let state = self.state.lock().await;
            state
                .as_ref()
                .map(|acc| acc.session_id().to_string())
                .context("session state disappeared during end")?
        };

        flush_once(&self.store, &self.state, &session_id)
            .await
            .context("final flush failed")?;

        let history = {
            let state = self.state.lock().await;
            state
                .as_ref()
                .context("session state disappeared during end")?
                .history(ended_at)
        };
        let report = build_session_report(&history);

        self.store
            .save_report(&session_id, &report)
            .await
            .context("failed to persist session report")?;

        match self.store.end_session(&session_id, ended_at).await {
            Ok(()) => {}
            Err(err) if is_already_ended(&err) => {
                log_info!("store reported session {session_id} already ended; treating as success");
            }
            Err(err) => return Err(err.context("failed to end session in store")),
        }

        {
            let mut state = self.state.lock().await;
            if let Some(acc) = state.as_mut() {
                acc.mark_ended(report.clone());
            }
        }
        log_info!("session {session_id} ended");

        Ok(report)
    }

    async fn spawn_loops(&self, session_id: String) {
        let cancel = CancellationToken::new();

        let sense = tokio::spawn(sense_loop(
            Arc::clone(&self.source),
            Arc::clone(&self.state),
            self.config.clone(),
            cancel.clone(),
        ));
        let flush = tokio::spawn(flush_loop(
            self.store.clone(),
            Arc::clone(&self.state),
            self.config.clone(),
            session_id,
            cancel.clone(),
        ));

        let mut tasks = self.tasks.lock().await;
        if let Some(stale) = tasks.take() {
            stale.cancel.cancel();
        }
        *tasks = Some(SessionTasks {
            cancel,
            sense,
            flush,
        });
    }
}

/// Fast tick: fan out the detector calls, fuse the frame, update the
/// session state. A tick whose detectors are still busy is skipped rather
/// than queued.
async fn sense_loop<D: DetectionSource>(
    source: Arc<D>,
    state: SharedState,
    config: EngineConfig,
    cancel: CancellationToken,
) {
    // First tick one full interval in; a tokio interval would otherwise
    // fire immediately on spawn.
    let period = config.sense_interval();
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let budget = config.detector_timeout();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let timestamp = Utc::now();
                let detections = gather_frame(&source, timestamp, budget).await;
                let mut guard = state.lock().await;
                if let Some(acc) = guard.as_mut() {
                    if !acc.is_ended() {
                        acc.apply_frame(&config, &detections, timestamp);
                    }
                }
            }
            _ = cancel.cancelled() => {
                log_info!("sense loop shutting down");
                break;
            }
        }
    }
}

/// Slow tick: drain the pending buffer into the store. A failed write puts
/// the batch back and the next scheduled tick retries; nothing panics out
/// of the tick handler.
async fn flush_loop<S: MetricStore>(
    store: S,
    state: SharedState,
    config: EngineConfig,
    session_id: String,
    cancel: CancellationToken,
) {
    let period = config.flush_interval();
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = flush_once(&store, &state, &session_id).await {
                    log_warn!("flush failed for session {session_id}, retrying next tick: {err:#}");
                }
            }
            _ = cancel.cancelled() => {
                log_info!("flush loop shutting down");
                break;
            }
        }
    }
}

/// Drains the buffer under the lock, then writes without holding it so the
/// sense loop is never blocked on store latency. On failure the undelivered
/// remainder is requeued for the next tick.
pub(crate) async fn flush_once<S: MetricStore>(
    store: &S,
    state: &SharedState,
    session_id: &str,
) -> Result<()> {
    let drained = {
        let mut guard = state.lock().await;
        match guard.as_mut() {
            Some(acc) => acc.drain_pending(Utc::now()),
            None => return Ok(()),
        }
    };
    if drained.is_empty() {
        return Ok(());
    }

    let mut iter = drained.into_iter();
    let mut failure = None;
    while let Some(record) = iter.next() {
        match store
            .save_metric(session_id, record.kind, record.payload.clone())
            .await
        {
            Ok(()) => {}
            Err(err) => {
                failure = Some((record, err));
                break;
            }
        }
    }

    if let Some((record, err)) = failure {
        let remainder: Vec<_> = std::iter::once(record).chain(iter).collect();
        let mut guard = state.lock().await;
        if let Some(acc) = guard.as_mut() {
            acc.requeue(remainder);
        }
        return Err(err);
    }

    Ok(())
}
