//! Session orchestration
//!
//! [`MonitorSession`] owns one engine, one scheduler, and (optionally) one
//! keypoint source, and drives the per-tick pipeline in a fixed order:
//! calibration read, score compute, smoothing update, notification-state
//! evaluation. It is constructed once per application session and driven by
//! whatever event loop the host runs; the core never spawns its own timers.

use crate::calibration::CalibrationBaseline;
use crate::clock::Clock;
use crate::config::{AlertConfig, EngineConfig};
use crate::engine::PostureScoreEngine;
use crate::error::CoreError;
use crate::scheduler::{AlertSink, NotificationScheduler, NotificationState};
use crate::shutdown::WorkerEndpoint;
use crate::source::KeypointSource;
use crate::types::{AlertKind, FaceFrame, PoseFrame, ScoreSample};
use crate::{CORE_VERSION, PRODUCER_NAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// One published score with producer provenance, as emitted on the
/// reporting stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub producer: String,
    pub version: String,
    pub session_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub score: f64,
    pub state: NotificationState,
    pub calibrated: bool,
}

/// Owns the posture pipeline for one application session
pub struct MonitorSession {
    session_id: Uuid,
    engine: PostureScoreEngine,
    scheduler: NotificationScheduler,
    source: Option<Box<dyn KeypointSource>>,
    sink: Box<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    enabled: bool,
}

impl MonitorSession {
    /// Push-style session: the host runs inference itself and feeds frames
    /// through [`MonitorSession::ingest`]
    pub fn new(
        engine_config: EngineConfig,
        alert_config: AlertConfig,
        sink: Box<dyn AlertSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            session_id: Uuid::new_v4(),
            engine: PostureScoreEngine::new(engine_config)?,
            scheduler: NotificationScheduler::new(AlertKind::Posture, alert_config, clock.clone())?,
            source: None,
            sink,
            clock,
            enabled: false,
        })
    }

    /// Pull-style session over a [`KeypointSource`]
    pub fn with_source(
        engine_config: EngineConfig,
        alert_config: AlertConfig,
        source: Box<dyn KeypointSource>,
        sink: Box<dyn AlertSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CoreError> {
        let mut session = Self::new(engine_config, alert_config, sink, clock)?;
        session.source = Some(source);
        Ok(session)
    }

    /// Acquire the capture resource and start accepting ticks. Calibration
    /// is NOT carried over from a previous enable cycle.
    pub fn enable(&mut self) -> Result<(), CoreError> {
        if let Some(source) = self.source.as_mut() {
            source.open()?;
        }
        self.enabled = true;
        Ok(())
    }

    /// Stop detection: releases the capture resource, clears the
    /// calibration baseline, and cancels all scheduled alerts. Synchronous;
    /// nothing fires after this returns.
    pub fn disable(&mut self) {
        if let Some(source) = self.source.as_mut() {
            source.release();
        }
        self.engine.disable();
        self.scheduler.reset();
        self.enabled = false;
    }

    /// Pausing suppresses alerts without tearing down detection
    pub fn set_paused(&mut self, paused: bool) {
        self.scheduler.set_paused(paused);
    }

    /// Capture a calibration baseline from the next frame pair
    pub fn calibrate(&mut self) -> Result<CalibrationBaseline, CoreError> {
        if !self.enabled {
            return Err(CoreError::CalibrationFailed(
                "detection is disabled".to_string(),
            ));
        }
        let source = self.source.as_mut().ok_or_else(|| {
            CoreError::CalibrationFailed("session has no keypoint source".to_string())
        })?;
        let (pose, face) = source.estimate()?;
        self.engine.calibrate(&pose, &face)
    }

    /// Capture a calibration baseline from host-supplied frames
    pub fn calibrate_with(
        &mut self,
        pose: &PoseFrame,
        face: &FaceFrame,
    ) -> Result<CalibrationBaseline, CoreError> {
        if !self.enabled {
            return Err(CoreError::CalibrationFailed(
                "detection is disabled".to_string(),
            ));
        }
        self.engine.calibrate(pose, face)
    }

    /// Run one analysis tick by pulling from the source. A failed estimate
    /// is absorbed: no score this tick, no user-visible error.
    pub fn tick(&mut self) -> Option<ScoreSample> {
        if !self.enabled {
            return None;
        }
        let frames = match self.source.as_mut() {
            Some(source) => source.estimate(),
            None => Err(CoreError::DetectionUnavailable(
                "session has no keypoint source".to_string(),
            )),
        };
        match frames {
            Ok((pose, face)) => self.ingest(&pose, &face),
            Err(_) => {
                // Deadline-driven alerts still fire on schedule
                self.scheduler.poll(&mut *self.sink);
                None
            }
        }
    }

    /// Run one analysis tick on host-supplied frames
    pub fn ingest(&mut self, pose: &PoseFrame, face: &FaceFrame) -> Option<ScoreSample> {
        if !self.enabled {
            return None;
        }
        let elapsed = self.clock.now();
        let recorded_at = Utc::now();

        match self.engine.process(pose, face, recorded_at, elapsed) {
            Some(score) => {
                self.scheduler.observe(score, &mut *self.sink);
                Some(ScoreSample {
                    recorded_at,
                    elapsed_ms: elapsed.as_millis() as u64,
                    score,
                })
            }
            None => {
                // Bad frame: published score and notification state are
                // retained, but due deadlines still fire
                self.scheduler.poll(&mut *self.sink);
                None
            }
        }
    }

    /// Evaluate scheduler deadlines between ticks
    pub fn poll_timers(&mut self) {
        self.scheduler.poll(&mut *self.sink);
    }

    /// Handle a pending cleanup request from the supervisor, releasing
    /// resources synchronously before acknowledging. Returns true when a
    /// request was handled.
    pub fn service_shutdown(&mut self, worker: &mut WorkerEndpoint) -> Result<bool, CoreError> {
        if !worker.take_request() {
            return Ok(false);
        }
        self.disable();
        worker.acknowledge()?;
        Ok(true)
    }

    pub fn set_alert_config(&mut self, config: AlertConfig) -> Result<(), CoreError> {
        self.scheduler.set_config(config)
    }

    /// Reporting record for an emitted sample
    pub fn score_record(&self, sample: &ScoreSample) -> ScoreRecord {
        ScoreRecord {
            producer: PRODUCER_NAME.to_string(),
            version: CORE_VERSION.to_string(),
            session_id: self.session_id,
            recorded_at: sample.recorded_at,
            elapsed_ms: sample.elapsed_ms,
            score: sample.score,
            state: self.scheduler.state(),
            calibrated: self.engine.is_calibrated(),
        }
    }

    pub fn slouch_score(&self) -> Option<f64> {
        self.engine.published_score()
    }

    pub fn notification_state(&self) -> NotificationState {
        self.scheduler.state()
    }

    pub fn is_calibrated(&self) -> bool {
        self.engine.is_calibrated()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_paused(&self) -> bool {
        self.scheduler.is_paused()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn history(&self) -> impl Iterator<Item = &ScoreSample> {
        self.engine.history()
    }
}
