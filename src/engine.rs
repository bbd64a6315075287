//! Posture scoring
//!
//! Turns a pose/face frame pair plus the calibration baseline into a raw
//! slouch score, then smooths it into the published 0-100 value. Scoring is
//! calibration-relative and distance-compensated: the interocular distance
//! corrects for the subject moving closer to or farther from the camera.

use crate::calibration::{CalibrationBaseline, CalibrationStore};
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::smoothing::SmoothingBuffer;
use crate::types::{body, FaceFrame, PoseFrame, ScoreSample};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::Duration;

/// Shoulder Y estimate when shoulders are out of frame:
/// `eyeY + (eyeY - earY) * 2.2`, an empirically fixed ratio
pub const SHOULDER_FALLBACK_RATIO: f64 = 2.2;

/// Minimum eye-to-shoulder vertical extent in pixels; anything smaller is
/// treated as sensor noise (subject too close or occluded)
pub const MIN_VERTICAL_EXTENT_PX: f64 = 20.0;

/// Compute the raw slouch score for one frame pair against a baseline.
///
/// Returns None rather than an error when required keypoints are missing or
/// below the confidence threshold, when the vertical extent is too small,
/// or when the face landmarks needed for distance compensation are absent.
/// A None must be absorbed by the caller: it means "no score this tick",
/// never "reset accumulated state".
pub fn raw_slouch_score(
    pose: &PoseFrame,
    face: &FaceFrame,
    baseline: &CalibrationBaseline,
    config: &EngineConfig,
) -> Option<f64> {
    let threshold = config.confidence_threshold;

    let ear_y = pose.midpoint_y(body::LEFT_EAR, body::RIGHT_EAR, threshold)?;
    let eye_y = pose.midpoint_y(body::LEFT_EYE, body::RIGHT_EYE, threshold)?;

    // Degrade gracefully when shoulders are out of frame
    let shoulder_y = pose
        .shoulder_y(threshold)
        .unwrap_or_else(|| eye_y + (eye_y - ear_y) * SHOULDER_FALLBACK_RATIO);

    let body_height = shoulder_y - eye_y;
    if body_height < MIN_VERTICAL_EXTENT_PX {
        return None;
    }

    let interocular = face.interocular_distance()?;
    let face_size_ratio = interocular / baseline.interocular_distance;
    if face_size_ratio <= 0.0 {
        return None;
    }

    // Both ratios use the current eye Y so they share the same height
    // reference
    let current_ratio = (shoulder_y - ear_y) / body_height;
    let baseline_height = baseline.shoulder_y - eye_y;
    if baseline_height < MIN_VERTICAL_EXTENT_PX {
        return None;
    }
    let baseline_ratio = (baseline.shoulder_y - baseline.ear_y) / baseline_height;

    // Positive deviation means posture degraded relative to baseline
    let deviation = baseline_ratio - current_ratio / face_size_ratio;
    let raw = (deviation / config.sensitivity).clamp(0.0, 1.0) * 100.0;
    Some(raw)
}

/// Stateful scoring engine: calibration store, smoothing window, published
/// score, and the bounded sample history. Constructed once per application
/// session and owned by whatever loop drives analysis ticks.
pub struct PostureScoreEngine {
    config: EngineConfig,
    calibration: CalibrationStore,
    smoothing: SmoothingBuffer,
    published: Option<f64>,
    history: VecDeque<ScoreSample>,
}

impl PostureScoreEngine {
    pub fn new(config: EngineConfig) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            calibration: CalibrationStore::new(config.confidence_threshold),
            smoothing: SmoothingBuffer::new(config.smoothing_window),
            published: None,
            history: VecDeque::new(),
            config,
        })
    }

    /// Capture a new baseline from the current frame pair
    pub fn calibrate(
        &mut self,
        pose: &PoseFrame,
        face: &FaceFrame,
    ) -> Result<CalibrationBaseline, CoreError> {
        self.calibration.calibrate(pose, face)
    }

    /// Raw score for one frame pair against the stored baseline; None when
    /// calibration is absent or the frame is unusable
    pub fn score(&self, pose: &PoseFrame, face: &FaceFrame) -> Option<f64> {
        let baseline = self.calibration.get()?;
        raw_slouch_score(pose, face, baseline, &self.config)
    }

    /// Run one analysis tick: score, smooth, publish, record.
    ///
    /// On a bad frame the previously published score is retained unchanged;
    /// a single failed detection must not clear accumulated state.
    pub fn process(
        &mut self,
        pose: &PoseFrame,
        face: &FaceFrame,
        recorded_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Option<f64> {
        let raw = self.score(pose, face)?;
        let smoothed = self.smoothing.push(raw);
        self.published = Some(smoothed);

        self.history.push_back(ScoreSample {
            recorded_at,
            elapsed_ms: elapsed.as_millis() as u64,
            score: smoothed,
        });
        while self.history.len() > self.config.history_capacity {
            self.history.pop_front();
        }

        Some(smoothed)
    }

    /// Clear calibration, smoothing window, and the published score.
    /// Called when detection is disabled; the reporting history survives.
    pub fn disable(&mut self) {
        self.calibration.clear();
        self.smoothing.clear();
        self.published = None;
    }

    /// Most recent published (smoothed) score
    pub fn published_score(&self) -> Option<f64> {
        self.published
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_calibrated()
    }

    pub fn history(&self) -> impl Iterator<Item = &ScoreSample> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
