//! Calibration baseline management
//!
//! The baseline is a one-time snapshot of "good posture" geometry captured
//! by an explicit user action. Re-calibration replaces the prior baseline
//! unconditionally; disabling detection clears it, and a fresh calibration
//! is required before scoring resumes.

use crate::error::CoreError;
use crate::types::{body, FaceFrame, PoseFrame, BODY_CONFIDENCE_THRESHOLD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference geometry captured at calibration time. Owned exclusively by
/// the engine; consumers only ever see the `is_calibrated` boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBaseline {
    /// Mid-ear Y at calibration
    pub ear_y: f64,
    /// Mid-eye Y at calibration
    pub eye_y: f64,
    /// Mid-shoulder Y at calibration
    pub shoulder_y: f64,
    /// Interocular distance at calibration, in pixels
    pub interocular_distance: f64,
    pub captured_at: DateTime<Utc>,
}

/// Holds the most recent baseline snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationStore {
    baseline: Option<CalibrationBaseline>,
    confidence_threshold: f64,
}

impl Default for CalibrationStore {
    fn default() -> Self {
        Self::new(BODY_CONFIDENCE_THRESHOLD)
    }
}

impl CalibrationStore {
    pub fn new(confidence_threshold: f64) -> Self {
        Self {
            baseline: None,
            confidence_threshold,
        }
    }

    /// Capture a new baseline from the current frame pair, replacing any
    /// prior baseline. Fails without mutating state when the frame is only
    /// half detected: a corrupt baseline must never be stored silently.
    pub fn calibrate(
        &mut self,
        pose: &PoseFrame,
        face: &FaceFrame,
    ) -> Result<CalibrationBaseline, CoreError> {
        let threshold = self.confidence_threshold;

        let ear_y = pose
            .midpoint_y(body::LEFT_EAR, body::RIGHT_EAR, threshold)
            .ok_or_else(|| CoreError::CalibrationFailed("ear keypoints unusable".to_string()))?;
        let eye_y = pose
            .midpoint_y(body::LEFT_EYE, body::RIGHT_EYE, threshold)
            .ok_or_else(|| CoreError::CalibrationFailed("eye keypoints unusable".to_string()))?;
        let shoulder_y = pose.shoulder_y(threshold).ok_or_else(|| {
            CoreError::CalibrationFailed("shoulder keypoints unusable".to_string())
        })?;
        let interocular_distance = face.interocular_distance().ok_or_else(|| {
            CoreError::CalibrationFailed("eye landmarks missing from face frame".to_string())
        })?;

        let baseline = CalibrationBaseline {
            ear_y,
            eye_y,
            shoulder_y,
            interocular_distance,
            captured_at: Utc::now(),
        };
        self.baseline = Some(baseline.clone());
        Ok(baseline)
    }

    /// Drop the baseline; called when detection is disabled
    pub fn clear(&mut self) {
        self.baseline = None;
    }

    pub fn get(&self) -> Option<&CalibrationBaseline> {
        self.baseline.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.baseline.is_some()
    }

    /// Load a store from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the store to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{face, Keypoint};
    use pretty_assertions::assert_eq;

    fn kp(name: &str, x: f64, y: f64, c: f64) -> Keypoint {
        Keypoint::new(name, x, y, c)
    }

    fn good_pose() -> PoseFrame {
        PoseFrame::from_keypoints(vec![
            kp(body::LEFT_EAR, 90.0, 200.0, 0.9),
            kp(body::RIGHT_EAR, 150.0, 200.0, 0.9),
            kp(body::LEFT_EYE, 100.0, 190.0, 0.9),
            kp(body::RIGHT_EYE, 140.0, 190.0, 0.9),
            kp(body::LEFT_SHOULDER, 60.0, 320.0, 0.9),
            kp(body::RIGHT_SHOULDER, 180.0, 320.0, 0.9),
        ])
    }

    fn good_face() -> FaceFrame {
        FaceFrame::from_landmarks(vec![
            kp(face::LEFT_EYE, 100.0, 190.0, 1.0),
            kp(face::RIGHT_EYE, 140.0, 190.0, 1.0),
        ])
    }

    #[test]
    fn test_calibrate_captures_geometry() {
        let mut store = CalibrationStore::default();
        let baseline = store.calibrate(&good_pose(), &good_face()).unwrap();

        assert_eq!(baseline.ear_y, 200.0);
        assert_eq!(baseline.eye_y, 190.0);
        assert_eq!(baseline.shoulder_y, 320.0);
        assert_eq!(baseline.interocular_distance, 40.0);
        assert!(store.is_calibrated());
    }

    #[test]
    fn test_calibrate_rejects_half_detected_frame() {
        let mut store = CalibrationStore::default();
        let pose = PoseFrame::from_keypoints(vec![
            kp(body::LEFT_EAR, 90.0, 200.0, 0.9),
            // right ear below the confidence threshold
            kp(body::RIGHT_EAR, 150.0, 200.0, 0.2),
            kp(body::LEFT_EYE, 100.0, 190.0, 0.9),
            kp(body::RIGHT_EYE, 140.0, 190.0, 0.9),
            kp(body::LEFT_SHOULDER, 60.0, 320.0, 0.9),
            kp(body::RIGHT_SHOULDER, 180.0, 320.0, 0.9),
        ]);

        let result = store.calibrate(&pose, &good_face());
        assert!(matches!(result, Err(CoreError::CalibrationFailed(_))));
        assert!(!store.is_calibrated());
    }

    #[test]
    fn test_calibrate_rejects_missing_eye_landmarks() {
        let mut store = CalibrationStore::default();
        let face = FaceFrame::from_landmarks(vec![kp(face::LEFT_EYE, 100.0, 190.0, 1.0)]);

        let result = store.calibrate(&good_pose(), &face);
        assert!(matches!(result, Err(CoreError::CalibrationFailed(_))));
        assert!(!store.is_calibrated());
    }

    #[test]
    fn test_recalibration_replaces_baseline() {
        let mut store = CalibrationStore::default();
        store.calibrate(&good_pose(), &good_face()).unwrap();

        let pose = PoseFrame::from_keypoints(vec![
            kp(body::LEFT_EAR, 90.0, 230.0, 0.9),
            kp(body::RIGHT_EAR, 150.0, 230.0, 0.9),
            kp(body::LEFT_EYE, 100.0, 220.0, 0.9),
            kp(body::RIGHT_EYE, 140.0, 220.0, 0.9),
            kp(body::LEFT_SHOULDER, 60.0, 330.0, 0.9),
            kp(body::RIGHT_SHOULDER, 180.0, 330.0, 0.9),
        ]);
        let baseline = store.calibrate(&pose, &good_face()).unwrap();

        assert_eq!(baseline.ear_y, 230.0);
        assert_eq!(store.get().unwrap().ear_y, 230.0);
    }

    #[test]
    fn test_calibrate_idempotent_for_identical_frames() {
        let mut store = CalibrationStore::default();
        let first = store.calibrate(&good_pose(), &good_face()).unwrap();
        let second = store.calibrate(&good_pose(), &good_face()).unwrap();

        assert_eq!(first.ear_y, second.ear_y);
        assert_eq!(first.eye_y, second.eye_y);
        assert_eq!(first.shoulder_y, second.shoulder_y);
        assert_eq!(first.interocular_distance, second.interocular_distance);
    }

    #[test]
    fn test_clear_requires_fresh_calibration() {
        let mut store = CalibrationStore::default();
        store.calibrate(&good_pose(), &good_face()).unwrap();
        store.clear();

        assert!(!store.is_calibrated());
        assert!(store.get().is_none());
    }

    #[test]
    fn test_store_json_round_trip() {
        let mut store = CalibrationStore::default();
        store.calibrate(&good_pose(), &good_face()).unwrap();

        let json = store.to_json().unwrap();
        let loaded = CalibrationStore::from_json(&json).unwrap();
        assert_eq!(loaded.get(), store.get());
    }
}
