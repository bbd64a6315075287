//! Core types for the posture monitoring pipeline
//!
//! This module defines the data that flows through one analysis tick: labeled
//! keypoints from the pose/face producers, the frames built from them, score
//! samples, and alert events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Confidence a body keypoint must exceed to be usable
pub const BODY_CONFIDENCE_THRESHOLD: f64 = 0.4;

/// Body keypoint names, MoveNet convention
pub mod body {
    pub const LEFT_EAR: &str = "left_ear";
    pub const RIGHT_EAR: &str = "right_ear";
    pub const LEFT_EYE: &str = "left_eye";
    pub const RIGHT_EYE: &str = "right_eye";
    pub const LEFT_SHOULDER: &str = "left_shoulder";
    pub const RIGHT_SHOULDER: &str = "right_shoulder";
}

/// Face landmark names of interest
pub mod face {
    pub const LEFT_EYE: &str = "left_eye";
    pub const RIGHT_EYE: &str = "right_eye";
    pub const LEFT_EYE_TOP: &str = "left_eye_top";
    pub const LEFT_EYE_BOTTOM: &str = "left_eye_bottom";
    pub const RIGHT_EYE_TOP: &str = "right_eye_top";
    pub const RIGHT_EYE_BOTTOM: &str = "right_eye_bottom";
}

fn default_confidence() -> f64 {
    // Face producers do not expose per-point confidence
    1.0
}

/// A labeled 2D detection point with confidence in [0,1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl Keypoint {
    pub fn new(name: impl Into<String>, x: f64, y: f64, confidence: f64) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            confidence,
        }
    }

    /// Whether this point clears the given acceptance threshold
    pub fn usable(&self, threshold: f64) -> bool {
        self.confidence > threshold
    }
}

/// Ordered mapping from body-part name to keypoint, produced once per tick.
/// Ephemeral: not retained beyond one scoring pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseFrame {
    points: BTreeMap<String, Keypoint>,
}

impl PoseFrame {
    pub fn from_keypoints(points: impl IntoIterator<Item = Keypoint>) -> Self {
        Self {
            points: points.into_iter().map(|k| (k.name.clone(), k)).collect(),
        }
    }

    pub fn point(&self, name: &str) -> Option<&Keypoint> {
        self.points.get(name)
    }

    /// Keypoint if present and above the confidence threshold
    pub fn usable_point(&self, name: &str, threshold: f64) -> Option<&Keypoint> {
        self.points.get(name).filter(|k| k.usable(threshold))
    }

    /// Mean Y of a left/right keypoint pair; None unless both are usable
    pub fn midpoint_y(&self, left: &str, right: &str, threshold: f64) -> Option<f64> {
        let l = self.usable_point(left, threshold)?;
        let r = self.usable_point(right, threshold)?;
        Some((l.y + r.y) / 2.0)
    }

    /// Mean Y of whichever shoulders are usable; None if neither is
    pub fn shoulder_y(&self, threshold: f64) -> Option<f64> {
        let usable: Vec<f64> = [body::LEFT_SHOULDER, body::RIGHT_SHOULDER]
            .into_iter()
            .filter_map(|name| self.usable_point(name, threshold))
            .map(|k| k.y)
            .collect();
        if usable.is_empty() {
            return None;
        }
        Some(usable.iter().sum::<f64>() / usable.len() as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

/// Ordered mapping from landmark name to keypoint for the current video frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceFrame {
    landmarks: BTreeMap<String, Keypoint>,
}

impl FaceFrame {
    pub fn from_landmarks(landmarks: impl IntoIterator<Item = Keypoint>) -> Self {
        Self {
            landmarks: landmarks.into_iter().map(|k| (k.name.clone(), k)).collect(),
        }
    }

    pub fn landmark(&self, name: &str) -> Option<&Keypoint> {
        self.landmarks.get(name)
    }

    /// Pixel distance between the two eye centers, the proxy for
    /// subject-to-camera distance. None if either eye is missing.
    pub fn interocular_distance(&self) -> Option<f64> {
        let l = self.landmark(face::LEFT_EYE)?;
        let r = self.landmark(face::RIGHT_EYE)?;
        let d = ((l.x - r.x).powi(2) + (l.y - r.y).powi(2)).sqrt();
        if d > 0.0 {
            Some(d)
        } else {
            None
        }
    }

    /// Mean eyelid opening of both eyes relative to interocular distance.
    /// Requires the eyelid top/bottom landmarks; None when the producer
    /// only reports eye centers.
    pub fn eye_openness_ratio(&self) -> Option<f64> {
        let interocular = self.interocular_distance()?;
        let left = self.lid_gap(face::LEFT_EYE_TOP, face::LEFT_EYE_BOTTOM)?;
        let right = self.lid_gap(face::RIGHT_EYE_TOP, face::RIGHT_EYE_BOTTOM)?;
        Some(((left + right) / 2.0) / interocular)
    }

    fn lid_gap(&self, top: &str, bottom: &str) -> Option<f64> {
        let t = self.landmark(top)?;
        let b = self.landmark(bottom)?;
        Some((b.y - t.y).abs())
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}

/// One pose/face frame pair as delivered by the keypoint producers.
/// This is the NDJSON record shape consumed by the replay source and CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    pub pose: Vec<Keypoint>,
    #[serde(default)]
    pub face: Vec<Keypoint>,
}

impl FrameRecord {
    pub fn into_frames(self) -> (PoseFrame, FaceFrame) {
        (
            PoseFrame::from_keypoints(self.pose),
            FaceFrame::from_landmarks(self.face),
        )
    }
}

/// One published score, appended to the bounded reporting history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSample {
    /// Wall-clock stamp for reporting
    pub recorded_at: DateTime<Utc>,
    /// Monotonic session time of the tick, in milliseconds
    pub elapsed_ms: u64,
    /// Published (smoothed) slouch score, 0-100
    pub score: f64,
}

/// Which detector produced an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Posture,
    Drowsiness,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Posture => "posture",
            AlertKind::Drowsiness => "drowsiness",
        }
    }
}

/// A user-visible alert handed to the delivery collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub message: String,
    /// Score that triggered the alert
    pub score: f64,
    pub emitted_at: DateTime<Utc>,
}
