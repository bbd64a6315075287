//! Eye-closure detection
//!
//! Sibling detector to the posture scorer: it publishes a smoothed eye
//! openness signal and a binary closure score that feeds its own
//! [`NotificationScheduler`](crate::scheduler::NotificationScheduler)
//! instance, so drowsiness alerts reuse the same debounce and pacing
//! machinery as posture alerts.

use crate::config::DrowsinessConfig;
use crate::error::CoreError;
use crate::smoothing::SmoothingBuffer;
use crate::types::FaceFrame;
use serde::{Deserialize, Serialize};

/// Published eye-closure state for one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeClosureMetrics {
    /// Smoothed eyelid opening relative to interocular distance
    pub openness: f64,
    /// Whether the smoothed openness is below the closure threshold
    pub eyes_closed: bool,
    /// Scheduler-facing score: 100 while closed, 0 while open
    pub closure_score: f64,
}

/// Tracks eyelid opening across ticks
pub struct DrowsinessDetector {
    config: DrowsinessConfig,
    smoothing: SmoothingBuffer,
    published: Option<EyeClosureMetrics>,
}

impl DrowsinessDetector {
    pub fn new(config: DrowsinessConfig) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            config,
            smoothing: SmoothingBuffer::default(),
            published: None,
        })
    }

    /// Update from the current face frame. Returns None when the eyelid
    /// landmarks are missing; the previously published metrics are held
    /// unchanged, mirroring the posture engine's bad-frame semantics.
    pub fn update(&mut self, face: &FaceFrame) -> Option<EyeClosureMetrics> {
        let raw = face.eye_openness_ratio()?;
        let openness = self.smoothing.push(raw);
        let eyes_closed = openness < self.config.ear_closure_threshold;
        let metrics = EyeClosureMetrics {
            openness,
            eyes_closed,
            closure_score: if eyes_closed { 100.0 } else { 0.0 },
        };
        self.published = Some(metrics);
        Some(metrics)
    }

    pub fn published(&self) -> Option<EyeClosureMetrics> {
        self.published
    }

    pub fn reset(&mut self) {
        self.smoothing.clear();
        self.published = None;
    }

    pub fn config(&self) -> &DrowsinessConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::scheduler::{AlertSink, NotificationScheduler, NotificationState};
    use crate::types::{face, AlertEvent, AlertKind, Keypoint};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn face_with_openness(lid_gap: f64) -> FaceFrame {
        FaceFrame::from_landmarks(vec![
            Keypoint::new(face::LEFT_EYE, 100.0, 150.0, 1.0),
            Keypoint::new(face::RIGHT_EYE, 160.0, 150.0, 1.0),
            Keypoint::new(face::LEFT_EYE_TOP, 100.0, 150.0 - lid_gap / 2.0, 1.0),
            Keypoint::new(face::LEFT_EYE_BOTTOM, 100.0, 150.0 + lid_gap / 2.0, 1.0),
            Keypoint::new(face::RIGHT_EYE_TOP, 160.0, 150.0 - lid_gap / 2.0, 1.0),
            Keypoint::new(face::RIGHT_EYE_BOTTOM, 160.0, 150.0 + lid_gap / 2.0, 1.0),
        ])
    }

    #[test]
    fn test_open_eyes_not_flagged() {
        let mut detector = DrowsinessDetector::new(DrowsinessConfig::default()).unwrap();
        // Lid gap 15px over interocular 60px: openness 0.25
        let metrics = detector.update(&face_with_openness(15.0)).unwrap();
        assert!(!metrics.eyes_closed);
        assert_eq!(metrics.closure_score, 0.0);
    }

    #[test]
    fn test_closed_eyes_flagged_after_smoothing() {
        let mut detector = DrowsinessDetector::new(DrowsinessConfig::default()).unwrap();
        let closed = face_with_openness(3.0); // openness 0.05

        let mut metrics = None;
        for _ in 0..3 {
            metrics = detector.update(&closed);
        }
        let metrics = metrics.unwrap();
        assert!(metrics.eyes_closed);
        assert_eq!(metrics.closure_score, 100.0);
    }

    #[test]
    fn test_missing_landmarks_hold_published_metrics() {
        let mut detector = DrowsinessDetector::new(DrowsinessConfig::default()).unwrap();
        detector.update(&face_with_openness(15.0)).unwrap();
        let before = detector.published();

        let centers_only = FaceFrame::from_landmarks(vec![
            Keypoint::new(face::LEFT_EYE, 100.0, 150.0, 1.0),
            Keypoint::new(face::RIGHT_EYE, 160.0, 150.0, 1.0),
        ]);
        assert_eq!(detector.update(&centers_only), None);
        assert_eq!(detector.published(), before);
    }

    struct CountingSink(usize);

    impl AlertSink for CountingSink {
        fn deliver(&mut self, _alert: &AlertEvent) {
            self.0 += 1;
        }
    }

    #[test]
    fn test_closure_score_drives_shared_scheduler() {
        let config = DrowsinessConfig {
            ear_closure_threshold: 0.15,
            drowsiness_delay_secs: 4.0,
        };
        let mut detector = DrowsinessDetector::new(config).unwrap();
        let clock = ManualClock::new();
        let mut scheduler = NotificationScheduler::new(
            AlertKind::Drowsiness,
            config.alert_config(),
            Arc::new(clock.clone()),
        )
        .unwrap();
        let mut sink = CountingSink(0);

        let closed = face_with_openness(3.0);
        for _ in 0..6 {
            let metrics = detector.update(&closed).unwrap();
            scheduler.observe(metrics.closure_score, &mut sink);
            clock.advance(Duration::from_secs(1));
        }

        // Closure held past the delay produces exactly one alert in
        // cooldown mode
        assert_eq!(sink.0, 1);
        assert_eq!(scheduler.state(), NotificationState::Cooldown);
    }

    #[test]
    fn test_reset_clears_published_state() {
        let mut detector = DrowsinessDetector::new(DrowsinessConfig::default()).unwrap();
        detector.update(&face_with_openness(3.0)).unwrap();
        detector.reset();
        assert_eq!(detector.published(), None);
    }
}
