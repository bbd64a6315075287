//! Keypoint producer boundary
//!
//! The pose/face models are external collaborators; the core only consumes
//! their per-tick output through [`KeypointSource`]. A failing estimate is
//! "no score this tick", never a fatal error.

use crate::error::CoreError;
use crate::types::{FaceFrame, FrameRecord, PoseFrame};
use std::collections::VecDeque;

/// Boundary to the external keypoint producers. The capture resource
/// (camera, model runtime) is owned by the implementation and must be
/// released explicitly on disable; there is no implicit finalization.
pub trait KeypointSource {
    /// Acquire the underlying capture resource. A live implementation
    /// returns [`CoreError::ResourceAcquisition`] when the camera or model
    /// runtime is unavailable; detection then stays disabled.
    fn open(&mut self) -> Result<(), CoreError>;

    /// Produce the frame pair for the current tick
    fn estimate(&mut self) -> Result<(PoseFrame, FaceFrame), CoreError>;

    /// Release the capture resource
    fn release(&mut self);
}

/// Replays recorded frame pairs, one per tick. Used by the CLI and tests
/// in place of a live camera.
pub struct ReplaySource {
    records: VecDeque<FrameRecord>,
    open: bool,
}

impl ReplaySource {
    pub fn new(records: impl IntoIterator<Item = FrameRecord>) -> Self {
        Self {
            records: records.into_iter().collect(),
            open: false,
        }
    }

    /// Parse newline-delimited JSON frame records
    pub fn from_ndjson(input: &str) -> Result<Self, CoreError> {
        let mut records = VecDeque::new();
        for line in input.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: FrameRecord = serde_json::from_str(line)?;
            records.push_back(record);
        }
        Ok(Self {
            records,
            open: false,
        })
    }

    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl KeypointSource for ReplaySource {
    fn open(&mut self) -> Result<(), CoreError> {
        self.open = true;
        Ok(())
    }

    fn estimate(&mut self) -> Result<(PoseFrame, FaceFrame), CoreError> {
        if !self.open {
            return Err(CoreError::DetectionUnavailable(
                "source not open".to_string(),
            ));
        }
        match self.records.pop_front() {
            Some(record) => Ok(record.into_frames()),
            None => Err(CoreError::DetectionUnavailable(
                "replay exhausted".to_string(),
            )),
        }
    }

    fn release(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{body, Keypoint};
    use pretty_assertions::assert_eq;

    fn record(y: f64) -> FrameRecord {
        FrameRecord {
            pose: vec![Keypoint::new(body::LEFT_EAR, 0.0, y, 0.9)],
            face: vec![],
        }
    }

    #[test]
    fn test_estimate_requires_open() {
        let mut source = ReplaySource::new(vec![record(1.0)]);
        assert!(matches!(
            source.estimate(),
            Err(CoreError::DetectionUnavailable(_))
        ));

        source.open().unwrap();
        assert!(source.estimate().is_ok());
    }

    #[test]
    fn test_replays_in_order_then_exhausts() {
        let mut source = ReplaySource::new(vec![record(1.0), record(2.0)]);
        source.open().unwrap();

        let (pose, _) = source.estimate().unwrap();
        assert_eq!(pose.point(body::LEFT_EAR).unwrap().y, 1.0);
        let (pose, _) = source.estimate().unwrap();
        assert_eq!(pose.point(body::LEFT_EAR).unwrap().y, 2.0);

        assert!(matches!(
            source.estimate(),
            Err(CoreError::DetectionUnavailable(_))
        ));
    }

    #[test]
    fn test_release_closes_the_source() {
        let mut source = ReplaySource::new(vec![record(1.0)]);
        source.open().unwrap();
        source.release();
        assert!(source.estimate().is_err());
    }

    #[test]
    fn test_from_ndjson_skips_blank_lines() {
        let input = r#"
{"pose": [{"name": "left_ear", "x": 0.0, "y": 5.0, "confidence": 0.9}]}

{"pose": [{"name": "left_ear", "x": 0.0, "y": 6.0, "confidence": 0.9}], "face": []}
"#;
        let source = ReplaySource::from_ndjson(input).unwrap();
        assert_eq!(source.remaining(), 2);
    }

    #[test]
    fn test_from_ndjson_rejects_bad_records() {
        assert!(ReplaySource::from_ndjson("not json").is_err());
    }
}
