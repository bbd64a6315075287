//! Generate score records for validation testing

use std::sync::Arc;
use std::time::Duration;

use uprite_core::scheduler::AlertSink;
use uprite_core::{AlertConfig, AlertEvent, EngineConfig, ManualClock, MonitorSession, ReplaySource};

struct PrintSink;

impl AlertSink for PrintSink {
    fn deliver(&mut self, alert: &AlertEvent) {
        eprintln!("alert at score {:.0}: {}", alert.score, alert.message);
    }
}

fn main() {
    // One upright calibration frame, then a held slouch
    let ndjson = r#"
{"pose": [{"name": "left_ear", "x": 90, "y": 200, "confidence": 0.9}, {"name": "right_ear", "x": 150, "y": 200, "confidence": 0.9}, {"name": "left_eye", "x": 100, "y": 190, "confidence": 0.9}, {"name": "right_eye", "x": 140, "y": 190, "confidence": 0.9}, {"name": "left_shoulder", "x": 60, "y": 320, "confidence": 0.9}, {"name": "right_shoulder", "x": 180, "y": 320, "confidence": 0.9}], "face": [{"name": "left_eye", "x": 100, "y": 190}, {"name": "right_eye", "x": 140, "y": 190}]}
{"pose": [{"name": "left_ear", "x": 90, "y": 230, "confidence": 0.9}, {"name": "right_ear", "x": 150, "y": 230, "confidence": 0.9}, {"name": "left_eye", "x": 100, "y": 220, "confidence": 0.9}, {"name": "right_eye", "x": 140, "y": 220, "confidence": 0.9}, {"name": "left_shoulder", "x": 60, "y": 320, "confidence": 0.9}, {"name": "right_shoulder", "x": 180, "y": 320, "confidence": 0.9}], "face": [{"name": "left_eye", "x": 100, "y": 190}, {"name": "right_eye", "x": 140, "y": 190}]}
{"pose": [{"name": "left_ear", "x": 90, "y": 230, "confidence": 0.9}, {"name": "right_ear", "x": 150, "y": 230, "confidence": 0.9}, {"name": "left_eye", "x": 100, "y": 220, "confidence": 0.9}, {"name": "right_eye", "x": 140, "y": 220, "confidence": 0.9}, {"name": "left_shoulder", "x": 60, "y": 320, "confidence": 0.9}, {"name": "right_shoulder", "x": 180, "y": 320, "confidence": 0.9}], "face": [{"name": "left_eye", "x": 100, "y": 190}, {"name": "right_eye", "x": 140, "y": 190}]}
{"pose": [{"name": "left_ear", "x": 90, "y": 230, "confidence": 0.9}, {"name": "right_ear", "x": 150, "y": 230, "confidence": 0.9}, {"name": "left_eye", "x": 100, "y": 220, "confidence": 0.9}, {"name": "right_eye", "x": 140, "y": 220, "confidence": 0.9}, {"name": "left_shoulder", "x": 60, "y": 320, "confidence": 0.9}, {"name": "right_shoulder", "x": 180, "y": 320, "confidence": 0.9}], "face": [{"name": "left_eye", "x": 100, "y": 190}, {"name": "right_eye", "x": 140, "y": 190}]}
{"pose": [{"name": "left_ear", "x": 90, "y": 230, "confidence": 0.9}, {"name": "right_ear", "x": 150, "y": 230, "confidence": 0.9}, {"name": "left_eye", "x": 100, "y": 220, "confidence": 0.9}, {"name": "right_eye", "x": 140, "y": 220, "confidence": 0.9}, {"name": "left_shoulder", "x": 60, "y": 320, "confidence": 0.9}, {"name": "right_shoulder", "x": 180, "y": 320, "confidence": 0.9}], "face": [{"name": "left_eye", "x": 100, "y": 190}, {"name": "right_eye", "x": 140, "y": 190}]}
{"pose": [{"name": "left_ear", "x": 90, "y": 230, "confidence": 0.9}, {"name": "right_ear", "x": 150, "y": 230, "confidence": 0.9}, {"name": "left_eye", "x": 100, "y": 220, "confidence": 0.9}, {"name": "right_eye", "x": 140, "y": 220, "confidence": 0.9}, {"name": "left_shoulder", "x": 60, "y": 320, "confidence": 0.9}, {"name": "right_shoulder", "x": 180, "y": 320, "confidence": 0.9}], "face": [{"name": "left_eye", "x": 100, "y": 190}, {"name": "right_eye", "x": 140, "y": 190}]}
"#;

    let source = match ReplaySource::from_ndjson(ndjson) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: {e:?}");
            return;
        }
    };

    let clock = ManualClock::new();
    let mut session = MonitorSession::with_source(
        EngineConfig::default(),
        AlertConfig::default(),
        Box::new(source),
        Box::new(PrintSink),
        Arc::new(clock.clone()),
    )
    .expect("default configuration is valid");

    session.enable().expect("replay source always opens");
    session.calibrate().expect("first frame has full keypoints");

    for _ in 0..5 {
        clock.advance(Duration::from_millis(1500));
        if let Some(sample) = session.tick() {
            let record = session.score_record(&sample);
            println!("{}", serde_json::to_string(&record).expect("record encodes"));
        }
    }
}
