//! Uprite Core - On-device posture scoring and alert scheduling engine
//!
//! The core turns a stream of body/face keypoint detections into a single
//! slouch score through a deterministic per-tick pipeline: calibration read
//! → score compute → smoothing update → notification-state evaluation. A
//! debounced scheduler decides when a threshold breach becomes an alert,
//! and a timeout-guarded handshake coordinates cleanup between a
//! supervising process and the worker context before termination.
//!
//! ## Modules
//!
//! - **Scoring**: calibration-relative, distance-compensated slouch scores
//! - **Scheduling**: cooldown/continuous alert pacing with debounce
//! - **Shutdown**: two-party cleanup handshake with a 5s timeout

pub mod calibration;
pub mod clock;
pub mod config;
pub mod drowsiness;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod session;
pub mod shutdown;
pub mod smoothing;
pub mod source;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use calibration::{CalibrationBaseline, CalibrationStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AlertConfig, AlertMode, DrowsinessConfig, EngineConfig};
pub use drowsiness::{DrowsinessDetector, EyeClosureMetrics};
pub use engine::PostureScoreEngine;
pub use error::CoreError;
pub use scheduler::{AlertSink, NotificationScheduler, NotificationState};
pub use session::{MonitorSession, ScoreRecord};
pub use shutdown::{handshake, HandshakeState, ShutdownCoordinator, WorkerEndpoint};
pub use smoothing::SmoothingBuffer;
pub use source::{KeypointSource, ReplaySource};
pub use types::{AlertEvent, AlertKind, FaceFrame, FrameRecord, Keypoint, PoseFrame, ScoreSample};

/// Core version embedded in all emitted records
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for emitted records
pub const PRODUCER_NAME: &str = "uprite-core";
