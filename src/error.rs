//! Error types for the posture core

use thiserror::Error;

/// Errors that can occur while scoring, calibrating, or coordinating shutdown
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Detection unavailable: {0}")]
    DetectionUnavailable(String),

    #[error("Calibration failed: {0}")]
    CalibrationFailed(String),

    #[error("Resource acquisition failed: {0}")]
    ResourceAcquisition(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}
