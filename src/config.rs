//! Runtime configuration for the engine and alert schedulers
//!
//! All configuration is serde round-trippable so a host application can
//! persist it alongside its own settings.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How repeat alerts are paced once a breach is confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertMode {
    Cooldown,
    Continuous,
}

impl AlertMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertMode::Cooldown => "cooldown",
            AlertMode::Continuous => "continuous",
        }
    }
}

/// Threshold and timing configuration for the notification scheduler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Score above which posture counts as degraded (0-100)
    pub threshold: f64,
    /// Seconds the score must stay above threshold before the first alert
    pub trigger_delay_secs: f64,
    pub mode: AlertMode,
    /// Cooldown mode: seconds alerts stay suppressed after one fires
    pub cooldown_secs: f64,
    /// Continuous mode: seconds between repeat alerts
    pub continuous_interval_secs: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            threshold: 50.0,
            trigger_delay_secs: 5.0,
            mode: AlertMode::Cooldown,
            cooldown_secs: 60.0,
            continuous_interval_secs: 10.0,
        }
    }
}

impl AlertConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(0.0..=100.0).contains(&self.threshold) {
            return Err(CoreError::InvalidConfig(format!(
                "threshold must be in 0-100, got {}",
                self.threshold
            )));
        }
        if self.trigger_delay_secs < 0.0 {
            return Err(CoreError::InvalidConfig(
                "trigger_delay_secs must be non-negative".to_string(),
            ));
        }
        if self.cooldown_secs <= 0.0 {
            return Err(CoreError::InvalidConfig(
                "cooldown_secs must be positive".to_string(),
            ));
        }
        if self.continuous_interval_secs <= 0.0 {
            return Err(CoreError::InvalidConfig(
                "continuous_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn trigger_delay(&self) -> Duration {
        Duration::from_secs_f64(self.trigger_delay_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_secs)
    }

    pub fn continuous_interval(&self) -> Duration {
        Duration::from_secs_f64(self.continuous_interval_secs)
    }
}

/// Scoring parameters. Defaults match expected production behavior; the
/// sensitivity divisor in particular is tunable but should stay at 0.35
/// unless recalibrated against real capture data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Divisor applied to the posture deviation before clamping
    pub sensitivity: f64,
    /// Number of raw scores in the smoothing window
    pub smoothing_window: usize,
    /// Confidence a body keypoint must exceed to be usable
    pub confidence_threshold: f64,
    /// Milliseconds between analysis ticks; the host loop drives the cadence
    pub tick_interval_ms: u64,
    /// Bound on retained score samples
    pub history_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.35,
            smoothing_window: 3,
            confidence_threshold: 0.4,
            tick_interval_ms: 1500,
            history_capacity: 2000,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.sensitivity <= 0.0 {
            return Err(CoreError::InvalidConfig(
                "sensitivity must be positive".to_string(),
            ));
        }
        if self.smoothing_window == 0 {
            return Err(CoreError::InvalidConfig(
                "smoothing_window must be at least 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.confidence_threshold) {
            return Err(CoreError::InvalidConfig(format!(
                "confidence_threshold must be in [0,1), got {}",
                self.confidence_threshold
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(CoreError::InvalidConfig(
                "history_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the eye-closure sibling detector, which shares the
/// notification scheduling pattern with the posture detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrowsinessConfig {
    /// Eye openness ratio below which eyes count as closed
    pub ear_closure_threshold: f64,
    /// Seconds eyes must stay closed before alerting
    pub drowsiness_delay_secs: f64,
}

impl Default for DrowsinessConfig {
    fn default() -> Self {
        Self {
            ear_closure_threshold: 0.15,
            drowsiness_delay_secs: 10.0,
        }
    }
}

impl DrowsinessConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.ear_closure_threshold <= 0.0 {
            return Err(CoreError::InvalidConfig(
                "ear_closure_threshold must be positive".to_string(),
            ));
        }
        if self.drowsiness_delay_secs < 0.0 {
            return Err(CoreError::InvalidConfig(
                "drowsiness_delay_secs must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Equivalent scheduler configuration: the closure signal is published
    /// as a 0/100 score, so the threshold sits at the midpoint and the
    /// closure delay plays the trigger-delay role.
    pub fn alert_config(&self) -> AlertConfig {
        AlertConfig {
            threshold: 50.0,
            trigger_delay_secs: self.drowsiness_delay_secs,
            ..AlertConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_alert_config_defaults_validate() {
        assert!(AlertConfig::default().validate().is_ok());
        assert!(EngineConfig::default().validate().is_ok());
        assert!(DrowsinessConfig::default().validate().is_ok());
    }

    #[test]
    fn test_alert_config_rejects_out_of_range_threshold() {
        let config = AlertConfig {
            threshold: 120.0,
            ..AlertConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_engine_config_rejects_zero_window() {
        let config = EngineConfig {
            smoothing_window: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = AlertConfig {
            threshold: 65.0,
            mode: AlertMode::Continuous,
            ..AlertConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AlertConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        let json = serde_json::to_string(&AlertMode::Continuous).unwrap();
        assert_eq!(json, "\"continuous\"");
        assert_eq!(AlertMode::Continuous.as_str(), "continuous");
    }
}
