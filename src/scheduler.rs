//! Alert scheduling
//!
//! A finite-state machine that decides when a threshold breach becomes a
//! user-visible alert and how repeat alerts are paced. The scheduler only
//! guarantees *when* an alert fires, never *how* it is delivered: emission
//! is a fire-and-forget call into an [`AlertSink`] implemented by the host.
//!
//! Each state holds at most one timer mark, read against the injected
//! [`Clock`], so the timing behavior is fully deterministic under a manual
//! clock.

use crate::clock::Clock;
use crate::config::{AlertConfig, AlertMode};
use crate::error::CoreError;
use crate::types::{AlertEvent, AlertKind};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Scheduler states; exactly one is active per running instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationState {
    Idle,
    Pending,
    Cooldown,
    Continuous,
}

/// Delivery seam for user-visible alerts (desktop notification, spoken
/// message, animation request). No delivery confirmation is assumed.
pub trait AlertSink {
    fn deliver(&mut self, alert: &AlertEvent);
}

/// Debounced, mode-switchable alert scheduler
pub struct NotificationScheduler {
    kind: AlertKind,
    config: AlertConfig,
    /// Config staged while a cycle is in flight; applied on return to Idle
    staged_config: Option<AlertConfig>,
    state: NotificationState,
    deadline: Option<Duration>,
    last_score: Option<f64>,
    paused: bool,
    clock: Arc<dyn Clock>,
}

impl NotificationScheduler {
    pub fn new(
        kind: AlertKind,
        config: AlertConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            kind,
            config,
            staged_config: None,
            state: NotificationState::Idle,
            deadline: None,
            last_score: None,
            paused: false,
            clock,
        })
    }

    /// Feed one smoothed score into the state machine. Called once per
    /// analysis tick; deadline checks happen here too, so a host that only
    /// ever ticks still gets correct (tick-quantized) alert timing.
    pub fn observe(&mut self, score: f64, sink: &mut dyn AlertSink) {
        self.last_score = Some(score);
        if self.paused {
            return;
        }
        let now = self.clock.now();

        match self.state {
            NotificationState::Idle => {
                if score > self.config.threshold {
                    self.arm_pending(now);
                }
            }
            NotificationState::Pending => {
                if score <= self.config.threshold {
                    // Debounce: a dip below threshold fully resets the
                    // pending alert, it does not merely pause it
                    self.enter_idle();
                } else if self.deadline_passed(now) {
                    self.fire_first_alert(score, now, sink);
                }
            }
            NotificationState::Cooldown => {
                if self.deadline_passed(now) {
                    // Cooldown is purely time-based; the score is
                    // re-evaluated on this very tick
                    self.enter_idle();
                    if score > self.config.threshold {
                        self.arm_pending(now);
                    }
                }
            }
            NotificationState::Continuous => {
                if score <= self.config.threshold {
                    self.enter_idle();
                } else if self.deadline_passed(now) {
                    self.emit(score, sink);
                    self.deadline = Some(now + self.config.continuous_interval());
                }
            }
        }
    }

    /// Evaluate deadlines between ticks. Timer-driven effects (a pending
    /// delay elapsing, a continuous repeat coming due) fire here using the
    /// last observed score; arming a new cycle always waits for a tick.
    pub fn poll(&mut self, sink: &mut dyn AlertSink) {
        if self.paused {
            return;
        }
        let now = self.clock.now();

        match self.state {
            NotificationState::Idle => {}
            NotificationState::Pending => {
                // Score has stayed above threshold since arming, or an
                // observe() would have disarmed
                if self.deadline_passed(now) {
                    let score = self.last_score.unwrap_or(self.config.threshold);
                    self.fire_first_alert(score, now, sink);
                }
            }
            NotificationState::Cooldown => {
                if self.deadline_passed(now) {
                    self.enter_idle();
                }
            }
            NotificationState::Continuous => {
                if self.deadline_passed(now) {
                    let score = self.last_score.unwrap_or(self.config.threshold);
                    self.emit(score, sink);
                    self.deadline = Some(now + self.config.continuous_interval());
                }
            }
        }
    }

    /// Pausing cancels all timers immediately with no final alert.
    /// Unpausing never resumes the old cycle.
    pub fn set_paused(&mut self, paused: bool) {
        if paused && !self.paused {
            self.enter_idle();
        }
        self.paused = paused;
    }

    /// Cancel everything and return to Idle; called when detection is
    /// disabled
    pub fn reset(&mut self) {
        self.enter_idle();
        self.last_score = None;
    }

    /// Reconfigure. Applied immediately when Idle; while a cycle is in
    /// flight the change is staged and takes effect once the machine
    /// returns to Idle, so an in-flight alert cycle is never aborted.
    pub fn set_config(&mut self, config: AlertConfig) -> Result<(), CoreError> {
        config.validate()?;
        if self.state == NotificationState::Idle {
            self.config = config;
            self.staged_config = None;
        } else {
            self.staged_config = Some(config);
        }
        Ok(())
    }

    pub fn state(&self) -> NotificationState {
        self.state
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    fn arm_pending(&mut self, now: Duration) {
        self.state = NotificationState::Pending;
        self.deadline = Some(now + self.config.trigger_delay());
    }

    fn enter_idle(&mut self) {
        self.state = NotificationState::Idle;
        self.deadline = None;
        if let Some(config) = self.staged_config.take() {
            self.config = config;
        }
    }

    fn deadline_passed(&self, now: Duration) -> bool {
        self.deadline.map(|d| now >= d).unwrap_or(false)
    }

    fn fire_first_alert(&mut self, score: f64, now: Duration, sink: &mut dyn AlertSink) {
        self.emit(score, sink);
        match self.config.mode {
            AlertMode::Cooldown => {
                self.state = NotificationState::Cooldown;
                self.deadline = Some(now + self.config.cooldown());
            }
            AlertMode::Continuous => {
                self.state = NotificationState::Continuous;
                self.deadline = Some(now + self.config.continuous_interval());
            }
        }
    }

    fn emit(&self, score: f64, sink: &mut dyn AlertSink) {
        let message = match self.kind {
            AlertKind::Posture => {
                format!("Posture check: slouch score {:.0} is above your threshold", score)
            }
            AlertKind::Drowsiness => "Drowsiness check: your eyes have been closing".to_string(),
        };
        sink.deliver(&AlertEvent {
            kind: self.kind,
            message,
            score,
            emitted_at: Utc::now(),
        });
    }
}
