//! Shutdown handshake
//!
//! A two-party protocol run once per application lifetime: the supervising
//! context asks the worker context to release its resources (camera,
//! timers) before termination, and proceeds regardless once a 5 second
//! timeout elapses. A hung or crashed worker must never block shutdown.
//!
//! The two halves communicate over typed channels with exactly one
//! endpoint each, so handlers cannot accumulate across reconfiguration.

use crate::clock::Clock;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

/// Time the supervisor waits for the worker's acknowledgement
pub const CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Handshake progression; exactly one terminal state is reached per
/// process lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeState {
    Running,
    CleanupRequested,
    CleanupAcknowledged,
    ForcedTermination,
}

impl HandshakeState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HandshakeState::CleanupAcknowledged | HandshakeState::ForcedTermination
        )
    }
}

struct CleanupRequest;
struct CleanupAck;

/// Supervisor half of the handshake
pub struct ShutdownCoordinator {
    state: HandshakeState,
    timeout: Duration,
    deadline: Option<Duration>,
    clock: Arc<dyn Clock>,
    request_tx: Sender<CleanupRequest>,
    ack_rx: Receiver<CleanupAck>,
}

/// Worker half of the handshake
pub struct WorkerEndpoint {
    request_rx: Receiver<CleanupRequest>,
    ack_tx: Sender<CleanupAck>,
    acknowledged: bool,
}

/// Create a connected supervisor/worker pair with the default timeout
pub fn handshake(clock: Arc<dyn Clock>) -> (ShutdownCoordinator, WorkerEndpoint) {
    handshake_with_timeout(clock, CLEANUP_TIMEOUT)
}

pub fn handshake_with_timeout(
    clock: Arc<dyn Clock>,
    timeout: Duration,
) -> (ShutdownCoordinator, WorkerEndpoint) {
    let (request_tx, request_rx) = mpsc::channel();
    let (ack_tx, ack_rx) = mpsc::channel();
    (
        ShutdownCoordinator {
            state: HandshakeState::Running,
            timeout,
            deadline: None,
            clock,
            request_tx,
            ack_rx,
        },
        WorkerEndpoint {
            request_rx,
            ack_tx,
            acknowledged: false,
        },
    )
}

impl ShutdownCoordinator {
    /// Send the cleanup signal and start the timeout. Repeat calls after
    /// the first are no-ops.
    pub fn request_cleanup(&mut self) {
        if self.state != HandshakeState::Running {
            return;
        }
        // A gone worker is handled by the timeout, not treated as an error
        let _ = self.request_tx.send(CleanupRequest);
        self.state = HandshakeState::CleanupRequested;
        self.deadline = Some(self.clock.now() + self.timeout);
    }

    /// Resolve the handshake: the acknowledgement and the timeout race,
    /// first to resolve wins. Returns the current state; once terminal it
    /// never changes, and a late acknowledgement is ignored.
    pub fn poll(&mut self) -> HandshakeState {
        if self.state == HandshakeState::CleanupRequested {
            match self.ack_rx.try_recv() {
                Ok(CleanupAck) => {
                    self.state = HandshakeState::CleanupAcknowledged;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                    let timed_out = self
                        .deadline
                        .map(|d| self.clock.now() >= d)
                        .unwrap_or(false);
                    if timed_out {
                        self.state = HandshakeState::ForcedTermination;
                    }
                }
            }
        }
        self.state
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }
}

impl WorkerEndpoint {
    /// True once when a cleanup request is waiting
    pub fn take_request(&mut self) -> bool {
        self.request_rx.try_recv().is_ok()
    }

    /// Signal that cleanup is complete. Safe to call at any time: a repeat
    /// or late acknowledgement is a no-op, not an error.
    pub fn acknowledge(&mut self) -> Result<(), CoreError> {
        if self.acknowledged {
            return Ok(());
        }
        self.acknowledged = true;
        self.ack_tx
            .send(CleanupAck)
            .map_err(|_| CoreError::ChannelClosed("supervisor endpoint gone".to_string()))
    }

    pub fn has_acknowledged(&self) -> bool {
        self.acknowledged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use pretty_assertions::assert_eq;

    fn pair() -> (ShutdownCoordinator, WorkerEndpoint, ManualClock) {
        let clock = ManualClock::new();
        let (coordinator, worker) = handshake(Arc::new(clock.clone()));
        (coordinator, worker, clock)
    }

    #[test]
    fn test_ack_before_timeout_resolves_acknowledged() {
        let (mut coordinator, mut worker, clock) = pair();

        coordinator.request_cleanup();
        assert_eq!(coordinator.state(), HandshakeState::CleanupRequested);
        assert!(worker.take_request());

        clock.advance(Duration::from_secs(2));
        worker.acknowledge().unwrap();

        assert_eq!(coordinator.poll(), HandshakeState::CleanupAcknowledged);
        assert!(coordinator.state().is_terminal());
    }

    #[test]
    fn test_timeout_resolves_forced_termination_at_five_seconds() {
        let (mut coordinator, _worker, clock) = pair();

        coordinator.request_cleanup();

        clock.advance(Duration::from_millis(4999));
        assert_eq!(coordinator.poll(), HandshakeState::CleanupRequested);

        clock.advance(Duration::from_millis(1));
        assert_eq!(coordinator.poll(), HandshakeState::ForcedTermination);
    }

    #[test]
    fn test_late_ack_is_ignored() {
        let (mut coordinator, mut worker, clock) = pair();

        coordinator.request_cleanup();
        clock.advance(Duration::from_secs(6));
        assert_eq!(coordinator.poll(), HandshakeState::ForcedTermination);

        // Worker wakes up after the fact; terminal state does not change
        worker.acknowledge().unwrap();
        assert_eq!(coordinator.poll(), HandshakeState::ForcedTermination);
    }

    #[test]
    fn test_crashed_worker_never_blocks_shutdown() {
        let (mut coordinator, worker, clock) = pair();
        drop(worker);

        coordinator.request_cleanup();
        clock.advance(Duration::from_secs(5));
        assert_eq!(coordinator.poll(), HandshakeState::ForcedTermination);
    }

    #[test]
    fn test_request_cleanup_is_idempotent() {
        let (mut coordinator, mut worker, clock) = pair();

        coordinator.request_cleanup();
        clock.advance(Duration::from_secs(1));
        coordinator.request_cleanup();

        // Only one request reaches the worker's queue from the first call;
        // a second call does not restart the timeout
        assert!(worker.take_request());
        assert!(!worker.take_request());

        clock.advance(Duration::from_secs(4));
        assert_eq!(coordinator.poll(), HandshakeState::ForcedTermination);
    }

    #[test]
    fn test_repeat_acknowledge_is_noop() {
        let (mut coordinator, mut worker, _clock) = pair();

        coordinator.request_cleanup();
        worker.take_request();
        worker.acknowledge().unwrap();
        worker.acknowledge().unwrap();

        assert_eq!(coordinator.poll(), HandshakeState::CleanupAcknowledged);
    }
}
