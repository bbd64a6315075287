//! Clock abstractions for deterministic scheduling
//!
//! Every timing decision in the core (trigger delays, cooldowns, repeat
//! intervals, the shutdown timeout) reads time through [`Clock`], so the
//! schedulers can be driven by [`ManualClock`] in tests and offline
//! simulation without wall-clock waits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source measured from an arbitrary origin
pub trait Clock {
    /// Elapsed time since the clock's origin
    fn now(&self) -> Duration;
}

/// Clock backed by the monotonic OS clock
/// INVARIANT: readings never decrease, even across system clock changes
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually advanced clock. Clones share the same underlying time, so a
/// test can hold one handle while the scheduler reads another.
#[derive(Clone)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            micros: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Move time forward by `dt`
    pub fn advance(&self, dt: Duration) {
        self.micros
            .fetch_add(dt.as_micros() as u64, Ordering::SeqCst);
    }

    /// Jump to an absolute offset from the origin; only moves forward
    pub fn set(&self, t: Duration) {
        let target = t.as_micros() as u64;
        self.micros.fetch_max(target, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }
}
