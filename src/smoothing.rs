//! Temporal score smoothing
//!
//! A fixed-capacity moving average damps single-frame detection noise.
//! At the default capacity of 3 and the ~1.5s analysis cadence the
//! effective window is about 4.5 seconds.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of raw scores in the smoothing window
pub const DEFAULT_SMOOTHING_WINDOW: usize = 3;

/// Fixed-capacity FIFO of raw scores; the published score is the mean of
/// the current contents. Oldest values are evicted first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoothingBuffer {
    values: VecDeque<f64>,
    capacity: usize,
}

impl Default for SmoothingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_WINDOW)
    }
}

impl SmoothingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a raw score and return the new mean
    pub fn push(&mut self, raw: f64) -> f64 {
        self.values.push_back(raw);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
        // Never empty right after a push
        self.mean().unwrap_or(raw)
    }

    /// Mean of the current contents, None when empty
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let sum: f64 = self.values.iter().sum();
        Some(sum / self.values.len() as f64)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mean_of_partial_window() {
        let mut buffer = SmoothingBuffer::new(3);
        assert_eq!(buffer.push(30.0), 30.0);
        assert_eq!(buffer.push(60.0), 45.0);
    }

    #[test]
    fn test_saturates_to_true_mean() {
        let mut buffer = SmoothingBuffer::new(3);
        buffer.push(10.0);
        buffer.push(40.0);
        for _ in 0..3 {
            buffer.push(80.0);
        }
        // After 3 identical scores the window holds only 80s
        assert_eq!(buffer.mean(), Some(80.0));
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut buffer = SmoothingBuffer::new(3);
        for v in [10.0, 20.0, 30.0, 40.0] {
            buffer.push(v);
        }
        assert_eq!(buffer.len(), 3);
        // 10.0 evicted; mean of 20, 30, 40
        assert_eq!(buffer.mean(), Some(30.0));
    }

    #[test]
    fn test_clear_empties_window() {
        let mut buffer = SmoothingBuffer::new(3);
        buffer.push(50.0);
        buffer.clear();
        assert_eq!(buffer.mean(), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_zero_capacity_clamped_to_one() {
        let mut buffer = SmoothingBuffer::new(0);
        buffer.push(10.0);
        assert_eq!(buffer.push(20.0), 20.0);
    }
}
