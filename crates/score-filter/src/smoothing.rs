//! Moving-average smoothing window

use std::collections::VecDeque;

/// Smallest smoothing window
pub const MIN_WINDOW: usize = 1;
/// Largest smoothing window
pub const MAX_WINDOW: usize = 10;

/// Bounded FIFO of raw scores returning their arithmetic mean.
///
/// Changing the capacity only affects later pushes; samples already in the
/// window are trimmed on the next push, not re-averaged.
#[derive(Debug, Clone)]
pub struct SmoothingWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SmoothingWindow {
    /// Create a window; capacity is clamped to `[MIN_WINDOW, MAX_WINDOW]`
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(MIN_WINDOW, MAX_WINDOW);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Push a raw score and return the smoothed value
    pub fn push(&mut self, score: f64) -> f64 {
        self.samples.push_back(score);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        self.mean()
    }

    /// Mean of the current contents (0 when empty)
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Change the window size for future pushes
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.clamp(MIN_WINDOW, MAX_WINDOW);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop all samples
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
