// =============================================================================
// Rolling Window — fixed-length FIFO of the most recent values
// =============================================================================

use std::collections::VecDeque;

/// Holds the last `len` values pushed. Aggregates return `None` until the
/// window is full, so callers cannot mistake a warm-up value for a real one.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: VecDeque<f64>,
    len: usize,
}

impl RollingWindow {
    pub fn new(len: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(len),
            len,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.len == 0 {
            return;
        }
        if self.values.len() == self.len {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn is_full(&self) -> bool {
        self.len > 0 && self.values.len() == self.len
    }

    pub fn max(&self) -> Option<f64> {
        if !self.is_full() {
            return None;
        }
        self.values.iter().copied().reduce(f64::max)
    }

    pub fn min(&self) -> Option<f64> {
        if !self.is_full() {
            return None;
        }
        self.values.iter().copied().reduce(f64::min)
    }

    pub fn mean(&self) -> Option<f64> {
        if !self.is_full() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.len as f64)
    }
}
