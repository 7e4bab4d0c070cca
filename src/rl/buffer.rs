use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Fixed-length FIFO of broadcast reward prices. Index 0 applies to the
/// step being committed; each push shifts left and appends at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBuffer {
    values: VecDeque<f64>,
    previous_newest: f64,
}

impl PriceBuffer {
    /// Zero-filled buffer of `len` entries (at least one).
    pub fn new(len: usize) -> Self {
        Self {
            values: std::iter::repeat(0.0).take(len.max(1)).collect(),
            previous_newest: 0.0,
        }
    }

    pub fn push(&mut self, price: f64) {
        self.previous_newest = self.newest();
        self.values.pop_front();
        self.values.push_back(price);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn front(&self) -> f64 {
        self.values.front().copied().unwrap_or(0.0)
    }

    pub fn newest(&self) -> f64 {
        self.values.back().copied().unwrap_or(0.0)
    }

    /// Newest price minus the one pushed before it.
    pub fn last_change(&self) -> f64 {
        self.newest() - self.previous_newest
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }
}
