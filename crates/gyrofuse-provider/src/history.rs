//! Fixed-size FIFO of scalar samples for chart consumers.
//!
//! Count-based, not time-windowed: once full, each push evicts the oldest
//! entry.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RollingHistory {
    capacity: usize,
    values: VecDeque<f32>,
}

impl RollingHistory {
    /// A capacity of `0` is raised to `1`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.values.iter().copied()
    }

    pub fn latest(&self) -> Option<f32> {
        self.values.back().copied()
    }

    pub fn min(&self) -> Option<f32> {
        self.iter().reduce(f32::min)
    }

    pub fn max(&self) -> Option<f32> {
        self.iter().reduce(f32::max)
    }

    pub fn mean(&self) -> Option<f32> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.iter().sum::<f32>() / self.values.len() as f32)
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.iter().collect()
    }
}
