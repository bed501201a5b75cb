// src/telemetry/history.rs
//! Capped sample history

use std::collections::{vec_deque, VecDeque};

/// Ordered history that drops its oldest entries once `capacity` is reached.
/// A capacity of `None` keeps everything.
#[derive(Debug, Clone)]
pub struct History<T> {
    items: VecDeque<T>,
    capacity: Option<usize>,
}

impl<T> History<T> {
    pub fn new(capacity: Option<usize>) -> Self {
        // A zero capacity would never hold the latest sample
        let capacity = capacity.map(|c| c.max(1));
        Self {
            items: VecDeque::with_capacity(capacity.unwrap_or(0)),
            capacity,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Append a sample, evicting from the front while over capacity
    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
        if let Some(cap) = self.capacity {
            while self.items.len() > cap {
                self.items.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.items.iter()
    }

    /// The `n` most recent items, oldest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &T> {
        self.items.iter().skip(self.items.len().saturating_sub(n))
    }
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}
