//! Bounded elevation memo keyed by rounded coordinate.
//!
//! The default policy clears the whole map when an insert would exceed
//! capacity. That matches the behaviour callers already observe; `Fifo` is
//! available for hosts that opt in but is never selected implicitly.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::coords::CoordKey;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Drop every entry, then insert.
    #[default]
    ClearAll,
    /// Drop the oldest inserted entry, then insert.
    Fifo,
}

#[derive(Debug, Clone)]
pub struct ElevationCache {
    entries: HashMap<CoordKey, f64>,
    order: VecDeque<CoordKey>,
    capacity: usize,
    policy: EvictionPolicy,
    clears: u64,
}

impl ElevationCache {
    pub fn new(capacity: usize, policy: EvictionPolicy) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity.min(8192)),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            policy,
            clears: 0,
        }
    }

    pub fn get(&self, key: &CoordKey) -> Option<f64> {
        self.entries.get(key).copied()
    }

    pub fn insert(&mut self, key: CoordKey, elevation: f64) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, elevation);
            return;
        }
        if self.entries.len() >= self.capacity {
            match self.policy {
                EvictionPolicy::ClearAll => {
                    tracing::debug!(
                        target: "riskscape::terrain",
                        evicted = self.entries.len(),
                        "elevation_cache.cleared"
                    );
                    self.entries.clear();
                    self.order.clear();
                    self.clears += 1;
                }
                EvictionPolicy::Fifo => {
                    if let Some(oldest) = self.order.pop_front() {
                        self.entries.remove(&oldest);
                    }
                }
            }
        }
        self.entries.insert(key, elevation);
        if self.policy == EvictionPolicy::Fifo {
            self.order.push_back(key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of full clears performed so far.
    pub fn clear_count(&self) -> u64 {
        self.clears
    }
}
