use serde::{Deserialize, Serialize};

use super::queue::Subsystem;

/// Counters describing how the coincidence matching went.
///
/// Only the coincidence queue (and the unpacker for events it could not queue)
/// updates these, at push, match, and eviction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub head_pushed: u64,
    pub tail_pushed: u64,
    pub matches: u64,
    pub head_unmatched: u64,
    pub tail_unmatched: u64,
    pub out_of_order: u64,
    pub forced_evictions: u64,
    pub missing_timestamp: u64,
    pub invalid_pairs: u64,
    pub max_queue_depth: usize,
}

impl Diagnostics {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_push(&mut self, subsystem: Subsystem) {
        match subsystem {
            Subsystem::Head => self.head_pushed += 1,
            Subsystem::Tail => self.tail_pushed += 1,
        }
    }

    pub fn record_unmatched(&mut self, subsystem: Subsystem) {
        match subsystem {
            Subsystem::Head => self.head_unmatched += 1,
            Subsystem::Tail => self.tail_unmatched += 1,
        }
    }

    pub fn record_depth(&mut self, depth: usize) {
        self.max_queue_depth = self.max_queue_depth.max(depth);
    }

    pub fn pushed(&self) -> u64 {
        self.head_pushed + self.tail_pushed
    }

    pub fn unmatched(&self) -> u64 {
        self.head_unmatched + self.tail_unmatched
    }
}
