//! Timestamp matching of head and tail events.
//!
//! Events from the two subsystems arrive independently and possibly out of order.
//! Each new event is paired with the closest-in-time pending event of the other
//! subsystem if the two are within the coincidence window; otherwise it waits in
//! the queue. Events leave the queue exactly once: matched into a
//! [`CoincidenceEvent`], or evicted as an unmatched single.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};
use std::time::Instant;

use super::diagnostics::Diagnostics;
use super::error::CoincidenceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subsystem {
    Head,
    Tail,
}

impl Subsystem {
    pub fn other(&self) -> Self {
        match self {
            Self::Head => Self::Tail,
            Self::Tail => Self::Head,
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::Head => 0,
            Self::Tail => 1,
        }
    }
}

/// Source of "current time" for time-budgeted flushing. Supplied by the caller so the
/// queue never reads a clock of its own choosing.
pub trait Clock {
    fn now(&self) -> u64;
}

/// Milliseconds elapsed since the clock was created
#[derive(Debug, Clone)]
pub struct WallClock {
    start: Instant,
}

impl Default for WallClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for WallClock {
    fn now(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// An event as handed to the queue
#[derive(Debug, Clone, PartialEq)]
pub struct Timestamped<T> {
    pub subsystem: Subsystem,
    pub timestamp: u64,
    pub payload: T,
}

impl<T> Timestamped<T> {
    pub fn new(subsystem: Subsystem, timestamp: u64, payload: T) -> Self {
        Self {
            subsystem,
            timestamp,
            payload,
        }
    }
}

/// An event owned by the queue, stamped with its arrival order
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent<T> {
    pub subsystem: Subsystem,
    pub timestamp: u64,
    pub arrival: u64,
    pub payload: T,
}

/// A matched head/tail pair. Always holds one event of each subsystem, within the window.
#[derive(Debug, Clone, PartialEq)]
pub struct CoincidenceEvent<T> {
    head: PendingEvent<T>,
    tail: PendingEvent<T>,
}

impl<T> CoincidenceEvent<T> {
    /// Pair two events, in either order
    pub fn new(
        first: PendingEvent<T>,
        second: PendingEvent<T>,
        window: u64,
    ) -> Result<Self, CoincidenceError> {
        if first.subsystem == second.subsystem {
            return Err(CoincidenceError::SameSubsystem(first.subsystem));
        }
        let delta = first.timestamp.abs_diff(second.timestamp);
        if delta > window {
            return Err(CoincidenceError::OutsideWindow { delta, window });
        }
        Ok(Self::pair(first, second))
    }

    fn pair(first: PendingEvent<T>, second: PendingEvent<T>) -> Self {
        match first.subsystem {
            Subsystem::Head => Self {
                head: first,
                tail: second,
            },
            Subsystem::Tail => Self {
                head: second,
                tail: first,
            },
        }
    }

    pub fn head(&self) -> &PendingEvent<T> {
        &self.head
    }

    pub fn tail(&self) -> &PendingEvent<T> {
        &self.tail
    }

    /// Absolute timestamp difference of the pair
    pub fn delta(&self) -> u64 {
        self.head.timestamp.abs_diff(self.tail.timestamp)
    }

    pub fn into_parts(self) -> (PendingEvent<T>, PendingEvent<T>) {
        (self.head, self.tail)
    }
}

/// Everything that can leave the queue
#[derive(Debug, Clone, PartialEq)]
pub enum QueueOutput<T> {
    Coincidence(CoincidenceEvent<T>),
    Single(PendingEvent<T>),
}

/// Receiver of the events that leave the queue
pub trait QueueSink<T> {
    fn coincidence(&mut self, event: CoincidenceEvent<T>);
    fn single(&mut self, event: PendingEvent<T>);
}

impl<T> QueueSink<T> for Vec<QueueOutput<T>> {
    fn coincidence(&mut self, event: CoincidenceEvent<T>) {
        self.push(QueueOutput::Coincidence(event));
    }

    fn single(&mut self, event: PendingEvent<T>) {
        self.push(QueueOutput::Single(event));
    }
}

/// Pending events keyed by (timestamp, arrival), one map per subsystem
type PendingMap<T> = BTreeMap<(u64, u64), T>;

/// The coincidence matching engine.
///
/// `window` is the largest timestamp difference for a match. `timeout` is the
/// residency budget: once a subsystem's clock has moved more than `timeout` ticks
/// past one of its pending events, that event is evicted as a single.
#[derive(Debug)]
pub struct CoincidenceQueue<T, C = WallClock> {
    window: u64,
    timeout: u64,
    pending: [PendingMap<T>; 2],
    next_arrival: u64,
    clock: C,
}

impl<T> CoincidenceQueue<T, WallClock> {
    pub fn new(window: u64, timeout: u64) -> Self {
        Self::with_clock(window, timeout, WallClock::default())
    }
}

impl<T, C: Clock> CoincidenceQueue<T, C> {
    pub fn with_clock(window: u64, timeout: u64, clock: C) -> Self {
        Self {
            window,
            timeout,
            pending: [BTreeMap::new(), BTreeMap::new()],
            next_arrival: 0,
            clock,
        }
    }

    pub fn window(&self) -> u64 {
        self.window
    }

    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    /// Total number of pending events
    pub fn len(&self) -> usize {
        self.pending.iter().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.iter().all(BTreeMap::is_empty)
    }

    pub fn len_of(&self, subsystem: Subsystem) -> usize {
        self.pending[subsystem.index()].len()
    }

    /// Add an event. It is matched immediately against the closest pending event of the
    /// other subsystem, or kept pending if nothing lies within the window.
    pub fn push<S: QueueSink<T> + ?Sized>(
        &mut self,
        event: Timestamped<T>,
        diagnostics: &mut Diagnostics,
        sink: &mut S,
    ) {
        let Timestamped {
            subsystem,
            timestamp,
            payload,
        } = event;
        let arrival = self.next_arrival;
        self.next_arrival += 1;
        diagnostics.record_push(subsystem);

        let own = &self.pending[subsystem.index()];
        if let Some((&(oldest, _), _)) = own.first_key_value() {
            if timestamp < oldest {
                diagnostics.out_of_order += 1;
                spdlog::debug!(
                    "Out of order {subsystem:?} event: timestamp {timestamp} is older than pending {oldest}"
                );
            }
        }

        self.evict_expired(subsystem, timestamp, diagnostics, sink);

        let other = subsystem.other();
        if let Some(key) = self.closest(other, timestamp) {
            if key.0.abs_diff(timestamp) <= self.window {
                if let Some(partner) = self.pending[other.index()].remove(&key) {
                    let partner = PendingEvent {
                        subsystem: other,
                        timestamp: key.0,
                        arrival: key.1,
                        payload: partner,
                    };
                    let incoming = PendingEvent {
                        subsystem,
                        timestamp,
                        arrival,
                        payload,
                    };
                    diagnostics.matches += 1;
                    sink.coincidence(CoincidenceEvent::pair(incoming, partner));
                    return;
                }
            }
        }

        self.pending[subsystem.index()].insert((timestamp, arrival), payload);
        diagnostics.record_depth(self.len());
    }

    /// Time-budgeted drain: evict the oldest events one at a time until the queue is
    /// empty or `flush_time` ticks of the clock have passed. Returns the number evicted.
    pub fn flush<S: QueueSink<T> + ?Sized>(
        &mut self,
        flush_time: u64,
        diagnostics: &mut Diagnostics,
        sink: &mut S,
    ) -> usize {
        let start = self.clock.now();
        let mut evicted = 0;
        while !self.is_empty() && self.clock.now().saturating_sub(start) < flush_time {
            self.flush_iterative(diagnostics, sink);
            evicted += 1;
        }
        evicted
    }

    /// Evict the single oldest pending event (smallest timestamp, then earliest arrival).
    /// Returns the number of events still pending; a no-op on an empty queue.
    pub fn flush_iterative<S: QueueSink<T> + ?Sized>(
        &mut self,
        diagnostics: &mut Diagnostics,
        sink: &mut S,
    ) -> usize {
        let head_key = self.pending[Subsystem::Head.index()].first_key_value().map(|(k, _)| *k);
        let tail_key = self.pending[Subsystem::Tail.index()].first_key_value().map(|(k, _)| *k);
        let oldest = match (head_key, tail_key) {
            (Some(h), Some(t)) if t < h => Some((Subsystem::Tail, t)),
            (Some(h), _) => Some((Subsystem::Head, h)),
            (None, Some(t)) => Some((Subsystem::Tail, t)),
            (None, None) => None,
        };
        if let Some((subsystem, key)) = oldest {
            self.evict(subsystem, key, diagnostics, sink);
        }
        self.len()
    }

    /// Evict everything. Used at the end of a run. Returns the number evicted.
    pub fn flush_all<S: QueueSink<T> + ?Sized>(
        &mut self,
        diagnostics: &mut Diagnostics,
        sink: &mut S,
    ) -> usize {
        let mut evicted = 0;
        while !self.is_empty() {
            self.flush_iterative(diagnostics, sink);
            evicted += 1;
        }
        evicted
    }

    /// Key of the pending event of `subsystem` closest in time to `timestamp`.
    /// Equal distances go to the earlier arrival.
    fn closest(&self, subsystem: Subsystem, timestamp: u64) -> Option<(u64, u64)> {
        let map = &self.pending[subsystem.index()];
        // Largest timestamp <= target, earliest arrival among equals
        let below = map
            .range(..=(timestamp, u64::MAX))
            .next_back()
            .and_then(|(&(ts, _), _)| map.range((ts, 0)..).next())
            .map(|(k, _)| *k);
        // Smallest timestamp > target; BTreeMap order already gives the earliest arrival
        let above = map
            .range((Excluded((timestamp, u64::MAX)), Unbounded))
            .next()
            .map(|(k, _)| *k);

        match (below, above) {
            (Some(b), Some(a)) => {
                let d_below = timestamp - b.0;
                let d_above = a.0 - timestamp;
                if d_below < d_above || (d_below == d_above && b.1 < a.1) {
                    Some(b)
                } else {
                    Some(a)
                }
            }
            (b, a) => b.or(a),
        }
    }

    /// Evict pending events of `subsystem` whose residency budget has run out
    /// relative to `now`, a timestamp of the same subsystem
    fn evict_expired<S: QueueSink<T> + ?Sized>(
        &mut self,
        subsystem: Subsystem,
        now: u64,
        diagnostics: &mut Diagnostics,
        sink: &mut S,
    ) {
        while let Some(&key) = self.pending[subsystem.index()].keys().next() {
            if key.0.saturating_add(self.timeout) >= now {
                break;
            }
            diagnostics.forced_evictions += 1;
            self.evict(subsystem, key, diagnostics, sink);
        }
    }

    fn evict<S: QueueSink<T> + ?Sized>(
        &mut self,
        subsystem: Subsystem,
        key: (u64, u64),
        diagnostics: &mut Diagnostics,
        sink: &mut S,
    ) {
        if let Some(payload) = self.pending[subsystem.index()].remove(&key) {
            spdlog::debug!(
                "Evicting unmatched {subsystem:?} event with timestamp {}",
                key.0
            );
            diagnostics.record_unmatched(subsystem);
            sink.single(PendingEvent {
                subsystem,
                timestamp: key.0,
                arrival: key.1,
                payload,
            });
        }
    }
}
