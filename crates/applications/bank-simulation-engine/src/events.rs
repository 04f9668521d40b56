//! Logical clock and time-ordered event queue
//!
//! Events are ordered by `(time, sequence)`. The sequence number is handed
//! out at schedule time, so events due at the same instant fire in the order
//! they were scheduled regardless of how the heap breaks ties.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};
use crate::types::ProcessId;

/// Identifies a scheduled event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventHandle {
    pub time: f64,
    pub sequence: u64,
}

/// A pending resumption of `process` at `time`
#[derive(Debug, Clone, Copy)]
pub struct ScheduledEvent {
    time: f64,
    sequence: u64,
    process: ProcessId,
}

impl ScheduledEvent {
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The process to resume when this event fires
    pub fn process(&self) -> ProcessId {
        self.process
    }

    pub fn handle(&self) -> EventHandle {
        EventHandle {
            time: self.time,
            sequence: self.sequence,
        }
    }
}

// BinaryHeap is a max-heap; reverse both keys so the earliest
// (time, sequence) pair sits on top.
impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScheduledEvent {}

/// Simulation clock plus the queue of pending events
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<ScheduledEvent>,
    now: f64,
    next_sequence: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated time
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Schedule `process` to resume `delay` time units from now
    pub fn schedule(&mut self, delay: f64, process: ProcessId) -> Result<EventHandle> {
        if !(delay >= 0.0 && delay.is_finite()) {
            return Err(SimulationError::NegativeDelay { delay });
        }

        let event = ScheduledEvent {
            time: self.now + delay,
            sequence: self.next_sequence,
            process,
        };
        self.next_sequence += 1;
        self.heap.push(event);

        Ok(event.handle())
    }

    /// Remove the earliest event and move the clock to its time.
    ///
    /// Returns `Ok(None)` once nothing is pending.
    pub fn advance(&mut self) -> Result<Option<ScheduledEvent>> {
        let Some(event) = self.heap.pop() else {
            return Ok(None);
        };

        if event.time < self.now {
            return Err(SimulationError::SchedulingInvariant {
                scheduled: event.time,
                now: self.now,
            });
        }

        self.now = event.time;
        Ok(Some(event))
    }

    /// Time of the next pending event without removing it
    pub fn peek_time(&self) -> Option<f64> {
        self.heap.peek().map(|event| event.time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
