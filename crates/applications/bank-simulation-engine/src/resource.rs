//! Finite-capacity teller pool with a strict FIFO wait line
//!
//! Invariants held after every call:
//! - `in_use <= capacity`
//! - the wait line is non-empty only while `in_use == capacity`
//! - grants leave the line in exactly the order requests joined it

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SimulationError};
use crate::types::ProcessId;

/// A process waiting for a unit of this pool
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub process: ProcessId,
    /// Position in the pool's overall request sequence
    pub order: u64,
    pub requested_at: f64,
}

/// Outcome of [`ResourcePool::request`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// A unit was free and is now held by the requester
    Granted,
    /// All units busy; the request joined the line at this position (0 = head)
    Queued { position: usize },
}

/// Tellers sharing one line
#[derive(Debug, Clone)]
pub struct ResourcePool {
    id: usize,
    capacity: u32,
    in_use: u32,
    wait_queue: VecDeque<ResourceRequest>,
    next_order: u64,

    // Metrics
    grants: u64,
    max_queue_len: usize,
}

impl ResourcePool {
    /// `capacity` is validated by the scenario config; zero would deadlock
    pub fn new(id: usize, capacity: u32) -> Self {
        debug_assert!(capacity >= 1, "pool capacity must be at least 1");
        ResourcePool {
            id,
            capacity,
            in_use: 0,
            wait_queue: VecDeque::new(),
            next_order: 0,
            grants: 0,
            max_queue_len: 0,
        }
    }

    /// Ask for one unit. Grants immediately when one is free, otherwise
    /// appends the request to the end of the line.
    pub fn request(&mut self, process: ProcessId, now: f64) -> Acquire {
        let request = ResourceRequest {
            process,
            order: self.next_order,
            requested_at: now,
        };
        self.next_order += 1;

        if self.in_use < self.capacity {
            self.in_use += 1;
            self.grants += 1;
            debug!(pool = self.id, %process, in_use = self.in_use, "granted on request");
            return Acquire::Granted;
        }

        self.wait_queue.push_back(request);
        self.max_queue_len = self.max_queue_len.max(self.wait_queue.len());
        let position = self.wait_queue.len() - 1;
        debug!(pool = self.id, %process, position, "pool busy, queued");
        Acquire::Queued { position }
    }

    /// Give back one unit held by `process`.
    ///
    /// If someone is waiting, the unit passes straight to the head of the
    /// line and that request is returned so its grant can be scheduled.
    pub fn release(&mut self, process: ProcessId) -> Result<Option<ResourceRequest>> {
        if self.in_use == 0 {
            return Err(SimulationError::ReleaseWithoutGrant { pool: self.id });
        }
        self.in_use -= 1;
        debug!(pool = self.id, %process, in_use = self.in_use, "released");

        let Some(next) = self.wait_queue.pop_front() else {
            return Ok(None);
        };
        self.in_use += 1;
        self.grants += 1;
        debug!(pool = self.id, process = %next.process, "granted from line");

        Ok(Some(next))
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn in_use(&self) -> u32 {
        self.in_use
    }

    pub fn queue_len(&self) -> usize {
        self.wait_queue.len()
    }

    /// Longest the line has been during this run
    pub fn max_queue_len(&self) -> usize {
        self.max_queue_len
    }

    /// Requests made so far, granted or still in line
    pub fn requests(&self) -> u64 {
        self.next_order
    }

    pub fn grants(&self) -> u64 {
        self.grants
    }

    /// Requests currently in line, head first
    pub fn waiting(&self) -> impl Iterator<Item = &ResourceRequest> {
        self.wait_queue.iter()
    }

    /// Both pool invariants hold
    pub fn is_consistent(&self) -> bool {
        self.in_use <= self.capacity && (self.wait_queue.is_empty() || self.in_use == self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(id: u64) -> ProcessId {
        ProcessId::Customer(id)
    }

    #[test]
    fn test_grants_until_full_then_queues() {
        let mut pool = ResourcePool::new(0, 2);

        assert_eq!(pool.request(customer(1), 0.0), Acquire::Granted);
        assert_eq!(pool.request(customer(2), 0.0), Acquire::Granted);
        assert_eq!(pool.request(customer(3), 1.0), Acquire::Queued { position: 0 });
        assert_eq!(pool.request(customer(4), 2.0), Acquire::Queued { position: 1 });

        assert_eq!(pool.in_use(), 2);
        assert_eq!(pool.queue_len(), 2);
        assert_eq!(pool.requests(), 4);
        assert_eq!(pool.grants(), 2);
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_release_hands_unit_to_head_of_line() {
        let mut pool = ResourcePool::new(0, 1);
        pool.request(customer(1), 0.0);
        pool.request(customer(2), 1.0);
        pool.request(customer(3), 2.0);

        let next = pool.release(customer(1)).unwrap().unwrap();
        assert_eq!(next.process, customer(2));
        assert_eq!(next.requested_at, 1.0);
        assert_eq!(pool.in_use(), 1);

        let next = pool.release(customer(2)).unwrap().unwrap();
        assert_eq!(next.process, customer(3));

        assert!(pool.release(customer(3)).unwrap().is_none());
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.grants(), 3);
    }

    #[test]
    fn test_grant_order_matches_request_order() {
        let mut pool = ResourcePool::new(0, 3);
        for id in 0..3 {
            assert_eq!(pool.request(customer(id), 0.0), Acquire::Granted);
        }
        for id in 3..50 {
            pool.request(customer(id), id as f64);
        }

        let mut granted = Vec::new();
        let mut holders: VecDeque<ProcessId> = (0..3).map(customer).collect();
        while let Some(holder) = holders.pop_front() {
            if let Some(next) = pool.release(holder).unwrap() {
                granted.push(next.order);
                holders.push_back(next.process);
            }
            assert!(pool.is_consistent());
            assert!(pool.in_use() <= pool.capacity());
        }

        let expected: Vec<u64> = (3..50).collect();
        assert_eq!(granted, expected);
        assert_eq!(pool.max_queue_len(), 47);
    }

    #[test]
    fn test_release_without_grant_is_an_error() {
        let mut pool = ResourcePool::new(4, 1);
        assert!(matches!(
            pool.release(customer(1)),
            Err(SimulationError::ReleaseWithoutGrant { pool: 4 })
        ));
    }

    #[test]
    fn test_in_use_never_exceeds_capacity() {
        for capacity in 1..=4 {
            let mut pool = ResourcePool::new(0, capacity);
            let mut held = Vec::new();

            // Interleave bursts of requests with occasional releases
            for id in 0..40u64 {
                if pool.request(customer(id), id as f64) == Acquire::Granted {
                    held.push(customer(id));
                }
                if id % 3 == 2 && !held.is_empty() {
                    let holder = held.remove(0);
                    if let Some(next) = pool.release(holder).unwrap() {
                        held.push(next.process);
                    }
                }
                assert!(pool.in_use() <= capacity);
                assert!(pool.is_consistent());
            }
        }
    }
}
