//! Core types for the simulation engine

use std::fmt;

use serde::{Deserialize, Serialize};

/// A simulated actor that can be suspended and resumed by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessId {
    /// The arrival generator (one per run)
    Generator,
    /// A customer, by arrival number
    Customer(u64),
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessId::Generator => write!(f, "generator"),
            ProcessId::Customer(id) => write!(f, "customer {id}"),
        }
    }
}

/// Lifecycle of a customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerState {
    /// Spawned, has not asked for a teller yet
    Arrived,
    /// Request submitted, grant not yet delivered
    Waiting,
    /// Holding a teller for the sampled service time
    InService,
    /// Released the teller; terminal
    Departed,
}

impl CustomerState {
    /// Legal forward moves of the customer state machine
    pub fn can_transition_to(self, next: CustomerState) -> bool {
        matches!(
            (self, next),
            (CustomerState::Arrived, CustomerState::Waiting)
                | (CustomerState::Waiting, CustomerState::InService)
                | (CustomerState::InService, CustomerState::Departed)
        )
    }
}

/// A customer visiting one lane of the branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: u64,
    /// Index of the pool this customer queues at
    pub lane: usize,
    pub state: CustomerState,
    pub arrival_time: f64,
    pub grant_time: Option<f64>,
    pub service_time: Option<f64>,
    pub departure_time: Option<f64>,
}

impl Customer {
    pub fn new(id: u64, lane: usize, arrival_time: f64) -> Self {
        Customer {
            id,
            lane,
            state: CustomerState::Arrived,
            arrival_time,
            grant_time: None,
            service_time: None,
            departure_time: None,
        }
    }

    /// Time between arrival and reaching a teller
    pub fn wait_time(&self) -> Option<f64> {
        self.grant_time.map(|grant| grant - self.arrival_time)
    }

    /// Time between arrival and departure
    pub fn system_time(&self) -> Option<f64> {
        self.departure_time
            .map(|departure| departure - self.arrival_time)
    }

    pub fn is_departed(&self) -> bool {
        self.state == CustomerState::Departed
    }
}

/// One processed event, recorded when tracing is enabled
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub time: f64,
    pub sequence: u64,
    pub process: ProcessId,
}
