//! Per-run sample collection and metric aggregation
//!
//! Only customers who departed before the horizon contribute samples.
//! A run that completed nobody yields zeroed metrics and is left out of
//! cross-replication averages rather than being averaged in as zero.

use serde::{Deserialize, Serialize};

use crate::types::Customer;

/// Timings of one customer who completed service
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: u64,
    pub lane: usize,
    pub arrival_time: f64,
    pub wait_time: f64,
    pub service_time: f64,
    pub system_time: f64,
}

impl CustomerRecord {
    /// Build a record for a departed customer; `None` for anyone still inside
    pub fn from_customer(customer: &Customer) -> Option<Self> {
        if !customer.is_departed() {
            return None;
        }
        Some(CustomerRecord {
            id: customer.id,
            lane: customer.lane,
            arrival_time: customer.arrival_time,
            wait_time: customer.wait_time()?,
            service_time: customer.service_time?,
            system_time: customer.system_time()?,
        })
    }
}

/// Samples gathered during a single replication
#[derive(Debug, Clone, Default)]
pub struct ResultsCollector {
    records: Vec<CustomerRecord>,
}

impl ResultsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: CustomerRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[CustomerRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_service_time(&self) -> f64 {
        self.records.iter().map(|r| r.service_time).sum()
    }

    /// Turn the samples into run metrics for `total_capacity` tellers over `horizon`
    pub fn metrics(&self, seed: u64, total_capacity: u32, horizon: f64) -> RunMetrics {
        let mut metrics = RunMetrics::empty(seed, horizon);
        if self.records.is_empty() {
            return metrics;
        }

        let n = self.records.len() as f64;
        metrics.completed_customers = self.records.len();
        metrics.average_wait = self.records.iter().map(|r| r.wait_time).sum::<f64>() / n;
        metrics.max_wait = self
            .records
            .iter()
            .map(|r| r.wait_time)
            .fold(0.0, f64::max);
        metrics.average_service = self.total_service_time() / n;
        metrics.average_system_time = self.records.iter().map(|r| r.system_time).sum::<f64>() / n;
        metrics.throughput = n / horizon;

        let available = total_capacity as f64 * horizon;
        if available > 0.0 {
            metrics.utilization_percent = self.total_service_time() / available * 100.0;
        }

        metrics
    }
}

/// Metrics for one replication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub seed: u64,
    pub horizon: f64,
    pub completed_customers: usize,
    pub average_wait: f64,
    pub max_wait: f64,
    pub average_service: f64,
    pub average_system_time: f64,
    /// Completed customers per simulated minute
    pub throughput: f64,
    pub utilization_percent: f64,

    // Supplementary run statistics
    /// Customers still waiting or in service when the horizon cut the run
    pub abandoned_customers: usize,
    pub max_queue_len: usize,
    pub events_processed: u64,
    /// Customers that joined each lane, in lane order
    pub lane_arrivals: Vec<u64>,
}

impl RunMetrics {
    fn empty(seed: u64, horizon: f64) -> Self {
        RunMetrics {
            seed,
            horizon,
            completed_customers: 0,
            average_wait: 0.0,
            max_wait: 0.0,
            average_service: 0.0,
            average_system_time: 0.0,
            throughput: 0.0,
            utilization_percent: 0.0,
            abandoned_customers: 0,
            max_queue_len: 0,
            events_processed: 0,
            lane_arrivals: Vec::new(),
        }
    }

    /// Whether this run has any samples to average
    pub fn has_samples(&self) -> bool {
        self.completed_customers > 0
    }
}

/// Averages over the replications of one experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub replications_run: usize,
    /// Replications with at least one completed customer
    pub replications_counted: usize,
    pub average_wait: Option<f64>,
    pub average_max_wait: Option<f64>,
    pub average_utilization_percent: Option<f64>,
    pub average_completed: Option<f64>,
    /// Completed customers per simulated minute over every replication run
    pub throughput: f64,
}

impl ExperimentSummary {
    pub fn from_runs(runs: &[RunMetrics]) -> Self {
        let counted: Vec<&RunMetrics> = runs.iter().filter(|r| r.has_samples()).collect();

        let mean = |f: fn(&RunMetrics) -> f64| -> Option<f64> {
            if counted.is_empty() {
                None
            } else {
                Some(counted.iter().map(|r| f(r)).sum::<f64>() / counted.len() as f64)
            }
        };

        let total_completed: usize = runs.iter().map(|r| r.completed_customers).sum();
        let total_time: f64 = runs.iter().map(|r| r.horizon).sum();
        let throughput = if total_time > 0.0 {
            total_completed as f64 / total_time
        } else {
            0.0
        };

        ExperimentSummary {
            replications_run: runs.len(),
            replications_counted: counted.len(),
            average_wait: mean(|r| r.average_wait),
            average_max_wait: mean(|r| r.max_wait),
            average_utilization_percent: mean(|r| r.utilization_percent),
            average_completed: mean(|r| r.completed_customers as f64),
            throughput,
        }
    }

    pub fn throughput_per_hour(&self) -> f64 {
        self.throughput * 60.0
    }
}
