//! Discrete-event scheduler for one replication
//!
//! Processes are explicit state machines. Each suspension point (a timeout,
//! or waiting for a teller) is an event in the [`EventQueue`] naming the
//! process to resume; the run loop pops events one at a time and steps the
//! matching process until it suspends again.
//!
//! The run stops at the horizon no matter what is still pending. Customers
//! caught waiting or in service are abandoned with the rest of the state and
//! never show up in the results.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::config::ScenarioConfig;
use crate::error::{Result, SimulationError};
use crate::events::EventQueue;
use crate::resource::{Acquire, ResourcePool};
use crate::results::{CustomerRecord, ResultsCollector, RunMetrics};
use crate::routing::{policy_for, RoutingPolicy};
use crate::types::{Customer, CustomerState, ProcessId, TraceEntry};
use crate::variate::VariateSource;

/// Scheduler, pools and live processes for a single run
pub struct Simulator {
    queue: EventQueue,
    pools: Vec<ResourcePool>,
    customers: HashMap<u64, Customer>,
    variates: VariateSource,
    routing: Box<dyn RoutingPolicy>,

    // Configuration
    total_capacity: u32,
    arrival_rate: f64,
    service_rate: f64,
    horizon: f64,

    // Generator state
    generator_started: bool,
    next_customer_id: u64,

    // Metrics
    events_processed: u64,
    trace: Option<Vec<TraceEntry>>,
}

impl Simulator {
    /// Build a fresh run of `config` seeded with `seed`.
    ///
    /// The arrival generator is scheduled to start at time zero.
    pub fn new(config: &ScenarioConfig, seed: u64) -> Result<Self> {
        Self::with_variates(config, VariateSource::new(seed))
    }

    /// Build a fresh run of `config` drawing from `variates`
    pub fn with_variates(config: &ScenarioConfig, variates: VariateSource) -> Result<Self> {
        config.validate()?;

        let pools = config
            .topology
            .lane_capacities()
            .into_iter()
            .enumerate()
            .map(|(id, capacity)| ResourcePool::new(id, capacity))
            .collect();

        let mut simulator = Simulator {
            queue: EventQueue::new(),
            pools,
            customers: HashMap::new(),
            variates,
            routing: policy_for(&config.topology),
            total_capacity: config.topology.total_capacity(),
            arrival_rate: config.arrival.per_minute(),
            service_rate: config.service.per_minute(),
            horizon: config.horizon,
            generator_started: false,
            next_customer_id: 0,
            events_processed: 0,
            trace: None,
        };
        simulator.queue.schedule(0.0, ProcessId::Generator)?;

        Ok(simulator)
    }

    /// Record every processed event from now on
    pub fn enable_trace(&mut self) {
        self.trace.get_or_insert_with(Vec::new);
    }

    pub fn trace(&self) -> Option<&[TraceEntry]> {
        self.trace.as_deref()
    }

    pub fn now(&self) -> f64 {
        self.queue.now()
    }

    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    pub fn seed(&self) -> u64 {
        self.variates.seed()
    }

    pub fn pools(&self) -> &[ResourcePool] {
        &self.pools
    }

    /// Customers that have arrived and not yet departed
    pub fn live_customers(&self) -> impl Iterator<Item = &Customer> {
        self.customers.values()
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Process the next event if it is due before the horizon.
    ///
    /// Returns `Ok(false)` once the run is over.
    pub fn step(&mut self, results: &mut ResultsCollector) -> Result<bool> {
        match self.queue.peek_time() {
            Some(time) if time < self.horizon => {}
            _ => return Ok(false),
        }
        let Some(event) = self.queue.advance()? else {
            return Ok(false);
        };

        self.events_processed += 1;
        trace!(
            time = event.time(),
            sequence = event.sequence(),
            process = %event.process(),
            "resume"
        );
        if let Some(trace) = self.trace.as_mut() {
            trace.push(TraceEntry {
                time: event.time(),
                sequence: event.sequence(),
                process: event.process(),
            });
        }

        match event.process() {
            ProcessId::Generator => self.resume_generator()?,
            ProcessId::Customer(id) => self.resume_customer(id, results)?,
        }

        Ok(true)
    }

    /// Run to the horizon (or until nothing is pending) and compute metrics
    pub fn run(&mut self, results: &mut ResultsCollector) -> Result<RunMetrics> {
        while self.step(results)? {}

        let mut metrics = results.metrics(self.seed(), self.total_capacity, self.horizon);
        metrics.abandoned_customers = self.customers.len();
        metrics.max_queue_len = self
            .pools
            .iter()
            .map(|p| p.max_queue_len())
            .max()
            .unwrap_or(0);
        metrics.events_processed = self.events_processed;
        metrics.lane_arrivals = self.pools.iter().map(|p| p.requests()).collect();

        Ok(metrics)
    }

    /// Generator body: wait an interarrival gap, spawn a customer, repeat.
    ///
    /// Once the next arrival would land at or past the horizon the generator
    /// stops instead of scheduling it.
    fn resume_generator(&mut self) -> Result<()> {
        if self.generator_started {
            self.next_customer_id += 1;
            let id = self.next_customer_id;
            let lane = self.routing.route(self.pools.len(), &mut self.variates);
            let now = self.queue.now();

            debug!(customer = id, lane, time = now, "arrival");
            self.customers.insert(id, Customer::new(id, lane, now));
            self.queue.schedule(0.0, ProcessId::Customer(id))?;
        }
        self.generator_started = true;

        let gap = self.variates.exponential(self.arrival_rate)?;
        if !self.before_horizon(gap) {
            debug!(time = self.queue.now(), gap, "no arrivals left before horizon");
            return Ok(());
        }
        self.queue.schedule(gap, ProcessId::Generator)?;
        Ok(())
    }

    /// Whether an event `delay` from now would still fire before the horizon
    fn before_horizon(&self, delay: f64) -> bool {
        let at = self.queue.now() + delay;
        at.is_finite() && at < self.horizon
    }

    /// Customer body: request a teller, wait for the grant, get served, leave
    fn resume_customer(&mut self, id: u64, results: &mut ResultsCollector) -> Result<()> {
        let process = ProcessId::Customer(id);
        let now = self.queue.now();
        let customer = self
            .customers
            .get_mut(&id)
            .ok_or_else(|| SimulationError::UnknownProcess(process.to_string()))?;

        match customer.state {
            CustomerState::Arrived => {
                transition(customer, CustomerState::Waiting);
                match self.pools[customer.lane].request(process, now) {
                    // Delivered as a same-time event like any other grant
                    Acquire::Granted => {
                        self.queue.schedule(0.0, process)?;
                    }
                    Acquire::Queued { position } => {
                        debug!(customer = id, lane = customer.lane, position, "waiting in line");
                    }
                }
            }
            CustomerState::Waiting => {
                let service = self.variates.exponential(self.service_rate)?;
                customer.grant_time = Some(now);
                customer.service_time = Some(service);
                transition(customer, CustomerState::InService);
                debug!(customer = id, wait = now - customer.arrival_time, service, "service started");
                // A departure at or past the horizon would never be processed
                let at = now + service;
                if at.is_finite() && at < self.horizon {
                    self.queue.schedule(service, process)?;
                }
            }
            CustomerState::InService => {
                transition(customer, CustomerState::Departed);
                customer.departure_time = Some(now);
                let lane = customer.lane;

                if let Some(record) = CustomerRecord::from_customer(customer) {
                    results.record(record);
                }
                self.customers.remove(&id);
                debug!(customer = id, time = now, "departed");

                if let Some(next) = self.pools[lane].release(process)? {
                    self.queue.schedule(0.0, next.process)?;
                }
            }
            CustomerState::Departed => {
                return Err(SimulationError::UnknownProcess(process.to_string()));
            }
        }

        Ok(())
    }
}

fn transition(customer: &mut Customer, next: CustomerState) {
    debug_assert!(
        customer.state.can_transition_to(next),
        "customer {} cannot move from {:?} to {:?}",
        customer.id,
        customer.state,
        next
    );
    customer.state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BranchDay, Rate, Topology};

    fn scenario(topology: Topology, arrival: Rate, service: Rate, horizon: f64) -> ScenarioConfig {
        ScenarioConfig {
            name: "test".to_string(),
            topology,
            arrival,
            service,
            horizon,
            replications: 1,
            seed_base: 42,
        }
    }

    fn run_once(config: &ScenarioConfig, seed: u64) -> (RunMetrics, Vec<TraceEntry>) {
        let mut simulator = Simulator::new(config, seed).unwrap();
        simulator.enable_trace();
        let mut results = ResultsCollector::new();
        let metrics = simulator.run(&mut results).unwrap();
        (metrics, simulator.trace().unwrap().to_vec())
    }

    #[test]
    fn test_simulator_creation() {
        let config = BranchDay::NormalDay.config(2);
        let simulator = Simulator::new(&config, 42).unwrap();

        assert_eq!(simulator.now(), 0.0);
        assert_eq!(simulator.pools().len(), 1);
        assert_eq!(simulator.pools()[0].capacity(), 2);
        assert_eq!(simulator.live_customers().count(), 0);
        assert_eq!(simulator.events_processed(), 0);
    }

    #[test]
    fn test_invalid_config_never_starts() {
        let mut config = BranchDay::NormalDay.config(2);
        config.topology = Topology::Pooled { capacity: 0 };

        let err = Simulator::new(&config, 42).err().unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn test_same_seed_is_bit_identical() {
        // Two tellers, one arrival every 5 minutes on average, two hours
        let config = scenario(
            Topology::Pooled { capacity: 2 },
            Rate::MeanInterval(5.0),
            Rate::PerMinute(0.3),
            120.0,
        );

        let (first_metrics, first_trace) = run_once(&config, 42);
        let (second_metrics, second_trace) = run_once(&config, 42);

        assert!(first_metrics.completed_customers > 0);
        assert_eq!(first_metrics, second_metrics);
        assert_eq!(first_trace.len(), second_trace.len());
        for (a, b) in first_trace.iter().zip(&second_trace) {
            assert_eq!(a.time.to_bits(), b.time.to_bits());
            assert_eq!(a.sequence, b.sequence);
            assert_eq!(a.process, b.process);
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let config = BranchDay::SalaryDay.config(2);
        let (_, a) = run_once(&config, 1);
        let (_, b) = run_once(&config, 2);

        let times = |trace: &[TraceEntry]| trace.iter().map(|e| e.time.to_bits()).collect::<Vec<_>>();
        assert_ne!(times(&a), times(&b));
    }

    #[test]
    fn test_trace_is_time_ordered() {
        let config = BranchDay::AswesumaDay.config(1);
        let (_, trace) = run_once(&config, 9);

        assert_eq!(trace[0].process, ProcessId::Generator);
        assert_eq!(trace[0].time, 0.0);
        for pair in trace.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(a.time < b.time || (a.time == b.time && a.sequence < b.sequence));
        }
        assert!(trace.iter().all(|e| e.time < 120.0));
    }

    #[test]
    fn test_pool_invariants_hold_at_every_step() {
        for capacity in 1..=3 {
            let config = scenario(
                Topology::Pooled { capacity },
                Rate::PerMinute(1.0),
                Rate::PerMinute(0.3),
                200.0,
            );
            let mut simulator = Simulator::new(&config, 11).unwrap();
            let mut results = ResultsCollector::new();

            while simulator.step(&mut results).unwrap() {
                for pool in simulator.pools() {
                    assert!(pool.in_use() <= pool.capacity());
                    assert!(pool.is_consistent());
                }
            }
        }
    }

    #[test]
    fn test_single_teller_serves_in_arrival_order() {
        let config = scenario(
            Topology::Pooled { capacity: 1 },
            Rate::PerMinute(0.5),
            Rate::PerMinute(0.4),
            300.0,
        );
        let mut simulator = Simulator::new(&config, 5).unwrap();
        let mut results = ResultsCollector::new();
        simulator.run(&mut results).unwrap();

        let records = results.records();
        assert!(records.len() > 10);
        for pair in records.windows(2) {
            // With one teller, departures happen in arrival order and the
            // next service starts no earlier than the previous departure
            assert!(pair[0].id < pair[1].id);
            let departed = pair[0].arrival_time + pair[0].system_time;
            let started = pair[1].arrival_time + pair[1].wait_time;
            assert!(started >= departed - 1e-9);
        }
        assert!(records.iter().any(|r| r.wait_time > 0.0));
    }

    #[test]
    fn test_idle_teller_means_no_wait() {
        // Arrivals far apart relative to service, lots of tellers
        let config = scenario(
            Topology::Pooled { capacity: 10 },
            Rate::MeanInterval(30.0),
            Rate::MeanInterval(1.0),
            600.0,
        );
        let (metrics, _) = run_once(&config, 3);

        assert!(metrics.completed_customers > 0);
        assert_eq!(metrics.average_wait, 0.0);
        assert_eq!(metrics.max_wait, 0.0);
        assert_eq!(metrics.max_queue_len, 0);
    }

    #[test]
    fn test_utilization_is_a_percentage() {
        for (seed, day) in BranchDay::ALL.into_iter().enumerate() {
            for counters in 1..=3 {
                let (metrics, _) = run_once(&day.config(counters), seed as u64);
                assert!(metrics.utilization_percent >= 0.0);
                assert!(metrics.utilization_percent <= 100.0);
            }
        }
    }

    #[test]
    fn test_no_arrivals_gives_empty_run() {
        let config = scenario(
            Topology::Pooled { capacity: 2 },
            Rate::PerHour(1e-9),
            Rate::PerHour(12.0),
            120.0,
        );
        let (metrics, _) = run_once(&config, 42);

        assert_eq!(metrics.completed_customers, 0);
        assert_eq!(metrics.throughput, 0.0);
        assert_eq!(metrics.utilization_percent, 0.0);
        assert!(!metrics.average_wait.is_nan());
    }

    #[test]
    fn test_vanishing_arrival_rate_ends_cleanly() {
        // Sampled gaps overflow to infinity; the generator must simply stop
        for arrival in [Rate::PerMinute(1e-310), Rate::MeanInterval(1e308)] {
            let config = scenario(
                Topology::Pooled { capacity: 2 },
                arrival,
                Rate::PerMinute(0.3),
                120.0,
            );
            assert!(config.validate().is_ok());

            for seed in 0..5 {
                let mut simulator = Simulator::new(&config, seed).unwrap();
                let mut results = ResultsCollector::new();
                let metrics = simulator.run(&mut results).unwrap();

                assert_eq!(metrics.completed_customers, 0);
                assert_eq!(metrics.abandoned_customers, 0);
                assert_eq!(metrics.throughput, 0.0);
                assert!(!metrics.average_wait.is_nan());
                // Only the generator's start event ran
                assert_eq!(metrics.events_processed, 1);
            }
        }
    }

    #[test]
    fn test_vanishing_service_rate_leaves_customers_in_service() {
        let config = scenario(
            Topology::Pooled { capacity: 2 },
            Rate::MeanInterval(5.0),
            Rate::PerMinute(1e-310),
            120.0,
        );
        let mut simulator = Simulator::new(&config, 42).unwrap();
        let mut results = ResultsCollector::new();
        let metrics = simulator.run(&mut results).unwrap();

        assert_eq!(metrics.completed_customers, 0);
        assert!(metrics.abandoned_customers > 2);
        assert_eq!(simulator.pools()[0].in_use(), 2);
    }

    #[test]
    fn test_generator_stops_at_horizon() {
        let config = BranchDay::NormalDay.config(2);
        let mut simulator = Simulator::new(&config, 42).unwrap();
        let mut results = ResultsCollector::new();
        simulator.run(&mut results).unwrap();

        // Events past the horizon are never scheduled, so nothing is left over
        assert!(simulator.queue.is_empty());
        assert!(simulator.now() < 120.0);
    }

    #[test]
    fn test_horizon_cuts_off_overloaded_run() {
        // Arrivals far outpace a single teller; the queue grows without bound
        let config = scenario(
            Topology::Pooled { capacity: 1 },
            Rate::PerMinute(50.0),
            Rate::PerMinute(0.5),
            30.0,
        );
        let mut simulator = Simulator::new(&config, 42).unwrap();
        let mut results = ResultsCollector::new();
        let metrics = simulator.run(&mut results).unwrap();

        assert!(simulator.now() < 30.0);
        assert!(metrics.abandoned_customers > 100);
        assert!(metrics.max_queue_len > 100);
        // In-flight customers are not counted as completed
        assert_eq!(metrics.completed_customers, results.len());
        assert!(simulator
            .live_customers()
            .all(|c| c.state != CustomerState::Departed));
    }

    #[test]
    fn test_split_lanes_are_independent() {
        let config = scenario(
            Topology::Split {
                lanes: 2,
                capacity_per_lane: 1,
            },
            Rate::PerMinute(0.6),
            Rate::PerMinute(0.4),
            240.0,
        );
        let mut simulator = Simulator::new(&config, 8).unwrap();
        let mut results = ResultsCollector::new();

        while simulator.step(&mut results).unwrap() {
            for pool in simulator.pools() {
                assert!(pool.in_use() <= 1);
                assert!(pool.is_consistent());
                // Nobody in a line belongs to the other lane
                for request in pool.waiting() {
                    let ProcessId::Customer(id) = request.process else {
                        panic!("generator never queues");
                    };
                    let customer = simulator.live_customers().find(|c| c.id == id).unwrap();
                    assert_eq!(customer.lane, pool.id());
                }
            }
        }

        let lanes: Vec<usize> = results.records().iter().map(|r| r.lane).collect();
        assert!(lanes.contains(&0) && lanes.contains(&1));

        let metrics = simulator.run(&mut results).unwrap();
        assert_eq!(metrics.lane_arrivals.len(), 2);
        assert!(metrics.lane_arrivals.iter().all(|&n| n > 0));
        let arrived: u64 = metrics.lane_arrivals.iter().sum();
        assert_eq!(
            arrived as usize,
            metrics.completed_customers + metrics.abandoned_customers
        );
    }
}
