//! Replication driver
//!
//! Every replication gets its own seed (`seed_base + index`), scheduler,
//! pools and results collector, so replications never share state.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ScenarioConfig;
use crate::error::Result;
use crate::results::{ExperimentSummary, ResultsCollector, RunMetrics};
use crate::simulator::Simulator;
use crate::variate::{replication_seed, VariateSource};

/// Single-run result row for the branch study
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub total_completed_customers: usize,
    pub average_wait_time: f64,
    pub maximum_wait_time: f64,
    pub utilization_percent: f64,
}

/// Everything produced by one experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub scenario_name: String,
    pub config: ScenarioConfig,
    pub runs: Vec<RunMetrics>,
    pub summary: ExperimentSummary,
}

impl ExperimentReport {
    /// Result row built from the first replication
    pub fn scenario_result(&self) -> ScenarioResult {
        let (completed, average_wait, max_wait, utilization) = self
            .runs
            .first()
            .map(|run| {
                (
                    run.completed_customers,
                    run.average_wait,
                    run.max_wait,
                    run.utilization_percent,
                )
            })
            .unwrap_or((0, 0.0, 0.0, 0.0));

        ScenarioResult {
            scenario_name: self.scenario_name.clone(),
            total_completed_customers: completed,
            average_wait_time: average_wait,
            maximum_wait_time: max_wait,
            utilization_percent: utilization,
        }
    }
}

/// Runs the replications of one scenario
#[derive(Debug, Clone)]
pub struct Experiment {
    config: ScenarioConfig,
}

impl Experiment {
    /// Validate `config` up front; nothing runs with a bad configuration
    pub fn new(config: ScenarioConfig) -> Result<Self> {
        config.validate()?;
        Ok(Experiment { config })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Seed used by replication `index`
    pub fn seed_for(&self, index: u32) -> u64 {
        replication_seed(self.config.seed_base, index)
    }

    /// Run a single replication from a clean slate
    pub fn run_replication(&self, index: u32) -> Result<RunMetrics> {
        let variates = VariateSource::for_replication(self.config.seed_base, index);
        let seed = variates.seed();
        let mut simulator = Simulator::with_variates(&self.config, variates)?;
        let mut results = ResultsCollector::new();

        let metrics = simulator.run(&mut results)?;
        if metrics.has_samples() {
            info!(
                scenario = %self.config.name,
                replication = index,
                seed,
                completed = metrics.completed_customers,
                average_wait = metrics.average_wait,
                utilization = metrics.utilization_percent,
                "replication finished"
            );
        } else {
            warn!(
                scenario = %self.config.name,
                replication = index,
                seed,
                "replication completed no customers; excluded from averages"
            );
        }

        Ok(metrics)
    }

    /// Run every replication and average the ones that completed someone
    pub fn run(&self) -> Result<ExperimentReport> {
        info!(
            scenario = %self.config.name,
            replications = self.config.replications,
            capacity = self.config.topology.total_capacity(),
            arrival = %self.config.arrival,
            service = %self.config.service,
            "starting experiment"
        );

        let runs = (0..self.config.replications)
            .map(|index| self.run_replication(index))
            .collect::<Result<Vec<_>>>()?;
        let summary = ExperimentSummary::from_runs(&runs);

        info!(
            scenario = %self.config.name,
            counted = summary.replications_counted,
            average_wait = ?summary.average_wait,
            "experiment finished"
        );

        Ok(ExperimentReport {
            scenario_name: self.config.name.clone(),
            config: self.config.clone(),
            runs,
            summary,
        })
    }
}
