//! Bank Simulation Engine
//!
//! Discrete-event simulator for estimating customer wait times and teller
//! utilization under different arrival loads and staffing layouts.

pub mod config;
pub mod error;
pub mod events;
pub mod experiment;
pub mod resource;
pub mod results;
pub mod routing;
pub mod simulator;
pub mod types;
pub mod variate;

pub use config::{BranchDay, ExperimentParams, QueueLayout, Rate, ScenarioConfig, Topology};
pub use error::{ConfigError, Result, SimulationError};
pub use experiment::{Experiment, ExperimentReport, ScenarioResult};
pub use results::{ExperimentSummary, RunMetrics};
pub use simulator::Simulator;
