//! Scenario configuration
//!
//! Simulation time is measured in minutes. Rates are always carried with
//! their unit ([`Rate`]) so per-hour and per-minute conventions never mix.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Seed used by every preset
pub const DEFAULT_SEED: u64 = 42;

/// Two hours of simulated opening time
pub const DEFAULT_HORIZON_MINUTES: f64 = 120.0;

/// Replications per experiment preset
pub const DEFAULT_REPLICATIONS: u32 = 10;

/// Tellers staffed in the experiment presets
pub const DEFAULT_TELLERS: u32 = 2;

/// Service rate per teller in the experiment presets
pub const DEFAULT_SERVICE_RATE_PER_HOUR: f64 = 12.0;

/// Most independent lines a split topology may have
pub const MAX_LANES: u32 = 1024;

/// Branch-day service rate: MIN_SERVICE / MAX_SERVICE = 3.0 / 10.0 per minute
const BRANCH_SERVICE_RATE_PER_MINUTE: f64 = 3.0 / 10.0;

/// An exponential rate with an explicit unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
pub enum Rate {
    /// Events per simulated minute
    PerMinute(f64),
    /// Events per hour, converted by dividing by 60
    PerHour(f64),
    /// Mean minutes between events (rate = 1 / mean)
    MeanInterval(f64),
}

impl Rate {
    /// Rate in events per simulated minute
    pub fn per_minute(&self) -> f64 {
        match *self {
            Rate::PerMinute(rate) => rate,
            Rate::PerHour(rate) => rate / 60.0,
            Rate::MeanInterval(mean) => 1.0 / mean,
        }
    }

    /// Mean minutes between events
    pub fn mean_interval(&self) -> f64 {
        1.0 / self.per_minute()
    }

    fn raw(&self) -> f64 {
        match *self {
            Rate::PerMinute(v) | Rate::PerHour(v) | Rate::MeanInterval(v) => v,
        }
    }

    fn validate(&self, what: &'static str) -> std::result::Result<(), ConfigError> {
        let value = self.raw();
        let per_minute = self.per_minute();
        if !(value > 0.0 && value.is_finite() && per_minute > 0.0 && per_minute.is_finite()) {
            return Err(ConfigError::NonPositiveRate { what, value });
        }
        Ok(())
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Rate::PerMinute(rate) => write!(f, "{rate}/min"),
            Rate::PerHour(rate) => write!(f, "{rate}/hr"),
            Rate::MeanInterval(mean) => write!(f, "every {mean} min"),
        }
    }
}

/// How tellers are arranged into queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Topology {
    /// One line feeding every teller
    Pooled { capacity: u32 },
    /// Independent lines; each arrival picks one uniformly at random
    Split { lanes: u32, capacity_per_lane: u32 },
}

impl Topology {
    /// Capacity of each independent pool, in lane order
    pub fn lane_capacities(&self) -> Vec<u32> {
        match *self {
            Topology::Pooled { capacity } => vec![capacity],
            Topology::Split {
                lanes,
                capacity_per_lane,
            } => vec![capacity_per_lane; lanes as usize],
        }
    }

    /// Total service units across all pools
    ///
    /// Saturates on overflow; validated topologies always fit in a `u32`.
    pub fn total_capacity(&self) -> u32 {
        match *self {
            Topology::Pooled { capacity } => capacity,
            Topology::Split {
                lanes,
                capacity_per_lane,
            } => lanes.saturating_mul(capacity_per_lane),
        }
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        match *self {
            Topology::Pooled { capacity } if capacity < 1 => {
                Err(ConfigError::InvalidCapacity(capacity))
            }
            Topology::Pooled { .. } => Ok(()),
            Topology::Split {
                lanes,
                capacity_per_lane,
            } => {
                if lanes < 1 {
                    return Err(ConfigError::InvalidCapacity(lanes));
                }
                if lanes > MAX_LANES {
                    return Err(ConfigError::TooManyLanes {
                        lanes,
                        max: MAX_LANES,
                    });
                }
                if capacity_per_lane < 1 {
                    return Err(ConfigError::InvalidCapacity(capacity_per_lane));
                }
                if lanes.checked_mul(capacity_per_lane).is_none() {
                    return Err(ConfigError::CapacityOverflow {
                        lanes,
                        capacity_per_lane,
                    });
                }
                Ok(())
            }
        }
    }
}

/// Immutable description of one experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    pub topology: Topology,
    pub arrival: Rate,
    pub service: Rate,
    /// Minutes of simulated time per replication
    pub horizon: f64,
    pub replications: u32,
    /// Replication `i` is seeded with `seed_base + i`
    pub seed_base: u64,
}

impl ScenarioConfig {
    /// Reject anything that would make the run meaningless
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.topology.validate()?;
        self.arrival.validate("arrival")?;
        self.service.validate("service")?;
        if !(self.horizon > 0.0 && self.horizon.is_finite()) {
            return Err(ConfigError::NonPositiveHorizon(self.horizon));
        }
        if self.replications < 1 {
            return Err(ConfigError::InvalidReplications(self.replications));
        }
        Ok(())
    }

    /// Load and validate a scenario from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: ScenarioConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }
}

/// Day profiles for the single-run branch study
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchDay {
    NormalDay,
    SalaryDay,
    AswesumaDay,
}

impl BranchDay {
    pub const ALL: [BranchDay; 3] = [
        BranchDay::NormalDay,
        BranchDay::SalaryDay,
        BranchDay::AswesumaDay,
    ];

    /// Command-line name
    pub fn slug(&self) -> &'static str {
        match self {
            BranchDay::NormalDay => "normal-day",
            BranchDay::SalaryDay => "salary-day",
            BranchDay::AswesumaDay => "aswesuma-day",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BranchDay::NormalDay => "Normal Day",
            BranchDay::SalaryDay => "Salary Day",
            BranchDay::AswesumaDay => "Aswesuma Day",
        }
    }

    /// Mean minutes between customer arrivals
    pub fn mean_interarrival(&self) -> f64 {
        match self {
            BranchDay::NormalDay => 5.0,
            BranchDay::SalaryDay => 3.0,
            BranchDay::AswesumaDay => 2.0,
        }
    }

    /// One seeded two-hour run against a single shared line of `counters`
    pub fn config(&self, counters: u32) -> ScenarioConfig {
        ScenarioConfig {
            name: self.label().to_string(),
            topology: Topology::Pooled { capacity: counters },
            arrival: Rate::MeanInterval(self.mean_interarrival()),
            service: Rate::PerMinute(BRANCH_SERVICE_RATE_PER_MINUTE),
            horizon: DEFAULT_HORIZON_MINUTES,
            replications: 1,
            seed_base: DEFAULT_SEED,
        }
    }
}

impl FromStr for BranchDay {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        BranchDay::ALL
            .into_iter()
            .find(|day| day.slug() == s)
            .ok_or_else(|| ConfigError::UnknownScenario(s.to_string()))
    }
}

/// Queue arrangement for the replicated teller experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueLayout {
    /// One shared line for all tellers
    SingleQueue,
    /// One line per teller, arrivals split at random
    SplitQueue,
}

impl QueueLayout {
    pub fn slug(&self) -> &'static str {
        match self {
            QueueLayout::SingleQueue => "single-queue",
            QueueLayout::SplitQueue => "split-queue",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QueueLayout::SingleQueue => "Single Queue (shared line)",
            QueueLayout::SplitQueue => "Split Queue (one line per teller)",
        }
    }

    pub fn config(&self, params: &ExperimentParams) -> ScenarioConfig {
        let topology = match self {
            QueueLayout::SingleQueue => Topology::Pooled {
                capacity: params.tellers,
            },
            QueueLayout::SplitQueue => Topology::Split {
                lanes: params.tellers,
                capacity_per_lane: 1,
            },
        };
        ScenarioConfig {
            name: self.label().to_string(),
            topology,
            arrival: Rate::PerHour(params.arrival_per_hour),
            service: Rate::PerHour(params.service_per_hour),
            horizon: params.horizon,
            replications: params.replications,
            seed_base: params.seed_base,
        }
    }
}

impl FromStr for QueueLayout {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "single-queue" => Ok(QueueLayout::SingleQueue),
            "split-queue" => Ok(QueueLayout::SplitQueue),
            other => Err(ConfigError::UnknownScenario(other.to_string())),
        }
    }
}

/// Knobs shared by both queue layouts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExperimentParams {
    pub arrival_per_hour: f64,
    pub service_per_hour: f64,
    pub tellers: u32,
    pub replications: u32,
    pub seed_base: u64,
    pub horizon: f64,
}

impl ExperimentParams {
    pub fn new(arrival_per_hour: f64) -> Self {
        ExperimentParams {
            arrival_per_hour,
            service_per_hour: DEFAULT_SERVICE_RATE_PER_HOUR,
            tellers: DEFAULT_TELLERS,
            replications: DEFAULT_REPLICATIONS,
            seed_base: DEFAULT_SEED,
            horizon: DEFAULT_HORIZON_MINUTES,
        }
    }
}

/// Parse a counter count typed by a user
pub fn parse_counters(input: &str) -> std::result::Result<u32, ConfigError> {
    let trimmed = input.trim();
    let count: u32 = trimmed
        .parse()
        .map_err(|_| ConfigError::Parse(format!("'{trimmed}' is not a whole number")))?;
    if count < 1 {
        return Err(ConfigError::InvalidCapacity(count));
    }
    Ok(count)
}
