//! Error types for the simulation engine

use thiserror::Error;

/// Result type for simulation operations
pub type Result<T> = std::result::Result<T, SimulationError>;

/// Rejected scenario configuration. A run never starts with one of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{what} rate must be positive and finite, got {value}")]
    NonPositiveRate { what: &'static str, value: f64 },

    #[error("simulation horizon must be positive and finite, got {0}")]
    NonPositiveHorizon(f64),

    #[error("capacity must be at least 1, got {0}")]
    InvalidCapacity(u32),

    #[error("{lanes} lanes exceeds the limit of {max}")]
    TooManyLanes { lanes: u32, max: u32 },

    #[error("{lanes} lanes of {capacity_per_lane} tellers overflows the total capacity")]
    CapacityOverflow { lanes: u32, capacity_per_lane: u32 },

    #[error("replication count must be at least 1, got {0}")]
    InvalidReplications(u32),

    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),

    #[error("invalid value: {0}")]
    Parse(String),
}

/// Errors that can occur while building or running a simulation
#[derive(Error, Debug)]
pub enum SimulationError {
    /// Scenario configuration was rejected before the run
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An event was scheduled with a negative or non-finite delay
    #[error("cannot schedule an event {delay} time units in the past")]
    NegativeDelay { delay: f64 },

    /// The event queue handed back an event older than the clock.
    /// Every timing value after this point would be wrong, so the run aborts.
    #[error("scheduling invariant violated: event at {scheduled} popped with clock at {now}")]
    SchedulingInvariant { scheduled: f64, now: f64 },

    /// A pool unit was released that was never granted
    #[error("pool {pool} released with no units in use")]
    ReleaseWithoutGrant { pool: usize },

    /// An event referenced a process that no longer exists
    #[error("no live process for {0}")]
    UnknownProcess(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimulationError {
    /// Whether this error came from configuration rather than the engine
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
