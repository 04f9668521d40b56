//! Lane routing policies
//!
//! Decide which independent pool an arriving customer joins:
//! - SingleLine: everyone joins lane 0 (pooled queue)
//! - RandomLane: uniform pick per arrival, no jockeying afterwards

use crate::config::Topology;
use crate::variate::VariateSource;

/// Routing policy trait
pub trait RoutingPolicy {
    /// Choose a lane in `0..lanes` for the next arrival
    fn route(&mut self, lanes: usize, variates: &mut VariateSource) -> usize;

    /// Get policy name
    fn name(&self) -> &str;
}

/// Every customer joins the same line
#[derive(Debug, Default)]
pub struct SingleLine;

impl SingleLine {
    pub fn new() -> Self {
        SingleLine
    }
}

impl RoutingPolicy for SingleLine {
    fn route(&mut self, _lanes: usize, _variates: &mut VariateSource) -> usize {
        0
    }

    fn name(&self) -> &str {
        "SingleLine"
    }
}

/// Each customer picks a line uniformly at random and stays in it
#[derive(Debug, Default)]
pub struct RandomLane;

impl RandomLane {
    pub fn new() -> Self {
        RandomLane
    }
}

impl RoutingPolicy for RandomLane {
    fn route(&mut self, lanes: usize, variates: &mut VariateSource) -> usize {
        variates.pick(lanes)
    }

    fn name(&self) -> &str {
        "RandomLane"
    }
}

/// Routing policy that matches a topology
pub fn policy_for(topology: &Topology) -> Box<dyn RoutingPolicy> {
    match topology {
        Topology::Pooled { .. } => Box::new(SingleLine::new()),
        Topology::Split { .. } => Box::new(RandomLane::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line_policy() {
        let mut policy = SingleLine::new();
        let mut variates = VariateSource::new(42);

        for _ in 0..10 {
            assert_eq!(policy.route(1, &mut variates), 0);
        }
        assert_eq!(variates.draws(), 0);
        assert_eq!(policy.name(), "SingleLine");
    }

    #[test]
    fn test_random_lane_splits_roughly_evenly() {
        let mut policy = RandomLane::new();
        let mut variates = VariateSource::new(42);

        let mut routed = [0u64; 2];
        for _ in 0..10_000 {
            let lane = policy.route(2, &mut variates);
            assert!(lane < 2);
            routed[lane] += 1;
        }

        let share = routed[0] as f64 / 10_000.0;
        assert!((share - 0.5).abs() < 0.03, "lane 0 share was {share}");
    }

    #[test]
    fn test_policy_for_topology() {
        let pooled = policy_for(&Topology::Pooled { capacity: 2 });
        assert_eq!(pooled.name(), "SingleLine");

        let split = policy_for(&Topology::Split {
            lanes: 2,
            capacity_per_lane: 1,
        });
        assert_eq!(split.name(), "RandomLane");
    }
}
