//! Realistic registry workloads.
//!
//! # Scenarios
//!
//! - **Churn**: many short-lived hosts subscribing to a few long-lived chains, the usual shape of
//!   UI widgets or game objects listening to world events.

pub mod churn;

pub use churn::{ChurnConfig, ChurnScenario};

/// Common trait for benchmark scenarios.
pub trait Scenario {
    /// Human-readable name of the scenario.
    fn name(&self) -> &'static str;

    /// Brief description of what this scenario tests.
    fn description(&self) -> &'static str;

    /// Number of hosts alive at any time.
    fn host_count(&self) -> usize;

    /// Set up the scenario (create hosts, attach listeners).
    fn setup(&mut self);

    /// Run one "frame" of the scenario.
    fn update(&mut self);

    /// Clean up the scenario.
    fn teardown(&mut self);
}
