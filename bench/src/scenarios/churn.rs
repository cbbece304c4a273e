//! Host churn scenario.
//!
//! Simulates a population of hosts listening to a handful of shared chains:
//! - Every frame, each chain is invoked once
//! - A fraction of hosts is destroyed and replaced each frame
//! - Replacement hosts attach to random chains, sweeping stale entries as they go
//!
//! This scenario tests:
//! - Dispatch cost with a mix of live and stale entries
//! - Attach cost including the cleanup pass
//! - How many stale entries linger between attaches

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rusty_events::{Chain, Host, Registry};

use crate::{
    memory::{HeapProfiler, Retention, measure_eviction},
    scenarios::Scenario,
};

/// Configuration for the churn benchmark.
pub struct ChurnConfig {
    /// Number of hosts alive at any time.
    pub host_count: usize,
    /// Number of shared chains.
    pub chain_count: usize,
    /// Chains each host subscribes to.
    pub subscriptions_per_host: usize,
    /// Fraction of hosts replaced every frame.
    pub churn_rate: f32,
    /// Random seed for reproducibility.
    pub seed: u64,
}

impl Default for ChurnConfig {
    fn default() -> Self {
        Self {
            host_count: 1_000,
            chain_count: 8,
            subscriptions_per_host: 2,
            churn_rate: 0.05,
            seed: 12345,
        }
    }
}

/// Host churn benchmark scenario.
pub struct ChurnScenario {
    config: ChurnConfig,
    registry: Registry,
    chains: Vec<Chain<(u64,)>>,
    hosts: Vec<Host>,
    rng: ChaCha8Rng,
    fired: Arc<AtomicU64>,
    frame: u64,
}

impl ChurnScenario {
    /// Create a new churn scenario with default config.
    pub fn new() -> Self {
        Self::with_config(ChurnConfig::default())
    }

    /// Create a new churn scenario with custom config.
    pub fn with_config(config: ChurnConfig) -> Self {
        Self {
            registry: Registry::new(),
            chains: Vec::new(),
            hosts: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            fired: Arc::new(AtomicU64::new(0)),
            frame: 0,
            config,
        }
    }

    /// Create a host and subscribe it to random chains.
    fn spawn_host(&mut self) -> Host {
        let host = self.registry.host();
        for _ in 0..self.config.subscriptions_per_host {
            let index = self.rng.gen_range(0..self.chains.len());
            let fired = Arc::clone(&self.fired);
            // Each host subscribes with one closure, so picking the same chain twice replaces
            // the earlier entry.
            self.registry
                .attach(
                    &mut self.chains[index],
                    move |_frame: u64| {
                        fired.fetch_add(1, Ordering::Relaxed);
                    },
                    &host,
                )
                .expect("scenario registry is initialized");
        }
        host
    }

    /// Attach one new host to every chain, measuring what each cleanup pass releases.
    pub fn sweep(&mut self, profiler: &HeapProfiler) -> Retention {
        let host = self.registry.host();
        let mut total = Retention::default();
        for chain in &mut self.chains {
            let fired = Arc::clone(&self.fired);
            let (_, retention) = measure_eviction(
                profiler,
                &self.registry,
                chain,
                move |_frame: u64| {
                    fired.fetch_add(1, Ordering::Relaxed);
                },
                &host,
            )
            .expect("scenario registry is initialized");
            total.absorb(retention);
        }
        self.hosts.push(host);
        total
    }

    /// Number of listener calls that went through so far.
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    /// Total entries across all chains, live or stale.
    pub fn entry_count(&self) -> usize {
        self.chains.iter().map(Chain::len).sum()
    }

    /// Entries whose host has been destroyed but which have not been evicted yet.
    pub fn stale_count(&self) -> usize {
        self.chains
            .iter()
            .flat_map(Chain::subscriptions)
            .filter(|subscription| !subscription.is_live())
            .count()
    }

    /// Entries that would fire if invoked now.
    pub fn live_count(&self) -> usize {
        self.entry_count() - self.stale_count()
    }
}

impl Default for ChurnScenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario for ChurnScenario {
    fn name(&self) -> &'static str {
        "churn"
    }

    fn description(&self) -> &'static str {
        "Short-lived hosts attaching to and dying on long-lived shared chains"
    }

    fn host_count(&self) -> usize {
        self.config.host_count
    }

    fn setup(&mut self) {
        self.chains = (0..self.config.chain_count.max(1))
            .map(|_| Chain::new())
            .collect();
        for _ in 0..self.config.host_count {
            let host = self.spawn_host();
            self.hosts.push(host);
        }
    }

    fn update(&mut self) {
        self.frame += 1;
        for chain in &self.chains {
            chain.invoke((self.frame,));
        }

        if self.hosts.is_empty() {
            return;
        }
        let replaced = (self.hosts.len() as f32 * self.config.churn_rate).ceil() as usize;
        for _ in 0..replaced {
            let index = self.rng.gen_range(0..self.hosts.len());
            // Dropping the old host detaches it.
            drop(self.hosts.swap_remove(index));
            let host = self.spawn_host();
            self.hosts.push(host);
        }
    }

    fn teardown(&mut self) {
        self.hosts.clear();
        self.chains.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> ChurnScenario {
        ChurnScenario::with_config(ChurnConfig {
            host_count: 50,
            chain_count: 4,
            subscriptions_per_host: 1,
            churn_rate: 0.1,
            ..Default::default()
        })
    }

    #[test]
    fn churn_scenario_setup() {
        let mut scenario = small();

        scenario.setup();
        assert_eq!(scenario.live_count(), 50);
        assert_eq!(scenario.stale_count(), 0);

        scenario.teardown();
        assert_eq!(scenario.entry_count(), 0);
        assert_eq!(scenario.registry.host_count(), 0);
    }

    #[test]
    fn churn_scenario_update() {
        let mut scenario = small();
        scenario.setup();

        // Run a few frames
        for _ in 0..10 {
            scenario.update();
        }

        // Every alive host has exactly one live entry; replaced hosts never fire.
        assert_eq!(scenario.live_count(), 50);
        assert_eq!(scenario.registry.host_count(), 50);
        assert!(scenario.fired() > 0);

        scenario.teardown();
    }

    #[test]
    fn sweep_evicts_every_stale_entry() {
        // Given
        let profiler = HeapProfiler::start();
        let mut scenario = small();
        scenario.setup();
        for _ in 0..5 {
            scenario.update();
        }
        let stale = scenario.stale_count();

        // When
        let retention = scenario.sweep(&profiler);

        // Then
        assert_eq!(retention.stale_entries, stale);
        assert_eq!(retention.evicted_entries, stale);
        assert_eq!(scenario.stale_count(), 0);
        assert_eq!(scenario.live_count(), 50 + 4);

        scenario.teardown();
    }
}
