//! Benchmark utilities for the host registry.
//!
//! This crate provides benchmarking infrastructure for `rusty_events`:
//!
//! - **Microbenchmarks**: dispatch, attach with cleanup, detach
//! - **Scenario benchmarks**: hosts spawning and dying against shared chains
//! - **Retention**: heap released when stale entries are evicted, measured via dhat
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench -p rusty_events_bench
//!
//! # Run specific benchmark group
//! cargo bench -p rusty_events_bench -- dispatch
//!
//! # Run with memory profiling (slower)
//! cargo bench -p rusty_events_bench --features memory_profiling
//! ```
//!
//! Results are written to `target/criterion/` with HTML reports.

pub mod memory;
pub mod scenarios;
