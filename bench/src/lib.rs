//! Benchmark utilities for the hive storage engine.
//!
//! This crate provides the shared pieces for benchmarking the deferred
//! submission pipeline:
//!
//! - **Component types**: realistic component shapes shared across benchmarks
//! - **World builders**: seeded, reproducible population and churn helpers
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench -p hive_bench
//!
//! # Run a specific benchmark group
//! cargo bench -p hive_bench -- churn
//! ```
//!
//! Results are written to `target/criterion/` with HTML reports for
//! visualization.

pub mod components;
pub mod workload;
