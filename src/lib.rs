//! gtsdb-bench library
//!
//! Write, read, multi-writer and pub/sub benchmarks for the GTSDB
//! time-series server, with InfluxDB and NSQ as comparison baselines.

pub mod benchmark;
pub mod client;
pub mod config;
pub mod metrics;
pub mod utils;
pub mod workload;
