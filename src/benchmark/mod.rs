//! Benchmark drivers and orchestration
//!
//! - BenchmarkCounters: atomic tallies shared by worker threads
//! - driver: sequential and fan-out round-trip benchmarks
//! - pubsub: publish/subscribe benchmark
//! - Orchestrator: runs the configured suite across backends

pub mod counters;
pub mod driver;
pub mod orchestrator;
pub mod progress;
pub mod pubsub;
pub mod result;

pub use counters::BenchmarkCounters;
pub use driver::{run_fan_out, run_sequential, DriverOptions, WorkerPlan};
pub use orchestrator::Orchestrator;
pub use pubsub::{run_pubsub, PubSubPlan};
pub use result::{format_count, format_throughput, BenchmarkResult};
