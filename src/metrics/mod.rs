//! Result reporting and export

pub mod reporter;

pub use reporter::{BenchmarkResults, MetricsReporter, ResultRecord};
