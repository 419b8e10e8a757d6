//! Command-line argument parsing
//!
//! Every default equals the value the benchmark historically ran with.
//! Arguments are grouped by category for clarity.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::workload::{BackendKind, WorkloadType};

/// Throughput and latency benchmark for GTSDB, with InfluxDB and NSQ baselines
#[derive(Parser, Debug, Clone)]
#[command(name = "gtsdb-bench")]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    // === Connection ===
    /// GTSDB server address
    #[arg(long = "gtsdb", default_value = "localhost:5555", help_heading = "Connection")]
    pub gtsdb_addr: String,

    /// InfluxDB base URL
    #[arg(long = "influx-url", default_value = "http://localhost:8086", help_heading = "Connection")]
    pub influx_url: String,

    /// InfluxDB API token
    #[arg(long = "influx-token", help_heading = "Connection")]
    pub influx_token: Option<String>,

    /// InfluxDB organization
    #[arg(long = "influx-org", default_value = "abby", help_heading = "Connection")]
    pub influx_org: String,

    /// InfluxDB bucket
    #[arg(long = "influx-bucket", default_value = "abby", help_heading = "Connection")]
    pub influx_bucket: String,

    /// nsqd TCP address
    #[arg(long = "nsq", default_value = "localhost:4150", help_heading = "Connection")]
    pub nsq_addr: String,

    /// NSQ topic written by the write and multi-write tests
    #[arg(long = "nsq-topic", default_value = "test", help_heading = "Connection")]
    pub nsq_topic: String,

    /// NSQ topic used only by the pub/sub test
    #[arg(long = "nsq-pubsub-topic", default_value = "benchmark_pubsub", help_heading = "Connection")]
    pub nsq_pubsub_topic: String,

    /// NSQ channel for the pub/sub consumer; ephemeral channels vanish with
    /// their last consumer, taking unread messages along
    #[arg(long = "nsq-channel", default_value = "benchmark#ephemeral", help_heading = "Connection")]
    pub nsq_channel: String,

    // === Workload ===
    /// Tests to run (write,read,multi-write,pubsub)
    #[arg(short = 't', long = "tests", value_delimiter = ',', help_heading = "Workload")]
    pub tests: Option<Vec<String>>,

    /// Backends to benchmark (gtsdb,influx,nsq)
    #[arg(short = 'b', long = "backends", value_delimiter = ',', help_heading = "Workload")]
    pub backends: Option<Vec<String>>,

    /// Points written by the sequential write test
    #[arg(short = 'n', long = "points", default_value_t = 10000, help_heading = "Workload")]
    pub points: u64,

    /// Sensor key used by write, read and pub/sub
    #[arg(long = "sensor", default_value = "benchmark_sensor", help_heading = "Workload")]
    pub sensor: String,

    /// Points per sensor in the multi-write test
    #[arg(long = "points-per-sensor", default_value_t = 1000, help_heading = "Workload")]
    pub points_per_sensor: u64,

    /// Sensors (writer threads) in the multi-write test
    #[arg(long = "sensors", default_value_t = 10, help_heading = "Workload")]
    pub sensors: usize,

    /// Points requested by the read test
    #[arg(long = "read-last", default_value_t = 100, help_heading = "Workload")]
    pub read_last: u32,

    /// Seed for random values (0 = random seed)
    #[arg(long = "seed", default_value_t = 0, help_heading = "Workload")]
    pub seed: u64,

    // === Pub/Sub ===
    /// Deliveries required by the pub/sub test
    #[arg(long = "pubsub-count", default_value_t = 10000, help_heading = "Pub/Sub")]
    pub pubsub_count: u64,

    /// Extra messages published, percent of --pubsub-count
    #[arg(long = "pubsub-margin", default_value_t = 10, help_heading = "Pub/Sub")]
    pub pubsub_margin: u64,

    /// Longest wait for all deliveries, in seconds
    #[arg(long = "pubsub-timeout", default_value_t = 60, help_heading = "Pub/Sub")]
    pub pubsub_timeout_secs: u64,

    /// RDY count announced by the NSQ consumer
    #[arg(long = "nsq-max-in-flight", default_value_t = 2500, help_heading = "Pub/Sub")]
    pub nsq_max_in_flight: u32,

    // === Output ===
    /// Write results to file
    #[arg(short = 'o', long = "output", help_heading = "Output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(long = "output-format", value_enum, default_value_t = OutputFormat::Text, help_heading = "Output")]
    pub output_format: OutputFormat,

    /// Quiet mode (errors only, no progress)
    #[arg(short = 'q', long = "quiet", help_heading = "Output")]
    pub quiet: bool,

    /// Verbose output
    #[arg(short = 'v', long = "verbose", help_heading = "Output")]
    pub verbose: bool,

    // === Timing ===
    /// Connection timeout in milliseconds
    #[arg(long = "connect-timeout", default_value_t = 5000, help_heading = "Timing")]
    pub connect_timeout_ms: u64,

    /// Per-request read/write timeout in milliseconds
    #[arg(long = "request-timeout", default_value_t = 30000, help_heading = "Timing")]
    pub request_timeout_ms: u64,
}

/// Output format for results
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

impl CliArgs {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Selected workloads, all of them when `--tests` is absent
    pub fn workloads(&self) -> Result<Vec<WorkloadType>, String> {
        match &self.tests {
            None => Ok(WorkloadType::ALL.to_vec()),
            Some(tests) => tests
                .iter()
                .map(|t| WorkloadType::parse(t.trim()).ok_or_else(|| format!("Unknown test: {}", t)))
                .collect(),
        }
    }

    /// Selected backends, all of them when `--backends` is absent
    pub fn backend_kinds(&self) -> Result<Vec<BackendKind>, String> {
        match &self.backends {
            None => Ok(BackendKind::ALL.to_vec()),
            Some(backends) => backends
                .iter()
                .map(|b| BackendKind::parse(b.trim()).ok_or_else(|| format!("Unknown backend: {}", b)))
                .collect(),
        }
    }

    /// Validate argument combinations
    pub fn validate(&self) -> Result<(), String> {
        if self.workloads()?.is_empty() {
            return Err("--tests must name at least one test".to_string());
        }
        if self.backend_kinds()?.is_empty() {
            return Err("--backends must name at least one backend".to_string());
        }

        if self.sensor.is_empty() {
            return Err("--sensor must not be empty".to_string());
        }

        if self.sensors == 0 {
            return Err("--sensors must be at least 1".to_string());
        }

        if self.pubsub_timeout_secs == 0 {
            return Err("--pubsub-timeout must be at least 1 second".to_string());
        }

        if self.connect_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err("--connect-timeout and --request-timeout must be positive".to_string());
        }

        if !self.influx_url.starts_with("http://") && !self.influx_url.starts_with("https://") {
            return Err("--influx-url must start with http:// or https://".to_string());
        }

        if self.quiet && self.verbose {
            return Err("--quiet and --verbose are mutually exclusive".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = CliArgs::parse_from(["test"]);
        assert_eq!(args.gtsdb_addr, "localhost:5555");
        assert_eq!(args.influx_url, "http://localhost:8086");
        assert_eq!(args.influx_org, "abby");
        assert_eq!(args.influx_bucket, "abby");
        assert_eq!(args.nsq_addr, "localhost:4150");
        assert_eq!(args.nsq_topic, "test");
        assert_eq!(args.nsq_pubsub_topic, "benchmark_pubsub");
        assert_eq!(args.nsq_channel, "benchmark#ephemeral");
        assert_eq!(args.points, 10000);
        assert_eq!(args.sensor, "benchmark_sensor");
        assert_eq!(args.points_per_sensor, 1000);
        assert_eq!(args.sensors, 10);
        assert_eq!(args.read_last, 100);
        assert_eq!(args.pubsub_margin, 10);
        assert_eq!(args.output_format, OutputFormat::Text);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_default_selection_is_everything() {
        let args = CliArgs::parse_from(["test"]);
        assert_eq!(args.workloads().unwrap(), WorkloadType::ALL.to_vec());
        assert_eq!(args.backend_kinds().unwrap(), BackendKind::ALL.to_vec());
    }

    #[test]
    fn test_test_and_backend_lists() {
        let args = CliArgs::parse_from(["test", "-t", "write,multi-write", "-b", "gtsdb,influx"]);
        assert_eq!(
            args.workloads().unwrap(),
            vec![WorkloadType::Write, WorkloadType::MultiWrite]
        );
        assert_eq!(
            args.backend_kinds().unwrap(),
            vec![BackendKind::Gtsdb, BackendKind::Influx]
        );
    }

    #[test]
    fn test_validation_unknown_test() {
        let args = CliArgs::parse_from(["test", "-t", "write,delete"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_unknown_backend() {
        let args = CliArgs::parse_from(["test", "-b", "redis"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_sensors() {
        let args = CliArgs::parse_from(["test", "--sensors", "0"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_influx_url_scheme() {
        let args = CliArgs::parse_from(["test", "--influx-url", "localhost:8086"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_output_args() {
        let args = CliArgs::parse_from(["test", "-o", "out.json", "--output-format", "json", "-q"]);
        assert_eq!(args.output, Some(PathBuf::from("out.json")));
        assert_eq!(args.output_format, OutputFormat::Json);
        assert!(args.quiet);
    }
}
