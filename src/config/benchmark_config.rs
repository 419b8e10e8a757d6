//! Benchmark configuration derived from CLI arguments

use std::path::PathBuf;
use std::time::Duration;

use super::cli::{CliArgs, OutputFormat};
use crate::client::{ConnectionFactory, InfluxConfig, NsqConfig};
use crate::workload::{BackendKind, WorkloadType};

/// Complete benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    // Targets
    pub gtsdb_addr: String,
    pub influx: InfluxConfig,
    pub nsq: NsqConfig,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,

    // Selection
    pub workloads: Vec<WorkloadType>,
    pub backends: Vec<BackendKind>,

    // Workload shapes
    pub points: u64,
    pub sensor: String,
    pub points_per_sensor: u64,
    pub sensors: usize,
    pub read_last: u32,
    pub seed: u64,

    // Pub/sub
    pub pubsub_count: u64,
    pub pubsub_margin: u64,
    pub pubsub_timeout: Duration,

    // Output
    pub output_path: Option<PathBuf>,
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
}

impl BenchmarkConfig {
    /// Create configuration from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self, String> {
        // Validate first
        args.validate()?;

        let request_timeout = Duration::from_millis(args.request_timeout_ms);

        let influx = InfluxConfig {
            url: args.influx_url.clone(),
            token: args.influx_token.clone(),
            org: args.influx_org.clone(),
            bucket: args.influx_bucket.clone(),
            request_timeout,
        };

        let nsq = NsqConfig {
            addr: args.nsq_addr.clone(),
            topic: args.nsq_topic.clone(),
            pubsub_topic: args.nsq_pubsub_topic.clone(),
            channel: args.nsq_channel.clone(),
            max_in_flight: args.nsq_max_in_flight,
        };

        Ok(Self {
            gtsdb_addr: args.gtsdb_addr.clone(),
            influx,
            nsq,
            connect_timeout: Duration::from_millis(args.connect_timeout_ms),
            request_timeout,

            workloads: args.workloads()?,
            backends: args.backend_kinds()?,

            points: args.points,
            sensor: args.sensor.clone(),
            points_per_sensor: args.points_per_sensor,
            sensors: args.sensors,
            read_last: args.read_last,
            seed: args.seed,

            pubsub_count: args.pubsub_count,
            pubsub_margin: args.pubsub_margin,
            pubsub_timeout: Duration::from_secs(args.pubsub_timeout_secs),

            output_path: args.output.clone(),
            output_format: args.output_format,
            quiet: args.quiet,
            verbose: args.verbose,
        })
    }

    /// Socket factory carrying the configured timeouts
    pub fn connection_factory(&self) -> ConnectionFactory {
        ConnectionFactory {
            connect_timeout: self.connect_timeout,
            read_timeout: self.request_timeout,
            write_timeout: self.request_timeout,
        }
    }

    /// One-line description for banners and exports
    pub fn summary(&self) -> String {
        format!(
            "gtsdb={}, influx={}, nsq={}, points={}, sensors={}x{}, pubsub={}+{}%",
            self.gtsdb_addr,
            self.influx.url,
            self.nsq.addr,
            self.points,
            self.sensors,
            self.points_per_sensor,
            self.pubsub_count,
            self.pubsub_margin
        )
    }
}
