//! Benchmark orchestrator
//!
//! Builds every configured backend once and runs the selected tests across
//! them, skipping combinations a backend cannot serve.

use tracing::{debug, info};

use super::driver::{run_fan_out, run_sequential, DriverOptions, WorkerPlan};
use super::pubsub::{run_pubsub, PubSubPlan};
use super::result::BenchmarkResult;
use crate::client::{Backend, GtsdbBackend, InfluxClient, NsqBackend};
use crate::config::BenchmarkConfig;
use crate::utils::Result;
use crate::workload::{
    pubsub_key, sensor_key, BackendKind, LastN, RandomWrites, SequentialWrites, WorkloadType,
};

/// Benchmark orchestrator
pub struct Orchestrator {
    config: BenchmarkConfig,
    gtsdb: GtsdbBackend,
    influx: InfluxClient,
    nsq: NsqBackend,
    /// Tags this run's pub/sub messages
    run_id: u32,
}

impl Orchestrator {
    /// Create orchestrator from config
    ///
    /// No connection is opened here; every test connects on its own.
    pub fn new(config: BenchmarkConfig) -> Result<Self> {
        let factory = config.connection_factory();
        let gtsdb = GtsdbBackend::new(config.gtsdb_addr.clone(), factory.clone());
        let influx = InfluxClient::new(config.influx.clone())?;
        let nsq = NsqBackend::new(config.nsq.clone(), factory);

        Ok(Self {
            config,
            gtsdb,
            influx,
            nsq,
            run_id: fastrand::u32(..),
        })
    }

    fn driver_options(&self) -> DriverOptions {
        DriverOptions {
            seed: self.config.seed,
            show_progress: !self.config.quiet,
        }
    }

    fn pubsub_plan(&self) -> PubSubPlan {
        PubSubPlan {
            count: self.config.pubsub_count,
            margin_percent: self.config.pubsub_margin,
            completion_timeout: self.config.pubsub_timeout,
            show_progress: !self.config.quiet,
        }
    }

    /// One writer per sensor, `points_per_sensor` writes each
    fn multi_write_plans(&self) -> Vec<WorkerPlan> {
        (0..self.config.sensors)
            .map(|i| WorkerPlan {
                key: sensor_key(i),
                operations: self.config.points_per_sensor,
            })
            .collect()
    }

    /// Run a round-trip workload; `None` for pub/sub
    fn run_round_trip<B: Backend>(
        &self,
        backend: &B,
        workload: WorkloadType,
    ) -> Option<BenchmarkResult> {
        let options = self.driver_options();
        let sensor = self.config.sensor.as_str();

        match workload {
            WorkloadType::Write => Some(run_sequential(
                backend,
                workload,
                sensor,
                self.config.points,
                &SequentialWrites,
                options,
            )),
            WorkloadType::Read => Some(run_sequential(
                backend,
                workload,
                sensor,
                1,
                &LastN(self.config.read_last),
                options,
            )),
            WorkloadType::MultiWrite => Some(run_fan_out(
                backend,
                workload,
                &self.multi_write_plans(),
                &RandomWrites,
                options,
            )),
            WorkloadType::PubSub => None,
        }
    }

    /// Run a single test against one backend
    ///
    /// Returns `None` when the backend does not support the workload.
    pub fn run_test(&self, workload: WorkloadType, backend: BackendKind) -> Option<BenchmarkResult> {
        if !workload.supports(backend) {
            debug!("Skipping {}: not supported by {}", workload, backend);
            return None;
        }

        let key = pubsub_key(&self.config.sensor, self.run_id);
        match (workload, backend) {
            (WorkloadType::PubSub, BackendKind::Gtsdb) => {
                Some(run_pubsub(&self.gtsdb, &key, &self.pubsub_plan()))
            }
            (WorkloadType::PubSub, BackendKind::Nsq) => {
                Some(run_pubsub(&self.nsq, &key, &self.pubsub_plan()))
            }
            (WorkloadType::PubSub, BackendKind::Influx) => None,
            (_, BackendKind::Gtsdb) => self.run_round_trip(&self.gtsdb, workload),
            (_, BackendKind::Influx) => self.run_round_trip(&self.influx, workload),
            (_, BackendKind::Nsq) => self.run_round_trip(&self.nsq, workload),
        }
    }

    /// Run all configured tests, each across all configured backends
    pub fn run_all(&self) -> Vec<BenchmarkResult> {
        let mut results = Vec::new();

        for &workload in &self.config.workloads {
            for &backend in &self.config.backends {
                if !self.config.quiet && workload.supports(backend) {
                    println!("\nRunning test: {} ({})", workload, backend);
                }

                let Some(result) = self.run_test(workload, backend) else {
                    continue;
                };
                info!(
                    "{} on {}: {}/{} succeeded in {:?}",
                    workload,
                    backend,
                    result.success_count,
                    result.operation_count,
                    result.duration
                );
                if !self.config.quiet {
                    result.print_summary();
                }
                results.push(result);
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::gtsdb::tests::spawn_broker;
    use crate::client::influx::tests::spawn_http_server;
    use crate::client::nsq_connection::tests::{spawn_nsqd, spawn_nsqd_with, MockNsqd};
    use crate::client::raw_connection::tests::unreachable_addr;
    use crate::config::CliArgs;
    use clap::Parser;

    fn config(gtsdb: &str, influx: &str, nsq: &str, extra: &[&str]) -> BenchmarkConfig {
        let mut argv = vec![
            "test".to_string(),
            "--gtsdb".to_string(),
            gtsdb.to_string(),
            "--influx-url".to_string(),
            influx.to_string(),
            "--nsq".to_string(),
            nsq.to_string(),
            "-n".to_string(),
            "20".to_string(),
            "--sensors".to_string(),
            "3".to_string(),
            "--points-per-sensor".to_string(),
            "5".to_string(),
            "--pubsub-count".to_string(),
            "10".to_string(),
            "-q".to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        BenchmarkConfig::from_cli(&CliArgs::parse_from(argv)).unwrap()
    }

    #[test]
    fn test_run_all_against_mocks() {
        let gtsdb = spawn_broker();
        let (influx, _captured) = spawn_http_server(204);
        let nsq = spawn_nsqd(false);

        let orchestrator = Orchestrator::new(config(&gtsdb, &influx, &nsq, &[])).unwrap();
        let results = orchestrator.run_all();

        let names: Vec<(String, String)> = results
            .iter()
            .map(|r| (r.test_name.clone(), r.backend.clone()))
            .collect();
        let expected = [
            ("Write", "GTSDB"),
            ("Write", "InfluxDB"),
            ("Write", "NSQ"),
            ("Read", "GTSDB"),
            ("Read", "InfluxDB"),
            ("Multi-Write", "GTSDB"),
            ("Multi-Write", "InfluxDB"),
            ("Multi-Write", "NSQ"),
            ("PubSub", "GTSDB"),
            ("PubSub", "NSQ"),
        ];
        assert_eq!(
            names,
            expected
                .iter()
                .map(|(t, b)| (t.to_string(), b.to_string()))
                .collect::<Vec<_>>()
        );

        for result in &results {
            assert_eq!(
                result.success_rate, 100.0,
                "{} on {} failed",
                result.test_name, result.backend
            );
        }
        assert_eq!(results[0].operation_count, 20);
        assert_eq!(results[3].operation_count, 1);
        assert_eq!(results[5].operation_count, 15);
        assert_eq!(results[8].operation_count, 10);
    }

    /// nsqd that queues messages for topics nobody subscribed to yet and
    /// refuses publishes once a subscriber exists
    fn buffering_nsqd() -> String {
        spawn_nsqd_with(MockNsqd {
            heartbeat: false,
            reject_after_subscribe: true,
        })
    }

    fn run_nsq_write_then_pubsub(nsq: &str, extra: &[&str]) -> Vec<BenchmarkResult> {
        let down = unreachable_addr();
        let mut args = vec!["-b", "nsq", "-t", "write,pubsub"];
        args.extend_from_slice(extra);
        let orchestrator =
            Orchestrator::new(config(&down, &format!("http://{}", down), nsq, &args)).unwrap();
        orchestrator.run_all()
    }

    #[test]
    fn test_nsq_pubsub_ignores_write_backlog() {
        let results = run_nsq_write_then_pubsub(&buffering_nsqd(), &["--pubsub-timeout", "1"]);
        assert_eq!(results.len(), 2);

        let write = &results[0];
        assert_eq!((write.test_name.as_str(), write.success_count), ("Write", 20));

        // Every pub/sub publish is refused, so nothing may count as delivered
        let pubsub = &results[1];
        assert_eq!(pubsub.test_name, "PubSub");
        assert_eq!(pubsub.success_count, 0);
        assert_eq!(pubsub.failure_count, 10);
    }

    #[test]
    fn test_nsq_pubsub_ignores_backlog_on_shared_topic() {
        let results = run_nsq_write_then_pubsub(
            &buffering_nsqd(),
            &["--pubsub-timeout", "1", "--nsq-pubsub-topic", "test"],
        );

        assert_eq!(results[0].success_count, 20);
        assert_eq!(results[1].success_count, 0);
        assert_eq!(results[1].failure_count, 10);
    }

    #[test]
    fn test_unreachable_targets_still_report() {
        let down = unreachable_addr();
        let orchestrator = Orchestrator::new(config(
            &down,
            &format!("http://{}", down),
            &down,
            &["-t", "write,pubsub"],
        ))
        .unwrap();

        let results = orchestrator.run_all();
        assert_eq!(results.len(), 5);
        for result in &results {
            assert_eq!(result.success_count, 0);
            assert_eq!(result.failure_count, result.operation_count);
            assert_eq!(result.success_rate, 0.0);
        }
    }

    #[test]
    fn test_unsupported_combination_is_skipped() {
        let down = unreachable_addr();
        let orchestrator =
            Orchestrator::new(config(&down, "http://127.0.0.1:1", &down, &[])).unwrap();

        assert!(orchestrator
            .run_test(WorkloadType::Read, BackendKind::Nsq)
            .is_none());
        assert!(orchestrator
            .run_test(WorkloadType::PubSub, BackendKind::Influx)
            .is_none());
    }
}
