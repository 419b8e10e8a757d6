//! Round-trip benchmark driver
//!
//! Two shapes share one worker loop:
//! - sequential: one connection, every operation on the calling thread
//! - fan-out: one named thread per `WorkerPlan`, each with its own
//!   connection, joined before the result is finalized
//!
//! A worker that cannot connect records all of its operations as failed
//! without attempting any. Per-operation failures are counted and the loop
//! moves on; nothing is retried.

use std::thread;
use std::time::Instant;

use hdrhistogram::Histogram;
use tracing::{debug, warn};

use super::counters::BenchmarkCounters;
use super::progress::report_progress;
use super::result::{new_histogram, record_latency, BenchmarkResult};
use crate::client::{Backend, RoundTrip};
use crate::workload::{worker_rng, RequestSource, WorkloadType};

/// Share of a fan-out run handled by one worker thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPlan {
    pub key: String,
    pub operations: u64,
}

/// Settings common to both shapes
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverOptions {
    /// RNG seed; 0 seeds every worker randomly
    pub seed: u64,
    /// Render a progress bar while running
    pub show_progress: bool,
}

/// Run one worker's operations against its own session
fn drive_worker<B, S>(
    backend: &B,
    workload: WorkloadType,
    key: &str,
    operations: u64,
    source: &S,
    rng: &mut fastrand::Rng,
    counters: &BenchmarkCounters,
) -> Histogram<u64>
where
    B: Backend,
    S: RequestSource + ?Sized,
{
    let mut histogram = new_histogram();

    let mut session = match backend.open() {
        Ok(session) => session,
        Err(e) => {
            warn!(
                "{} {}: connection for {} failed, counting {} operations as failed: {}",
                backend.name(),
                workload,
                key,
                operations,
                e
            );
            counters.record_failures(operations);
            return histogram;
        }
    };

    for index in 0..operations {
        let request = source.request(key, index, rng);
        let started = Instant::now();
        match session.round_trip(&request) {
            Ok(()) => {
                record_latency(&mut histogram, started.elapsed());
                counters.record_success();
            }
            Err(e) => {
                if workload == WorkloadType::Read {
                    warn!("{} read of {} failed: {}", backend.name(), key, e);
                } else {
                    debug!("{} {} #{} on {} failed: {}", backend.name(), workload, index, key, e);
                }
                counters.record_failure();
            }
        }
    }

    histogram
}

/// Run `count` operations on a single connection from the calling thread
///
/// Duration covers connection setup through the last response.
pub fn run_sequential<B, S>(
    backend: &B,
    workload: WorkloadType,
    key: &str,
    count: u64,
    source: &S,
    options: DriverOptions,
) -> BenchmarkResult
where
    B: Backend,
    S: RequestSource + ?Sized,
{
    let counters = BenchmarkCounters::new(count);
    let mut rng = worker_rng(options.seed, 0);

    let (histogram, duration) = thread::scope(|s| {
        if options.show_progress {
            let counters = &counters;
            let label = format!("{} {}", backend.name(), workload);
            s.spawn(move || report_progress(counters, count, &label));
        }

        let start = Instant::now();
        let histogram = drive_worker(backend, workload, key, count, source, &mut rng, &counters);
        let duration = start.elapsed();
        counters.signal_shutdown();
        (histogram, duration)
    });

    counters.finalize(workload.as_str(), backend.name(), duration, histogram)
}

/// Operations across all plans, saturating at `u64::MAX`
fn total_operations(plans: &[WorkerPlan]) -> u64 {
    plans
        .iter()
        .fold(0u64, |total, plan| total.saturating_add(plan.operations))
}

/// Run every plan on its own named worker thread and join them all
///
/// Duration covers thread start through the last join.
pub fn run_fan_out<B, S>(
    backend: &B,
    workload: WorkloadType,
    plans: &[WorkerPlan],
    source: &S,
    options: DriverOptions,
) -> BenchmarkResult
where
    B: Backend,
    S: RequestSource + ?Sized,
{
    let total = total_operations(plans);
    let counters = BenchmarkCounters::new(total);
    let mut merged = new_histogram();

    let start = Instant::now();
    thread::scope(|s| {
        let counters = &counters;

        let progress = options.show_progress.then(|| {
            let label = format!("{} {}", backend.name(), workload);
            s.spawn(move || report_progress(counters, total, &label))
        });

        let mut handles = Vec::with_capacity(plans.len());
        for (worker_id, plan) in plans.iter().enumerate() {
            let spawned = thread::Builder::new()
                .name(format!("writer-{}", worker_id))
                .spawn_scoped(s, move || {
                    let mut rng = worker_rng(options.seed, worker_id);
                    drive_worker(
                        backend,
                        workload,
                        &plan.key,
                        plan.operations,
                        source,
                        &mut rng,
                        counters,
                    )
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    warn!("Failed to spawn worker {}: {}", worker_id, e);
                    counters.record_failures(plan.operations);
                }
            }
        }

        for handle in handles {
            match handle.join() {
                Ok(histogram) => {
                    merged.add(&histogram).ok();
                }
                Err(_) => warn!("{} {} worker panicked", backend.name(), workload),
            }
        }

        counters.signal_shutdown();
        if let Some(progress) = progress {
            progress.join().ok();
        }
    });
    let duration = start.elapsed();

    counters.finalize(workload.as_str(), backend.name(), duration, merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::raw_connection::tests::{spawn_echo_server, unreachable_addr};
    use crate::client::{ConnectionFactory, GtsdbBackend};
    use crate::utils::{ConnectionError, OperationError, Request};
    use crate::workload::{sensor_key, LastN, RandomWrites, SequentialWrites};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn gtsdb(addr: &str) -> GtsdbBackend {
        GtsdbBackend::new(addr, ConnectionFactory::default())
    }

    fn plans(sensors: usize, points: u64) -> Vec<WorkerPlan> {
        (0..sensors)
            .map(|i| WorkerPlan {
                key: sensor_key(i),
                operations: points,
            })
            .collect()
    }

    /// In-memory backend recording every written value
    struct RecordingBackend {
        seen: Arc<Mutex<Vec<(String, f64)>>>,
        fail_every: u64,
        refuse: bool,
    }

    impl RecordingBackend {
        fn new(fail_every: u64, refuse: bool) -> Self {
            Self {
                seen: Arc::new(Mutex::new(Vec::new())),
                fail_every,
                refuse,
            }
        }
    }

    struct RecordingSession {
        seen: Arc<Mutex<Vec<(String, f64)>>>,
        fail_every: u64,
        calls: u64,
    }

    impl RoundTrip for RecordingSession {
        fn round_trip(&mut self, request: &Request<'_>) -> Result<(), OperationError> {
            self.calls += 1;
            if self.fail_every > 0 && self.calls % self.fail_every == 0 {
                return Err(OperationError::Closed);
            }
            if let Request::Write { key, write } = request {
                self.seen.lock().push((key.to_string(), write.value));
            }
            Ok(())
        }
    }

    impl Backend for RecordingBackend {
        type Session = RecordingSession;

        fn name(&self) -> &'static str {
            "Recording"
        }

        fn open(&self) -> Result<RecordingSession, ConnectionError> {
            if self.refuse {
                return Err(ConnectionError::Unresolved("recording".to_string()));
            }
            Ok(RecordingSession {
                seen: Arc::clone(&self.seen),
                fail_every: self.fail_every,
                calls: 0,
            })
        }
    }

    #[test]
    fn test_sequential_unreachable_counts_all_failed() {
        let backend = gtsdb(&unreachable_addr());
        let result = run_sequential(
            &backend,
            WorkloadType::Write,
            "s1",
            5,
            &SequentialWrites,
            DriverOptions::default(),
        );

        assert_eq!(result.operation_count, 5);
        assert_eq!(result.success_count, 0);
        assert_eq!(result.failure_count, 5);
        assert_eq!(result.success_rate, 0.0);
        assert!(result.histogram.is_empty());
    }

    #[test]
    fn test_sequential_writes_against_echo() {
        let backend = gtsdb(&spawn_echo_server());
        let result = run_sequential(
            &backend,
            WorkloadType::Write,
            "s1",
            3,
            &SequentialWrites,
            DriverOptions::default(),
        );

        assert_eq!(result.operation_count, 3);
        assert_eq!(result.success_count, 3);
        assert_eq!(result.failure_count, 0);
        assert_eq!(result.success_rate, 100.0);
        assert_eq!(result.histogram.len(), 3);
        assert_eq!(result.test_name, "Write");
        assert_eq!(result.backend, "GTSDB");
    }

    #[test]
    fn test_single_read_against_echo() {
        let backend = gtsdb(&spawn_echo_server());
        let result = run_sequential(
            &backend,
            WorkloadType::Read,
            "s1",
            1,
            &LastN(100),
            DriverOptions::default(),
        );

        assert_eq!(result.operation_count, 1);
        assert_eq!(result.success_count, 1);
    }

    #[test]
    fn test_zero_operations() {
        let backend = gtsdb(&spawn_echo_server());
        let result = run_sequential(
            &backend,
            WorkloadType::Write,
            "s1",
            0,
            &SequentialWrites,
            DriverOptions::default(),
        );

        assert_eq!(result.operation_count, 0);
        assert_eq!(result.success_rate, 0.0);
    }

    #[test]
    fn test_total_operations_saturates() {
        assert_eq!(total_operations(&plans(3, 5)), 15);
        assert_eq!(total_operations(&plans(2, u64::MAX)), u64::MAX);
        assert_eq!(total_operations(&[]), 0);
    }

    #[test]
    fn test_fan_out_against_echo() {
        let backend = gtsdb(&spawn_echo_server());
        let result = run_fan_out(
            &backend,
            WorkloadType::MultiWrite,
            &plans(2, 4),
            &RandomWrites,
            DriverOptions::default(),
        );

        assert_eq!(result.operation_count, 8);
        assert_eq!(result.success_count, 8);
        assert_eq!(result.failure_count, 0);
        assert_eq!(result.test_name, "Multi-Write");
    }

    #[test]
    fn test_fan_out_unreachable() {
        let backend = gtsdb(&unreachable_addr());
        let result = run_fan_out(
            &backend,
            WorkloadType::MultiWrite,
            &plans(3, 10),
            &RandomWrites,
            DriverOptions::default(),
        );

        assert_eq!(result.operation_count, 30);
        assert_eq!(result.success_count, 0);
        assert_eq!(result.failure_count, 30);
    }

    #[test]
    fn test_fan_out_with_progress() {
        let backend = gtsdb(&spawn_echo_server());
        let options = DriverOptions {
            seed: 11,
            show_progress: true,
        };
        let result = run_fan_out(
            &backend,
            WorkloadType::MultiWrite,
            &plans(4, 25),
            &RandomWrites,
            options,
        );

        assert_eq!(result.success_count + result.failure_count, 100);
        assert_eq!(result.success_count, 100);
    }

    #[test]
    fn test_open_failure_short_circuits() {
        let backend = RecordingBackend::new(0, true);
        let result = run_sequential(
            &backend,
            WorkloadType::Write,
            "s1",
            4,
            &SequentialWrites,
            DriverOptions::default(),
        );

        assert_eq!(result.failure_count, 4);
        assert!(backend.seen.lock().is_empty());
    }

    #[test]
    fn test_sequential_values_increase() {
        let backend = RecordingBackend::new(0, false);
        run_sequential(
            &backend,
            WorkloadType::Write,
            "s1",
            5,
            &SequentialWrites,
            DriverOptions::default(),
        );

        let values: Vec<f64> = backend.seen.lock().iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_operation_failures_do_not_stop_the_loop() {
        let backend = RecordingBackend::new(2, false);
        let result = run_sequential(
            &backend,
            WorkloadType::Write,
            "s1",
            10,
            &SequentialWrites,
            DriverOptions::default(),
        );

        assert_eq!(result.success_count, 5);
        assert_eq!(result.failure_count, 5);
        assert_eq!(result.success_rate, 50.0);
    }

    #[test]
    fn test_fan_out_keys_one_worker_per_sensor() {
        let backend = RecordingBackend::new(0, false);
        let result = run_fan_out(
            &backend,
            WorkloadType::MultiWrite,
            &plans(3, 7),
            &RandomWrites,
            DriverOptions::default(),
        );

        assert_eq!(result.success_count, 21);
        let seen = backend.seen.lock();
        for i in 0..3 {
            let key = sensor_key(i);
            assert_eq!(seen.iter().filter(|(k, _)| *k == key).count(), 7);
        }
        assert!(seen.iter().all(|(_, v)| (0.0..100.0).contains(v)));
    }
}
