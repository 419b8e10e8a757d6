//! Publish/subscribe benchmark
//!
//! The subscriber is established and acknowledged before the publisher
//! starts. The publisher then sends `count` plus a safety margin of
//! messages while the subscriber counts deliveries; the run completes when
//! `count` deliveries arrived, the subscriber broke, or the completion
//! timeout elapsed, whichever comes first.

use std::thread;
use std::time::{Duration, Instant};

use flume::RecvTimeoutError;
use tracing::{debug, info, warn};

use super::counters::BenchmarkCounters;
use super::progress::report_progress;
use super::result::{new_histogram, BenchmarkResult};
use crate::client::{Delivery, InterruptHandle, PubSubBackend, RoundTrip};
use crate::utils::Request;
use crate::workload::WorkloadType;

/// Parameters of one pub/sub run
#[derive(Debug, Clone, Copy)]
pub struct PubSubPlan {
    /// Deliveries required for completion
    pub count: u64,
    /// Extra messages published, as a percentage of `count`
    pub margin_percent: u64,
    /// Longest wait for `count` deliveries
    pub completion_timeout: Duration,
    pub show_progress: bool,
}

impl PubSubPlan {
    /// Messages the publisher sends
    pub fn publish_count(&self) -> u64 {
        let margin = self.count.saturating_mul(self.margin_percent) / 100;
        self.count.saturating_add(margin)
    }
}

/// Run the pub/sub benchmark on `key`
///
/// `success_count` is the number of deliveries (never above `count`); any
/// shortfall is reported as failures.
pub fn run_pubsub<B: PubSubBackend>(backend: &B, key: &str, plan: &PubSubPlan) -> BenchmarkResult {
    let test_name = WorkloadType::PubSub.as_str();
    let count = plan.count;
    let counters = BenchmarkCounters::new(count);

    if count == 0 {
        return counters.finalize(test_name, backend.name(), Duration::ZERO, new_histogram());
    }

    let mut publisher = match backend.open_publisher() {
        Ok(publisher) => publisher,
        Err(e) => {
            warn!("{} publisher connection failed: {}", backend.name(), e);
            counters.record_failures(count);
            return counters.finalize(test_name, backend.name(), Duration::ZERO, new_histogram());
        }
    };

    let mut subscriber = match backend.subscribe(key) {
        Ok(subscriber) => subscriber,
        Err(e) => {
            warn!("{} subscriber failed: {}", backend.name(), e);
            counters.record_failures(count);
            return counters.finalize(test_name, backend.name(), Duration::ZERO, new_histogram());
        }
    };

    let interrupts: Vec<InterruptHandle> = publisher
        .interrupt_handle()
        .into_iter()
        .chain(subscriber.interrupt_handle())
        .collect();

    let (done_tx, done_rx) = flume::bounded::<Duration>(1);
    let publish_count = plan.publish_count();

    let start = Instant::now();
    let duration = thread::scope(|s| {
        let counters = &counters;

        if plan.show_progress {
            let label = format!("{} {}", backend.name(), test_name);
            s.spawn(move || report_progress(counters, count, &label));
        }

        let spawned = thread::Builder::new()
            .name("subscriber".to_string())
            .spawn_scoped(s, move || {
                let mut received = 0;
                while received < count {
                    match subscriber.next_delivery() {
                        Ok(()) => received = counters.record_success(),
                        Err(e) => {
                            if !counters.is_shutdown() {
                                warn!("Subscriber stopped after {} deliveries: {}", received, e);
                            }
                            // Dropping the sender ends the wait
                            return;
                        }
                    }
                }
                let elapsed = start.elapsed();
                subscriber.close();
                done_tx.send(elapsed).ok();
            });
        if let Err(e) = spawned {
            warn!("Failed to spawn subscriber: {}", e);
        }

        let spawned = thread::Builder::new()
            .name("publisher".to_string())
            .spawn_scoped(s, move || {
                for index in 0..publish_count {
                    if counters.is_shutdown() {
                        break;
                    }
                    if let Err(e) = publisher.round_trip(&Request::write(key, index as f64)) {
                        if !counters.is_shutdown() {
                            debug!("Publish #{} failed, publisher stopping: {}", index, e);
                        }
                        break;
                    }
                }
            });
        if let Err(e) = spawned {
            warn!("Failed to spawn publisher: {}", e);
        }

        let elapsed = match done_rx.recv_timeout(plan.completion_timeout) {
            Ok(elapsed) => elapsed,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Pub/sub timed out after {:?} with {}/{} deliveries",
                    plan.completion_timeout,
                    counters.successes(),
                    count
                );
                start.elapsed()
            }
            Err(RecvTimeoutError::Disconnected) => start.elapsed(),
        };

        counters.signal_shutdown();
        for handle in &interrupts {
            handle.interrupt();
        }
        elapsed
    });

    let received = counters.successes();
    counters.record_failures(count.saturating_sub(received));
    info!(
        "{} pub/sub: {}/{} deliveries in {:?}",
        backend.name(),
        received,
        count,
        duration
    );

    counters.finalize(test_name, backend.name(), duration, new_histogram())
}
