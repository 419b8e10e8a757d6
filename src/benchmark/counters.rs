//! Atomic outcome counters shared by benchmark workers
//!
//! These are the ONLY synchronization points between worker threads.
//! Connections, encoders and histograms are all worker-local.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use hdrhistogram::Histogram;

use super::result::BenchmarkResult;

/// Success/failure tallies for one benchmark run
///
/// Workers only ever `fetch_add`, so relaxed ordering is sufficient; the
/// final values are read after every worker has been joined.
pub struct BenchmarkCounters {
    operation_count: u64,

    /// Round-trips that completed
    pub success: AtomicU64,

    /// Round-trips that failed, including operations never attempted
    /// because their connection could not be opened
    pub failure: AtomicU64,

    /// Shutdown signal
    pub shutdown: AtomicBool,
}

impl BenchmarkCounters {
    /// Create counters for a run of `operation_count` operations
    pub fn new(operation_count: u64) -> Self {
        Self {
            operation_count,
            success: AtomicU64::new(0),
            failure: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn operation_count(&self) -> u64 {
        self.operation_count
    }

    /// Record one success; returns the new success total
    #[inline]
    pub fn record_success(&self) -> u64 {
        self.success.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[inline]
    pub fn record_failure(&self) {
        self.failure.fetch_add(1, Ordering::Relaxed);
    }

    /// Record `count` failures at once (connection lost before any attempt)
    #[inline]
    pub fn record_failures(&self, count: u64) {
        if count > 0 {
            self.failure.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn successes(&self) -> u64 {
        self.success.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failure.load(Ordering::Relaxed)
    }

    /// Operations finished so far, successful or not
    pub fn progress(&self) -> u64 {
        self.successes() + self.failures()
    }

    /// Signal shutdown to all workers
    pub fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Check if shutdown has been signaled
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Freeze the tallies into a result
    ///
    /// Must only be called once every worker has been joined.
    pub fn finalize(
        self,
        test_name: &str,
        backend: &str,
        duration: Duration,
        histogram: Histogram<u64>,
    ) -> BenchmarkResult {
        BenchmarkResult::new(
            test_name,
            backend,
            self.operation_count,
            self.success.into_inner(),
            self.failure.into_inner(),
            duration,
            histogram,
        )
    }
}
