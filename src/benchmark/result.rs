//! Finalized benchmark results

use std::time::Duration;

use hdrhistogram::Histogram;

/// Latency histogram bounds: 1µs to 1h, 3 significant digits
pub const HISTOGRAM_MAX_US: u64 = 3_600_000_000;

/// Create an empty latency histogram (microseconds)
pub fn new_histogram() -> Histogram<u64> {
    Histogram::new_with_bounds(1, HISTOGRAM_MAX_US, 3).expect("Failed to create histogram")
}

/// Record one latency sample, clamped into the histogram's range
#[inline]
pub fn record_latency(histogram: &mut Histogram<u64>, latency: Duration) {
    let us = (latency.as_micros() as u64).clamp(1, HISTOGRAM_MAX_US);
    histogram.record(us).ok();
}

/// `success / operation_count * 100`; an empty run reports 0%
pub fn success_rate(success_count: u64, operation_count: u64) -> f64 {
    if operation_count == 0 {
        0.0
    } else {
        success_count as f64 / operation_count as f64 * 100.0
    }
}

/// Benchmark result summary
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    /// Test name ("Write", "Multi-Write", ...)
    pub test_name: String,
    /// Backend display name
    pub backend: String,
    /// Operations the run was asked to perform
    pub operation_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Wall-clock duration of the whole run
    pub duration: Duration,
    /// Percentage of `operation_count` that succeeded
    pub success_rate: f64,
    /// Merged latency histogram (µs)
    pub histogram: Histogram<u64>,
}

impl BenchmarkResult {
    pub fn new(
        test_name: &str,
        backend: &str,
        operation_count: u64,
        success_count: u64,
        failure_count: u64,
        duration: Duration,
        histogram: Histogram<u64>,
    ) -> Self {
        Self {
            test_name: test_name.to_string(),
            backend: backend.to_string(),
            operation_count,
            success_count,
            failure_count,
            duration,
            success_rate: success_rate(success_count, operation_count),
            histogram,
        }
    }

    /// Successful operations per second
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.success_count as f64 / secs
        } else {
            0.0
        }
    }

    /// Get percentile latency in microseconds
    pub fn percentile_us(&self, p: f64) -> u64 {
        self.histogram.value_at_percentile(p)
    }

    /// Get percentile latency in milliseconds
    pub fn percentile_ms(&self, p: f64) -> f64 {
        self.percentile_us(p) as f64 / 1000.0
    }

    pub fn mean_ms(&self) -> f64 {
        self.histogram.mean() / 1000.0
    }

    pub fn max_ms(&self) -> f64 {
        self.histogram.max() as f64 / 1000.0
    }

    /// Print summary (compact format)
    pub fn print_summary(&self) {
        println!("\n=== {} / {} ===", self.test_name, self.backend);
        println!(
            "Throughput: {} ops/s | Operations: {} | Duration: {:.2}s | Success Rate: {:.2}%{}",
            format_throughput(self.throughput()),
            format_count(self.operation_count),
            self.duration.as_secs_f64(),
            self.success_rate,
            if self.failure_count > 0 {
                format!(" | Failures: {}", format_count(self.failure_count))
            } else {
                String::new()
            }
        );

        // Pub/sub records no per-operation latency
        if !self.histogram.is_empty() {
            println!(
                "Latency (ms): avg={:.2} p50={:.2} p95={:.2} p99={:.2} p99.9={:.2} max={:.2}",
                self.mean_ms(),
                self.percentile_ms(50.0),
                self.percentile_ms(95.0),
                self.percentile_ms(99.0),
                self.percentile_ms(99.9),
                self.max_ms()
            );
        }
    }
}

/// Format throughput without meaningless decimals
/// Examples: 1,234,567 ops/s, 987,654 ops/s
pub fn format_throughput(throughput: f64) -> String {
    format_count(throughput as u64)
}

/// Format large numbers with thousands separators
/// Examples: 1,234,567 or 987,654
pub fn format_count(value: u64) -> String {
    let s = value.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}
