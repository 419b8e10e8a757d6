//! Metrics reporter - output formatting and export
//!
//! Supports multiple output formats:
//! - Text (grouped per test, one line per backend)
//! - JSON
//! - CSV

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::benchmark::BenchmarkResult;
use crate::config::OutputFormat;
use crate::utils::Result;

/// Latency summary in milliseconds
#[derive(Debug, Clone, Serialize)]
pub struct LatencySummary {
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub p999_ms: f64,
    pub max_ms: f64,
}

/// Flattened, serializable view of one `BenchmarkResult`
#[derive(Debug, Clone, Serialize)]
pub struct ResultRecord {
    pub test_name: String,
    pub backend: String,
    pub operation_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub duration_secs: f64,
    pub success_rate: f64,
    pub throughput: f64,
    /// Absent when no per-operation latency was recorded (pub/sub)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencySummary>,
}

impl From<&BenchmarkResult> for ResultRecord {
    fn from(result: &BenchmarkResult) -> Self {
        let latency = (!result.histogram.is_empty()).then(|| LatencySummary {
            mean_ms: result.mean_ms(),
            p50_ms: result.percentile_ms(50.0),
            p95_ms: result.percentile_ms(95.0),
            p99_ms: result.percentile_ms(99.0),
            p999_ms: result.percentile_ms(99.9),
            max_ms: result.max_ms(),
        });

        Self {
            test_name: result.test_name.clone(),
            backend: result.backend.clone(),
            operation_count: result.operation_count,
            success_count: result.success_count,
            failure_count: result.failure_count,
            duration_secs: result.duration.as_secs_f64(),
            success_rate: result.success_rate,
            throughput: result.throughput(),
            latency,
        }
    }
}

/// Complete export document
#[derive(Debug, Serialize)]
pub struct BenchmarkResults {
    /// Configuration summary
    pub config: String,
    /// All test results
    pub tests: Vec<ResultRecord>,
}

impl BenchmarkResults {
    pub fn new(config_summary: &str, results: &[BenchmarkResult]) -> Self {
        Self {
            config: config_summary.to_string(),
            tests: results.iter().map(ResultRecord::from).collect(),
        }
    }
}

/// Header of the CSV export
pub const CSV_HEADER: &str = "test_name,backend,operations,successes,failures,duration_secs,success_rate,throughput,mean_ms,p50_ms,p95_ms,p99_ms,p999_ms,max_ms";

/// Metrics reporter
pub struct MetricsReporter {
    format: OutputFormat,
}

impl MetricsReporter {
    /// Create new reporter with specified format
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render `results` in the configured format
    pub fn render<W: Write>(
        &self,
        out: &mut W,
        config_summary: &str,
        results: &[BenchmarkResult],
    ) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => render_text(out, results),
            OutputFormat::Json => render_json(out, config_summary, results),
            OutputFormat::Csv => render_csv(out, results),
        }
    }

    /// Report to stdout
    pub fn report(&self, config_summary: &str, results: &[BenchmarkResult]) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.render(&mut out, config_summary, results)?;
        out.flush()
    }

    /// Write results to `path`
    pub fn write_file(
        &self,
        path: &Path,
        config_summary: &str,
        results: &[BenchmarkResult],
    ) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.render(&mut out, config_summary, results)?;
        out.flush()?;
        Ok(())
    }
}

/// Grouped plain text: one heading per test, one line per backend
///
/// ```text
/// Write Performance:
/// GTSDB: 1.2345s (Success Rate: 100.00%)
/// ```
pub fn render_text<W: Write>(out: &mut W, results: &[BenchmarkResult]) -> io::Result<()> {
    let mut tests: Vec<&str> = Vec::new();
    for result in results {
        if !tests.contains(&result.test_name.as_str()) {
            tests.push(&result.test_name);
        }
    }

    for (i, test) in tests.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        writeln!(out, "{} Performance:", test)?;
        for result in results.iter().filter(|r| r.test_name == *test) {
            writeln!(
                out,
                "{}: {:?} (Success Rate: {:.2}%)",
                result.backend, result.duration, result.success_rate
            )?;
        }
    }
    Ok(())
}

pub fn render_json<W: Write>(
    out: &mut W,
    config_summary: &str,
    results: &[BenchmarkResult],
) -> io::Result<()> {
    let document = BenchmarkResults::new(config_summary, results);
    serde_json::to_writer_pretty(&mut *out, &document)?;
    writeln!(out)
}

pub fn render_csv<W: Write>(out: &mut W, results: &[BenchmarkResult]) -> io::Result<()> {
    writeln!(out, "{}", CSV_HEADER)?;
    for record in results.iter().map(ResultRecord::from) {
        let latency = record.latency.unwrap_or(LatencySummary {
            mean_ms: 0.0,
            p50_ms: 0.0,
            p95_ms: 0.0,
            p99_ms: 0.0,
            p999_ms: 0.0,
            max_ms: 0.0,
        });
        writeln!(
            out,
            "{},{},{},{},{},{:.3},{:.2},{:.2},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3}",
            record.test_name,
            record.backend,
            record.operation_count,
            record.success_count,
            record.failure_count,
            record.duration_secs,
            record.success_rate,
            record.throughput,
            latency.mean_ms,
            latency.p50_ms,
            latency.p95_ms,
            latency.p99_ms,
            latency.p999_ms,
            latency.max_ms
        )?;
    }
    Ok(())
}
