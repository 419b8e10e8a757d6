//! gtsdb-bench - throughput and latency benchmark for GTSDB
//!
//! Runs the write, read, multi-write and pub/sub tests against GTSDB and
//! the InfluxDB / NSQ baselines, then prints grouped results.

use anyhow::Result;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use gtsdb_bench::benchmark::{format_count, Orchestrator};
use gtsdb_bench::config::{BenchmarkConfig, CliArgs, OutputFormat};
use gtsdb_bench::metrics::MetricsReporter;
use gtsdb_bench::utils::BenchmarkError;

fn setup_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Failed to set tracing subscriber");
    }
}

fn print_banner(config: &BenchmarkConfig) {
    if config.quiet {
        return;
    }

    println!("gtsdb-bench v{}", env!("CARGO_PKG_VERSION"));
    println!("====================================");
    println!("GTSDB: {}", config.gtsdb_addr);
    println!(
        "InfluxDB: {} (org={}, bucket={})",
        config.influx.url, config.influx.org, config.influx.bucket
    );
    println!(
        "NSQ: {} (topic={}, pubsub topic={}, channel={})",
        config.nsq.addr, config.nsq.topic, config.nsq.pubsub_topic, config.nsq.channel
    );
    println!(
        "Tests: {:?}",
        config.workloads.iter().map(|w| w.as_str()).collect::<Vec<_>>()
    );
    println!(
        "Backends: {:?}",
        config.backends.iter().map(|b| b.as_str()).collect::<Vec<_>>()
    );
    println!(
        "Points: {}, Multi-write: {} sensors x {} points, Pub/sub: {} (+{}%)",
        format_count(config.points),
        config.sensors,
        format_count(config.points_per_sensor),
        format_count(config.pubsub_count),
        config.pubsub_margin
    );
    println!("====================================\n");
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse_args();

    // Setup logging
    setup_logging(args.verbose, args.quiet);

    // Build configuration
    let config = BenchmarkConfig::from_cli(&args).map_err(BenchmarkError::Config)?;

    print_banner(&config);

    let orchestrator = Orchestrator::new(config.clone())?;
    let results = orchestrator.run_all();
    let summary = config.summary();

    // Export to file if requested; stdout then gets the text report
    let stdout_format = match config.output_path {
        Some(ref output_path) => {
            info!("Writing results to: {:?}", output_path);
            MetricsReporter::new(config.output_format).write_file(output_path, &summary, &results)?;
            OutputFormat::Text
        }
        None => config.output_format,
    };

    if stdout_format == OutputFormat::Text {
        println!("\n====================================");
        println!("BENCHMARK COMPLETE");
        println!("====================================");
    }
    MetricsReporter::new(stdout_format).report(&summary, &results)?;

    if stdout_format == OutputFormat::Text {
        let operations: u64 = results.iter().map(|r| r.operation_count).sum();
        let failures: u64 = results.iter().map(|r| r.failure_count).sum();
        println!("\nTests run: {}", results.len());
        println!("Total operations: {}", format_count(operations));
        println!("Total failures: {}", format_count(failures));
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}
