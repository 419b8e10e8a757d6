//! Console progress bar fed from the shared counters

use std::thread;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

use super::counters::BenchmarkCounters;
use super::result::format_count;

/// Poll `counters` every 100ms and render a progress bar until all `total`
/// operations finished or shutdown is signaled
pub fn report_progress(counters: &BenchmarkCounters, total: u64, label: &str) {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_prefix(label.to_string());

    let mut last_finished = 0u64;
    let mut last_time = Instant::now();

    while !counters.is_shutdown() {
        let finished = counters.progress();
        pb.set_position(finished);

        // Current throughput without decimals
        let now = Instant::now();
        let interval = now.duration_since(last_time).as_secs_f64();
        if interval >= 0.5 {
            let throughput = finished.saturating_sub(last_finished) as f64 / interval;
            pb.set_message(format!("{}/s", format_count(throughput as u64)));
            last_finished = finished;
            last_time = now;
        }

        if finished >= total {
            break;
        }

        thread::sleep(Duration::from_millis(100));
    }

    pb.set_position(counters.progress());
    pb.finish_with_message("done");
}
