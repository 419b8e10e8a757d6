//! Send one GTSDB request and print the response line
//!
//! Usage: gtsdb-probe <addr> write <key> <value>
//!        gtsdb-probe <addr> read <key> [lastx]
//!        gtsdb-probe <addr> subscribe <key> [messages]

use std::env;
use std::time::Duration;

use gtsdb_bench::client::LineConnection;
use gtsdb_bench::utils::{LineEncoder, ReadSelector, Request};

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} <addr> write <key> <value>", program);
    eprintln!("       {} <addr> read <key> [lastx]", program);
    eprintln!("       {} <addr> subscribe <key> [messages]", program);
    std::process::exit(1);
}

/// argv[0], which the OS does not guarantee to pass
fn program_name(args: &[String]) -> &str {
    args.first().map_or("gtsdb-probe", String::as_str)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let program = program_name(&args);
    if args.len() < 4 {
        usage(program);
    }

    let addr = &args[1];
    let key = args[3].as_str();
    let extra = args.get(4).map(|s| s.as_str());

    let (request, follow) = match args[2].as_str() {
        "write" => {
            let value: f64 = extra.unwrap_or_else(|| usage(program)).parse()?;
            (Request::write(key, value), 0)
        }
        "read" => {
            let lastx: u32 = extra.map(str::parse::<u32>).transpose()?.unwrap_or(100);
            (Request::read(key, ReadSelector::last(lastx)), 0)
        }
        "subscribe" => {
            let messages: u64 = extra.map(str::parse::<u64>).transpose()?.unwrap_or(1);
            (Request::subscribe(key), messages)
        }
        _ => usage(program),
    };

    let mut conn = LineConnection::connect(addr, Duration::from_secs(5))?;
    let mut encoder = LineEncoder::with_capacity(256);

    let framed = encoder.encode(&request)?;
    println!("> {}", String::from_utf8_lossy(framed).trim_end());

    let reply = conn.execute(framed)?;
    println!("< {}", String::from_utf8_lossy(reply).trim_end());

    // Subscriptions keep delivering after the acknowledgment
    if follow > 0 {
        conn.set_read_timeout(None)?;
        for _ in 0..follow {
            let line = conn.read_line()?;
            println!("< {}", String::from_utf8_lossy(line).trim_end());
        }
    }

    Ok(())
}
