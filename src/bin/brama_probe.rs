//! Brama Probe CLI
//!
//! Runs one poll cycle against an amplifier and prints every control with its
//! current value. Useful for checking connectivity and firmware field names
//! before configuring the server.
//!
//! Usage:
//!   brama-probe <host> [--timeout <secs>] [--json]
//!
//! Exit code 1 when the amplifier could not be polled.

use brama_control::bus::create_bus;
use brama_control::client::BramaClient;
use brama_control::controls::{self, ControlValue};
use brama_control::coordinator::PollCoordinator;

use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Args {
    host: String,
    timeout: Option<Duration>,
    json: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = env::args().skip(1);
    let mut host = None;
    let mut timeout = None;
    let mut json = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--timeout" => {
                let secs = args
                    .next()
                    .ok_or("Missing value for --timeout")?
                    .parse::<u64>()
                    .map_err(|e| format!("Invalid --timeout: {}", e))?;
                timeout = Some(Duration::from_secs(secs.max(1)));
            }
            "-h" | "--help" => return Err(String::new()),
            other if other.starts_with('-') => return Err(format!("Unknown option: {}", other)),
            other => host = Some(other.to_string()),
        }
    }

    Ok(Args {
        host: host.ok_or("Missing host argument")?,
        timeout,
        json,
    })
}

fn print_usage() {
    eprintln!("Brama Probe - poll a Brama amplifier once and print its controls");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  brama-probe <host> [--timeout <secs>] [--json]");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  brama-probe 192.168.1.50");
    eprintln!("  RUST_LOG=brama_control=debug brama-probe 192.168.1.50 --json");
}

fn format_value(value: &ControlValue, unit: Option<&str>) -> String {
    let unit = unit.unwrap_or("");
    match value {
        ControlValue::Switch { on } => (if *on { "on" } else { "off" }).to_string(),
        ControlValue::Select { option } => option.clone().unwrap_or_else(|| "unknown".to_string()),
        ControlValue::Number { value } => format!("{}{}", value, unit),
        ControlValue::Sensor { value } => format!("{:.2} {}", value, unit),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "brama_control=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("Error: {}", msg);
                eprintln!();
            }
            print_usage();
            process::exit(1);
        }
    };

    let client = match args.timeout {
        Some(timeout) => BramaClient::with_timeout(args.host.clone(), timeout),
        None => BramaClient::new(args.host.clone()),
    };
    let client = match client {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let coordinator = PollCoordinator::new(Arc::new(client), create_bus());
    let snapshot = match coordinator.first_refresh().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let views = controls::project_all(&snapshot);

    if args.json {
        let out = serde_json::json!({
            "host": args.host,
            "controls": views,
            "snapshot": snapshot.as_ref(),
        });
        match serde_json::to_string_pretty(&out) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    println!("Brama at {} (fetched {})", args.host, snapshot.fetched_at);
    println!();
    for view in &views {
        println!(
            "  {:<22} {:<20} {}",
            view.key,
            view.name,
            format_value(&view.value, view.unit)
        );
    }
}
