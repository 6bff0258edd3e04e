use clap::Parser;
use client::simulator::{run, RandomWalk, SimulatorConfig};
use log::info;
use shared::Coordinates;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Bearer token identifying the driver
    #[arg(short = 't', long)]
    token: String,

    /// Starting latitude
    #[arg(long, default_value = "45.4642", allow_negative_numbers = true)]
    lat: f64,

    /// Starting longitude
    #[arg(long, default_value = "9.19", allow_negative_numbers = true)]
    lon: f64,

    /// Largest move per report, in degrees
    #[arg(long, default_value = "0.0005")]
    step: f64,

    /// Milliseconds between position reports
    #[arg(short = 'i', long, default_value = "1000")]
    interval_ms: u64,

    /// Stop reporting after this many fixes to get evicted
    #[arg(long)]
    silent_after: Option<u64>,

    /// Exit after receiving this many snapshots
    #[arg(short = 'n', long)]
    snapshots: Option<u64>,

    /// Seed for a reproducible walk
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let start = Coordinates::new(args.lat, args.lon)?;

    let walk = match args.seed {
        Some(seed) => RandomWalk::seeded(start, args.step, seed),
        None => RandomWalk::new(start, args.step),
    };

    let config = SimulatorConfig {
        server: args.server,
        token: args.token,
        start,
        step: args.step,
        report_interval: Duration::from_millis(args.interval_ms),
        silent_after: args.silent_after,
        max_snapshots: args.snapshots,
    };

    let summary = run(config, walk).await?;
    info!(
        "Sent {} reports, received {} snapshots{}",
        summary.reports_sent,
        summary.snapshots_received,
        if summary.closed_by_server {
            ", closed by server"
        } else {
            ""
        }
    );

    Ok(())
}
