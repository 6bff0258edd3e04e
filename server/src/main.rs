use clap::Parser;
use log::{error, info};
use server::auth::StaticTokens;
use server::billing::SystemClock;
use server::config::ServerConfig;
use server::drivers::{DriverRecord, InMemoryDriverRepository};
use server::network::Server;
use shared::DriverId;
use std::sync::Arc;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Milliseconds between fleet snapshots
    #[clap(long, default_value = "2000")]
    broadcast_ms: u64,
    /// Milliseconds of silence before a driver is evicted
    #[clap(long, default_value = "5000")]
    liveness_ms: u64,
    /// Price of the first session of each day
    #[clap(long, default_value = "30")]
    daily_cost: i64,
    /// Snapshots buffered per driver
    #[clap(long, default_value = "1")]
    conduit_capacity: usize,
    /// File of `token=driver-uuid` lines; generated tokens are used otherwise
    #[clap(short, long)]
    tokens: Option<String>,
    /// Number of drivers to generate when no token file is given
    #[clap(short, long, default_value = "3")]
    drivers: usize,
    /// Starting balance of every seeded driver
    #[clap(short, long, default_value = "100")]
    balance: i64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let config = ServerConfig {
        broadcast_interval: Duration::from_millis(args.broadcast_ms),
        liveness_threshold: Duration::from_millis(args.liveness_ms),
        daily_cost: args.daily_cost,
        conduit_capacity: args.conduit_capacity,
        ..ServerConfig::default()
    };

    let repository = Arc::new(InMemoryDriverRepository::new());
    let tokens = match &args.tokens {
        Some(path) => {
            let contents = tokio::fs::read_to_string(path).await?;
            let tokens = StaticTokens::parse(&contents)?;
            for (token, driver_id) in tokens.entries() {
                repository.insert(DriverRecord::new(driver_id, token, args.balance));
            }
            info!("Loaded {} drivers from {}", repository.len(), path);
            tokens
        }
        None => {
            let tokens = StaticTokens::new();
            for n in 1..=args.drivers {
                let token = format!("driver-{}", n);
                let driver_id = DriverId::new();
                repository.insert(DriverRecord::new(driver_id, token.as_str(), args.balance));
                tokens.issue(token.as_str(), driver_id);
                info!("Seeded driver {} with token {}", driver_id, token);
            }
            tokens
        }
    };

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(
        &address,
        config,
        repository,
        Arc::new(tokens),
        Arc::new(SystemClock),
    )
    .await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
