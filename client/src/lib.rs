//! # Driver Simulator Library
//!
//! A stand-in for a driver's phone. It connects to the dispatch server over
//! the demo TCP transport, presents a bearer token, then reports a position
//! on a fixed timer while logging every fleet snapshot the server pushes.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! Line-framed connection handling:
//! - Sending the credential line and position reports
//! - Parsing snapshots and refusal lines sent by the server
//!
//! ### Simulator Module (`simulator`)
//! The reporting loop and a clamped random walk that produces positions.
//! A simulator can be told to go silent after a number of reports, which is
//! the easiest way to watch the server evict a driver.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::simulator::{run, RandomWalk, SimulatorConfig};
//! use shared::Coordinates;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let start = Coordinates::new(45.4642, 9.19)?;
//!     let config = SimulatorConfig {
//!         server: "127.0.0.1:8080".to_string(),
//!         token: "driver-1".to_string(),
//!         start,
//!         step: 0.0005,
//!         report_interval: Duration::from_secs(1),
//!         silent_after: None,
//!         max_snapshots: Some(10),
//!     };
//!
//!     let summary = run(config, RandomWalk::new(start, 0.0005)).await?;
//!     println!("{:?}", summary);
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod simulator;
