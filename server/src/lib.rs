//! # Live Driver Registry Server
//!
//! This library keeps track of every taxi driver currently holding an open
//! live session, ingests their position reports, and periodically pushes a
//! snapshot of the whole live fleet to every connected driver. Drivers that
//! go silent are evicted and their connection is closed.
//!
//! ## Core Responsibilities
//!
//! ### Position Ingestion
//! Each connection has a read path that decodes position reports and stamps
//! them into the registry with the server's own receipt time. A malformed
//! report or a transport failure ends the session.
//!
//! ### Fleet Broadcasting
//! A single broadcaster ticks at a fixed interval, serializes one snapshot
//! of all live drivers, and offers the same payload to every conduit without
//! waiting on any of them. A driver that has not consumed the previous
//! snapshot simply misses the next one.
//!
//! ### Liveness
//! Drivers that have not reported for longer than the liveness threshold
//! are removed on the next tick and their conduit is closed, which tears
//! the session down from the server side.
//!
//! ### Session Admission
//! Before a connection is committed to a live session the driver is
//! authenticated, looked up, and charged the daily session fee if today has
//! not been paid yet. Refusals happen before any registry work.
//!
//! ## Architecture Design
//!
//! ### Shared Registry
//! The registry is an instance-owned `Arc<Mutex<HashMap>>` handle. Writers
//! (read paths, session teardown, eviction) and the broadcaster copy-out
//! snapshot never hold the lock across I/O.
//!
//! ### Conduits
//! Every session owns a conduit: a bounded outbound queue plus a close
//! signal. Any party may close it; only the first close takes effect. Each
//! conduit carries a unique id so that a superseded session's teardown
//! cannot remove the entry of the session that replaced it.
//!
//! ### Transport Neutrality
//! Sessions talk to [`transport::FrameReader`] and [`transport::FrameWriter`].
//! An in-process channel transport backs the tests, and a newline-delimited
//! TCP transport backs the demo binary.
//!
//! ## Module Organization
//!
//! - `registry`: connected drivers and their last known position
//! - `conduit`: per-session outbound queue and close signal
//! - `broadcast`: periodic snapshot fan-out and liveness eviction
//! - `connection`: the read and write paths of one connection
//! - `session`: admission, billing and session lifetime
//! - `billing`, `drivers`, `auth`: collaborators behind traits
//! - `transport`, `network`: frame traits, adapters and the TCP accept loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::auth::StaticTokens;
//! use server::billing::SystemClock;
//! use server::config::ServerConfig;
//! use server::drivers::InMemoryDriverRepository;
//! use server::network::Server;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(
//!         "127.0.0.1:8080",
//!         ServerConfig::default(),
//!         Arc::new(InMemoryDriverRepository::new()),
//!         Arc::new(StaticTokens::new()),
//!         Arc::new(SystemClock),
//!     )
//!     .await?;
//!
//!     // Broadcasts every 2 s and evicts drivers silent for more than 5 s
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod billing;
pub mod broadcast;
pub mod conduit;
pub mod config;
pub mod connection;
pub mod drivers;
pub mod error;
pub mod network;
pub mod registry;
pub mod session;
pub mod transport;
