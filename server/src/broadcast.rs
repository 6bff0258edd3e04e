//! Periodic fan-out of the fleet snapshot and liveness eviction
//!
//! One broadcaster runs per registry for the lifetime of the process. On
//! every tick it copies the registry, serializes one payload, and offers it
//! to every live conduit without waiting. Drivers silent for longer than
//! the liveness threshold are evicted and their conduit is closed. The
//! broadcaster is the only component that makes eviction decisions.

use crate::conduit::{Delivery, Payload};
use crate::config::ServerConfig;
use crate::registry::Registry;
use log::{debug, error, info};
use shared::{encode_snapshot, SnapshotEntry};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Drivers included in the payload
    pub broadcast: usize,
    pub delivered: usize,
    /// Drivers whose previous snapshot was still unread
    pub dropped: usize,
    pub evicted: usize,
}

pub struct Broadcaster {
    registry: Registry,
    interval: Duration,
    liveness_threshold: Duration,
    stats_every_ticks: u64,
    ticks: u64,
    total_evicted: u64,
}

impl Broadcaster {
    pub fn new(registry: Registry, config: &ServerConfig) -> Self {
        Self {
            registry,
            interval: config.broadcast_interval,
            liveness_threshold: config.liveness_threshold,
            stats_every_ticks: config.stats_every_ticks,
            ticks: 0,
            total_evicted: 0,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Ticks forever at the configured interval
    pub async fn run(mut self) {
        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip the first tick since it fires immediately
        timer.tick().await;

        info!(
            "Broadcasting every {:?}, evicting after {:?} of silence",
            self.interval, self.liveness_threshold
        );

        loop {
            timer.tick().await;
            self.tick(Instant::now()).await;
        }
    }

    /// Runs one broadcast round as of `now`
    pub async fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();
        self.ticks += 1;

        let snapshot = self.registry.snapshot().await;

        let threshold = self.liveness_threshold;
        let entries: Vec<SnapshotEntry> = snapshot
            .iter()
            .filter(|e| !e.position.is_stale(now, threshold) && !e.conduit.is_closed())
            .filter_map(|e| e.snapshot_entry())
            .collect();
        report.broadcast = entries.len();

        let payload: Payload = match encode_snapshot(&entries) {
            Ok(bytes) => Arc::from(bytes),
            Err(e) => {
                error!("Failed to encode snapshot: {}", e);
                return report;
            }
        };

        for entry in &snapshot {
            let driver_id = entry.driver_id();

            if entry.position.is_stale(now, self.liveness_threshold) || entry.conduit.is_closed() {
                match self
                    .registry
                    .remove_if_stale(&driver_id, now, self.liveness_threshold)
                    .await
                {
                    Some(conduit) => {
                        conduit.close();
                        report.evicted += 1;
                        info!(
                            "Evicted driver {} after {:?} without a report",
                            driver_id,
                            entry.position.staleness(now)
                        );
                        continue;
                    }
                    // A fresh report landed after the snapshot was taken
                    None => {
                        if !self.registry.contains(&driver_id).await {
                            continue;
                        }
                    }
                }
            }

            match entry.conduit.deliver(Arc::clone(&payload)) {
                Delivery::Delivered => report.delivered += 1,
                Delivery::Full => {
                    report.dropped += 1;
                    debug!("Driver {} has not read the last snapshot", driver_id);
                }
                Delivery::Closed => {}
            }
        }

        self.total_evicted += report.evicted as u64;

        if self.stats_every_ticks > 0 && self.ticks % self.stats_every_ticks == 0 {
            debug!(
                "Tick {}: {} drivers connected, {} broadcast, {} evicted in total",
                self.ticks,
                snapshot.len() - report.evicted,
                report.broadcast,
                self.total_evicted
            );
        }

        report
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
