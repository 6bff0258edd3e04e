//! Simulated driver that wanders around a starting point

use crate::network::{connect, ClientError, ReportSink, SnapshotStream};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Coordinates, MAX_LATITUDE, MAX_LONGITUDE};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Random walk over latitude/longitude, clamped to valid ranges
pub struct RandomWalk {
    position: Coordinates,
    step: f64,
    rng: StdRng,
}

impl RandomWalk {
    pub fn new(start: Coordinates, step: f64) -> Self {
        Self {
            position: start,
            step,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(start: Coordinates, step: f64, seed: u64) -> Self {
        Self {
            position: start,
            step,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn position(&self) -> Coordinates {
        self.position
    }

    /// Moves by at most `step` degrees on each axis and returns the new fix
    pub fn advance(&mut self) -> Coordinates {
        if self.step > 0.0 {
            let dlat = self.rng.gen_range(-self.step..=self.step);
            let dlon = self.rng.gen_range(-self.step..=self.step);
            self.position = Coordinates {
                latitude: (self.position.latitude + dlat).clamp(-MAX_LATITUDE, MAX_LATITUDE),
                longitude: (self.position.longitude + dlon).clamp(-MAX_LONGITUDE, MAX_LONGITUDE),
            };
        }
        self.position
    }
}

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub server: String,
    pub token: String,
    pub start: Coordinates,
    pub step: f64,
    pub report_interval: Duration,
    /// Stop reporting after this many fixes, keeping the connection open
    pub silent_after: Option<u64>,
    /// End the run after this many snapshots
    pub max_snapshots: Option<u64>,
}

/// What a finished run observed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub reports_sent: u64,
    pub snapshots_received: u64,
    /// The server ended the session (eviction or shutdown)
    pub closed_by_server: bool,
}

/// Connects, reports on a timer and logs every snapshot until the run ends
pub async fn run(config: SimulatorConfig, mut walk: RandomWalk) -> Result<RunSummary, ClientError> {
    let (mut snapshots, mut sink) = connect(&config.server, &config.token).await?;
    info!("Connected to {} as {}", config.server, config.token);

    let summary = drive(&config, &mut walk, &mut snapshots, &mut sink).await;
    sink.close().await;
    summary
}

async fn drive(
    config: &SimulatorConfig,
    walk: &mut RandomWalk,
    snapshots: &mut SnapshotStream,
    sink: &mut ReportSink,
) -> Result<RunSummary, ClientError> {
    let mut summary = RunSummary::default();
    let mut timer = interval(config.report_interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = timer.tick() => {
                if config.silent_after.is_some_and(|limit| summary.reports_sent >= limit) {
                    continue;
                }

                let fix = walk.advance();
                sink.send_position(fix).await?;
                summary.reports_sent += 1;
                debug!("Reported ({:.5}, {:.5})", fix.latitude, fix.longitude);

                if config.silent_after == Some(summary.reports_sent) {
                    warn!("Going silent after {} reports", summary.reports_sent);
                }
            }
            snapshot = snapshots.next_snapshot() => {
                match snapshot? {
                    Some(entries) => {
                        summary.snapshots_received += 1;
                        info!("Snapshot with {} drivers", entries.len());
                        for entry in &entries {
                            debug!(
                                "  {} at ({:.5}, {:.5})",
                                entry.id, entry.latitude, entry.longitude
                            );
                        }

                        if config.max_snapshots.is_some_and(|max| summary.snapshots_received >= max) {
                            return Ok(summary);
                        }
                    }
                    None => {
                        info!("Server closed the session");
                        summary.closed_by_server = true;
                        return Ok(summary);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    #[test]
    fn test_walk_moves_within_step() {
        let start = Coordinates::new(45.0, 7.0).unwrap();
        let mut walk = RandomWalk::seeded(start, 0.001, 7);

        let mut previous = walk.position();
        for _ in 0..100 {
            let next = walk.advance();
            assert!((next.latitude - previous.latitude).abs() <= 0.001 + 1e-9);
            assert!((next.longitude - previous.longitude).abs() <= 0.001 + 1e-9);
            previous = next;
        }
    }

    #[test]
    fn test_walk_stays_in_range() {
        let start = Coordinates::new(89.9, 179.9).unwrap();
        let mut walk = RandomWalk::seeded(start, 5.0, 1);

        for _ in 0..1000 {
            let fix = walk.advance();
            assert!(Coordinates::new(fix.latitude, fix.longitude).is_ok());
        }
    }

    #[test]
    fn test_zero_step_stays_put() {
        let start = Coordinates::new(10.0, 20.0).unwrap();
        let mut walk = RandomWalk::seeded(start, 0.0, 3);
        let fix = walk.advance();
        assert_approx_eq!(fix.latitude, 10.0);
        assert_approx_eq!(fix.longitude, 20.0);
    }

    #[tokio::test]
    async fn test_silent_driver_stops_reporting_until_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        // Fake server: count reports, send one snapshot, then hang up
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();

            assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("token"));
            let mut reports = 0;
            while reports < 2 {
                if lines.next_line().await.unwrap().is_some() {
                    reports += 1;
                }
            }
            write.write_all(b"[]\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            write.shutdown().await.unwrap();
            reports
        });

        let config = SimulatorConfig {
            server: addr,
            token: "token".to_string(),
            start: Coordinates::new(0.0, 0.0).unwrap(),
            step: 0.0001,
            report_interval: Duration::from_millis(10),
            silent_after: Some(2),
            max_snapshots: None,
        };
        let walk = RandomWalk::seeded(config.start, config.step, 42);

        let summary = tokio::time::timeout(Duration::from_secs(2), run(config, walk))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(server.await.unwrap(), 2);
        assert_eq!(summary.reports_sent, 2);
        assert_eq!(summary.snapshots_received, 1);
        assert!(summary.closed_by_server);
    }
}
