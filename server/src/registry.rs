//! Shared store of currently connected drivers
//!
//! The registry maps each driver identity to its last known position, the
//! server-side time that position arrived, and the conduit of the session
//! that owns it. Every mutation and the copy step of a snapshot run under a
//! single instance-owned mutex, so a snapshot never observes a half-written
//! entry and eviction never races with iteration.
//!
//! Handles are cheap to clone and all clones share the same map.

use crate::conduit::Conduit;
use log::{debug, info};
use shared::{Coordinates, DriverId, SnapshotEntry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Last known state of one driver, stamped with the server's receipt time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverPosition {
    pub driver_id: DriverId,
    /// None until the driver sends its first report.
    pub coordinates: Option<Coordinates>,
    pub received_at: Instant,
}

impl DriverPosition {
    /// Position of a driver who has just been admitted and not reported yet
    pub fn registered(driver_id: DriverId) -> Self {
        Self {
            driver_id,
            coordinates: None,
            received_at: Instant::now(),
        }
    }

    /// Position carried by a report that arrived just now
    pub fn reported(driver_id: DriverId, coordinates: Coordinates) -> Self {
        Self {
            driver_id,
            coordinates: Some(coordinates),
            received_at: Instant::now(),
        }
    }

    /// Time elapsed between receipt and `now`, zero if the receipt is newer
    pub fn staleness(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.received_at)
    }

    pub fn is_stale(&self, now: Instant, threshold: Duration) -> bool {
        self.staleness(now) > threshold
    }
}

/// Registry entry: a position plus the conduit of the owning session
#[derive(Debug, Clone)]
pub struct ConnectedDriver {
    pub position: DriverPosition,
    pub conduit: Arc<Conduit>,
}

impl ConnectedDriver {
    pub fn driver_id(&self) -> DriverId {
        self.position.driver_id
    }

    /// Broadcast view of this entry; the receipt time stays server-side.
    pub fn snapshot_entry(&self) -> Option<SnapshotEntry> {
        self.position
            .coordinates
            .map(|coordinates| SnapshotEntry::new(self.position.driver_id, coordinates))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    drivers: Arc<Mutex<HashMap<DriverId, ConnectedDriver>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the entry for `position.driver_id`.
    ///
    /// Returns the conduit of the replaced entry when it belonged to a
    /// different session. That conduit is not closed here.
    pub async fn upsert(
        &self,
        position: DriverPosition,
        conduit: Arc<Conduit>,
    ) -> Option<Arc<Conduit>> {
        let driver_id = position.driver_id;
        let conduit_id = conduit.id();
        let mut drivers = self.drivers.lock().await;

        let previous = drivers.insert(driver_id, ConnectedDriver { position, conduit });

        match previous {
            Some(old) if old.conduit.id() != conduit_id => {
                debug!(
                    "Driver {} replaced conduit {} with {}",
                    driver_id,
                    old.conduit.id(),
                    conduit_id
                );
                Some(old.conduit)
            }
            _ => None,
        }
    }

    /// Stores a report from the session owning `conduit`.
    ///
    /// Writes only while `conduit` is open and the entry is absent or still
    /// belongs to it, all under one lock acquisition. Returns false when the
    /// session has been superseded or closed; nothing is written then.
    pub async fn update_if_current(
        &self,
        position: DriverPosition,
        conduit: &Arc<Conduit>,
    ) -> bool {
        let mut drivers = self.drivers.lock().await;

        if conduit.is_closed() {
            return false;
        }

        let owned = drivers
            .get(&position.driver_id)
            .map_or(true, |entry| entry.conduit.id() == conduit.id());

        if owned {
            drivers.insert(
                position.driver_id,
                ConnectedDriver {
                    position,
                    conduit: Arc::clone(conduit),
                },
            );
        }
        owned
    }

    /// Point-in-time copy of every entry, iterable without holding the lock
    pub async fn snapshot(&self) -> Vec<ConnectedDriver> {
        let drivers = self.drivers.lock().await;
        drivers.values().cloned().collect()
    }

    /// Deletes the entry if present. Removing an absent driver is a no-op.
    pub async fn remove(&self, driver_id: &DriverId) -> bool {
        let removed = self.drivers.lock().await.remove(driver_id);
        if removed.is_some() {
            info!("Driver {} left the registry", driver_id);
        }
        removed.is_some()
    }

    /// Deletes the entry only while it still belongs to `conduit_id`.
    ///
    /// Used by session teardown so a superseded session cannot remove the
    /// entry of the session that replaced it.
    pub async fn remove_if_current(&self, driver_id: &DriverId, conduit_id: u64) -> bool {
        let mut drivers = self.drivers.lock().await;

        let is_current = drivers
            .get(driver_id)
            .is_some_and(|entry| entry.conduit.id() == conduit_id);

        if is_current {
            drivers.remove(driver_id);
            info!("Driver {} left the registry", driver_id);
        }
        is_current
    }

    /// Deletes the entry if it is still stale at the moment of removal.
    ///
    /// The staleness check is repeated under the lock against the latest
    /// upserted value, so a report that landed after the caller's snapshot
    /// keeps the driver alive. Returns the evicted conduit, still open.
    pub async fn remove_if_stale(
        &self,
        driver_id: &DriverId,
        now: Instant,
        threshold: Duration,
    ) -> Option<Arc<Conduit>> {
        let mut drivers = self.drivers.lock().await;

        let stale = drivers.get(driver_id).is_some_and(|entry| {
            entry.position.is_stale(now, threshold) || entry.conduit.is_closed()
        });

        if stale {
            drivers.remove(driver_id).map(|entry| entry.conduit)
        } else {
            None
        }
    }

    pub async fn get(&self, driver_id: &DriverId) -> Option<ConnectedDriver> {
        self.drivers.lock().await.get(driver_id).cloned()
    }

    pub async fn contains(&self, driver_id: &DriverId) -> bool {
        self.drivers.lock().await.contains_key(driver_id)
    }

    pub async fn len(&self) -> usize {
        self.drivers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.drivers.lock().await.is_empty()
    }
}
