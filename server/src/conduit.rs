//! Per-connection hand-off point between the broadcast loop and one driver.
//!
//! A conduit carries snapshot payloads towards a single connection and owns
//! the close signal shared by that connection's read and write paths. The
//! outbound side is bounded so the broadcaster never waits on a slow driver.

use log::debug;
use shared::DriverId;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Serialized snapshot, encoded once per tick and shared by every recipient.
pub type Payload = Arc<[u8]>;

static NEXT_CONDUIT_ID: AtomicU64 = AtomicU64::new(1);

/// Outcome of a non-blocking delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The previous payload has not been consumed yet; this one is dropped.
    Full,
    Closed,
}

#[derive(Debug)]
pub struct Conduit {
    id: u64,
    driver_id: DriverId,
    outbound: mpsc::Sender<Payload>,
    close_signal: CancellationToken,
    closed: AtomicBool,
}

/// Receiving half of a conduit, owned by the connection's write path.
#[derive(Debug)]
pub struct Outbox {
    inbound: mpsc::Receiver<Payload>,
    close_signal: CancellationToken,
}

impl Conduit {
    /// Creates a conduit whose outbound path holds at most `capacity` payloads
    pub fn new(driver_id: DriverId, capacity: usize) -> (Arc<Self>, Outbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let close_signal = CancellationToken::new();

        let conduit = Arc::new(Self {
            id: NEXT_CONDUIT_ID.fetch_add(1, Ordering::Relaxed),
            driver_id,
            outbound: tx,
            close_signal: close_signal.clone(),
            closed: AtomicBool::new(false),
        });

        let outbox = Outbox {
            inbound: rx,
            close_signal,
        };

        (conduit, outbox)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn driver_id(&self) -> DriverId {
        self.driver_id
    }

    /// Attempts to hand a payload to the connection without waiting.
    pub fn deliver(&self, payload: Payload) -> Delivery {
        if self.is_closed() {
            return Delivery::Closed;
        }

        match self.outbound.try_send(payload) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Asserts the close signal.
    ///
    /// Returns true only for the call that performed the open -> closed
    /// transition. Later calls are no-ops.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        debug!("Closing conduit {} of driver {}", self.id, self.driver_id);
        self.close_signal.cancel();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.outbound.is_closed()
    }

    /// Resolves once the conduit has been closed by anyone.
    pub async fn closed(&self) {
        self.close_signal.cancelled().await
    }

    /// Token that fires with the close signal, for tasks that outlive a borrow.
    pub fn close_token(&self) -> CancellationToken {
        self.close_signal.clone()
    }
}

impl Outbox {
    /// Waits for the next payload; None once the conduit is closed.
    pub async fn next(&mut self) -> Option<Payload> {
        tokio::select! {
            biased;
            _ = self.close_signal.cancelled() => None,
            payload = self.inbound.recv() => payload,
        }
    }

    pub fn try_next(&mut self) -> Option<Payload> {
        if self.close_signal.is_cancelled() {
            return None;
        }
        self.inbound.try_recv().ok()
    }
}
