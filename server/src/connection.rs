//! Read and write paths of one driver connection
//!
//! The read path decodes position reports and stamps them into the registry
//! with the server's receipt time. The write path drains the conduit's
//! outbox onto the transport. Either path ending asserts the conduit's close
//! signal, which stops the other one.

use crate::conduit::{Conduit, Outbox};
use crate::registry::{DriverPosition, Registry};
use crate::transport::{FrameReader, FrameWriter};
use log::{debug, info, warn};
use shared::{decode_report, DriverId};
use std::sync::Arc;

/// Why a read path stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The conduit was closed elsewhere (eviction, write failure, reconnect)
    Closed,
    /// The driver closed the connection in an orderly way
    HungUp,
    Malformed,
    TransportFailure,
}

/// Ingests reports until the connection ends, then tears the session down.
pub async fn read_path<R: FrameReader>(
    mut reader: R,
    driver_id: DriverId,
    conduit: Arc<Conduit>,
    registry: Registry,
) -> ReadOutcome {
    let mut reports: u64 = 0;

    let outcome = loop {
        let frame = tokio::select! {
            biased;
            _ = conduit.closed() => break ReadOutcome::Closed,
            frame = reader.read_frame() => frame,
        };

        match frame {
            Ok(Some(bytes)) => match decode_report(&bytes) {
                Ok(coordinates) => {
                    let position = DriverPosition::reported(driver_id, coordinates);
                    if !registry.update_if_current(position, &conduit).await {
                        break ReadOutcome::Closed;
                    }
                    reports += 1;
                }
                Err(e) => {
                    warn!("Malformed report from driver {}: {}", driver_id, e);
                    break ReadOutcome::Malformed;
                }
            },
            Ok(None) => break ReadOutcome::HungUp,
            Err(e) if e.is_expected_closure() => break ReadOutcome::HungUp,
            Err(e) => {
                warn!("Connection of driver {} failed: {}", driver_id, e);
                break ReadOutcome::TransportFailure;
            }
        }
    };

    debug!(
        "Read path of driver {} ended ({:?}) after {} reports",
        driver_id, outcome, reports
    );

    conduit.close();
    registry.remove_if_current(&driver_id, conduit.id()).await;

    outcome
}

/// Forwards snapshots to the connection until the conduit closes.
pub async fn write_path<W: FrameWriter>(mut writer: W, mut outbox: Outbox, conduit: Arc<Conduit>) {
    while let Some(payload) = outbox.next().await {
        let result = tokio::select! {
            biased;
            _ = conduit.closed() => break,
            result = writer.write_frame(&payload) => result,
        };

        if let Err(e) = result {
            info!(
                "Stopped sending to driver {}: {}",
                conduit.driver_id(),
                e
            );
            break;
        }
    }

    conduit.close();
    writer.shutdown().await;
}
