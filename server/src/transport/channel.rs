//! In-process duplex transport built on unbounded tokio channels

use super::{FrameReader, FrameWriter};
use crate::error::TransportError;
use shared::{decode_snapshot, encode_report, CodecError, Coordinates, SnapshotEntry};
use std::io;
use tokio::sync::mpsc;

/// Server half: what a session reads from and writes to
#[derive(Debug)]
pub struct ChannelReader {
    inbound: mpsc::UnboundedReceiver<io::Result<Vec<u8>>>,
}

#[derive(Debug)]
pub struct ChannelWriter {
    outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

/// Driver half: plays the part of the remote device
#[derive(Debug)]
pub struct DriverEnd {
    to_server: Option<mpsc::UnboundedSender<io::Result<Vec<u8>>>>,
    from_server: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// Creates a connected pair of server and driver halves
pub fn pair() -> (ChannelReader, ChannelWriter, DriverEnd) {
    let (to_server, inbound) = mpsc::unbounded_channel();
    let (outbound, from_server) = mpsc::unbounded_channel();

    (
        ChannelReader { inbound },
        ChannelWriter {
            outbound: Some(outbound),
        },
        DriverEnd {
            to_server: Some(to_server),
            from_server,
        },
    )
}

impl FrameReader for ChannelReader {
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.inbound.recv().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) => Err(TransportError::Abnormal(e)),
            None => Ok(None),
        }
    }
}

impl FrameWriter for ChannelWriter {
    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let outbound = self.outbound.as_ref().ok_or(TransportError::Closed)?;
        outbound
            .send(frame.to_vec())
            .map_err(|_| TransportError::Closed)
    }

    async fn shutdown(&mut self) {
        self.outbound = None;
    }
}

impl DriverEnd {
    pub fn send_raw(&self, frame: impl Into<Vec<u8>>) -> bool {
        match &self.to_server {
            Some(tx) => tx.send(Ok(frame.into())).is_ok(),
            None => false,
        }
    }

    pub fn send_position(&self, coordinates: Coordinates) -> Result<bool, CodecError> {
        Ok(self.send_raw(encode_report(coordinates)?))
    }

    /// Simulates the connection dropping with an I/O error
    pub fn fail(&mut self, kind: io::ErrorKind) {
        if let Some(tx) = self.to_server.take() {
            let _ = tx.send(Err(io::Error::new(kind, "simulated transport failure")));
        }
    }

    /// Closes the driver-to-server direction in an orderly way
    pub fn hang_up(&mut self) {
        self.to_server = None;
    }

    /// Next snapshot; None once the server closed its side
    pub async fn recv_snapshot(&mut self) -> Option<Result<Vec<SnapshotEntry>, CodecError>> {
        let frame = self.from_server.recv().await?;
        Some(decode_snapshot(&frame))
    }

    /// Next raw frame; None once the server closed its side
    pub async fn recv_raw(&mut self) -> Option<Vec<u8>> {
        self.from_server.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (mut reader, mut writer, mut driver) = pair();

        assert!(driver.send_raw(b"hello".to_vec()));
        assert_eq!(reader.read_frame().await.unwrap(), Some(b"hello".to_vec()));

        writer.write_frame(b"[]").await.unwrap();
        let snapshot = driver.recv_snapshot().await.unwrap().unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_hang_up_is_orderly_close() {
        let (mut reader, _writer, mut driver) = pair();
        driver.hang_up();
        assert_eq!(reader.read_frame().await.unwrap(), None);
        assert!(!driver.send_raw(b"late".to_vec()));
    }

    #[tokio::test]
    async fn test_fail_is_abnormal_close() {
        let (mut reader, _writer, mut driver) = pair();
        driver.fail(io::ErrorKind::ConnectionReset);

        let err = reader.read_frame().await.unwrap_err();
        assert!(!err.is_expected_closure());
        assert_eq!(reader.read_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_shutdown_ends_driver_stream() {
        let (_reader, mut writer, mut driver) = pair();
        writer.shutdown().await;

        assert!(driver.recv_raw().await.is_none());
        assert!(matches!(
            writer.write_frame(b"[]").await,
            Err(TransportError::Closed)
        ));
    }
}
