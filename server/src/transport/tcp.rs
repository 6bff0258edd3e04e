//! Newline-delimited frames over TCP, used by the demo server and simulator

use super::{FrameReader, FrameWriter};
use crate::error::TransportError;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Longest accepted frame, newline excluded
pub const MAX_FRAME_LEN: usize = 64 * 1024;

pub struct TcpFrameReader {
    inner: BufReader<OwnedReadHalf>,
    buffer: Vec<u8>,
}

pub struct TcpFrameWriter {
    inner: OwnedWriteHalf,
}

pub fn split(stream: TcpStream) -> (TcpFrameReader, TcpFrameWriter) {
    let (read, write) = stream.into_split();
    (
        TcpFrameReader {
            inner: BufReader::new(read),
            buffer: Vec::with_capacity(256),
        },
        TcpFrameWriter { inner: write },
    )
}

impl FrameReader for TcpFrameReader {
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            self.buffer.clear();
            let limit = (MAX_FRAME_LEN + 2) as u64;
            let read = (&mut self.inner)
                .take(limit)
                .read_until(b'\n', &mut self.buffer)
                .await?;

            if read == 0 {
                return Ok(None);
            }

            while matches!(self.buffer.last(), Some(b'\n' | b'\r')) {
                self.buffer.pop();
            }

            if self.buffer.len() > MAX_FRAME_LEN {
                return Err(TransportError::Abnormal(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "frame too large",
                )));
            }

            // Blank lines are keepalives
            if !self.buffer.is_empty() {
                return Ok(Some(self.buffer.clone()));
            }
        }
    }
}

impl FrameWriter for TcpFrameWriter {
    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let mut line = Vec::with_capacity(frame.len() + 1);
        line.extend_from_slice(frame);
        line.push(b'\n');

        self.inner.write_all(&line).await?;
        self.inner.flush().await?;
        Ok(())
    }

    async fn shutdown(&mut self) {
        let _ = self.inner.shutdown().await;
    }
}
