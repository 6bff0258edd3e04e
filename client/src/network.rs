//! Line-framed TCP connection to the dispatch server

use log::debug;
use shared::{decode_snapshot, encode_report, CodecError, Coordinates, SnapshotEntry};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("server refused the session ({status}): {message}")]
    Refused { status: u16, message: String },
    #[error("unexpected frame from server: {0}")]
    UnexpectedFrame(String),
}

/// Anything the server can send down a driver connection
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Snapshot(Vec<SnapshotEntry>),
    Refused { status: u16, message: String },
}

impl ServerMessage {
    pub fn parse(line: &str) -> Result<Self, ClientError> {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            return Ok(ServerMessage::Snapshot(decode_snapshot(trimmed.as_bytes())?));
        }

        let value: serde_json::Value = serde_json::from_str(trimmed)
            .map_err(|_| ClientError::UnexpectedFrame(trimmed.to_string()))?;
        match value.get("error").and_then(|e| e.as_str()) {
            Some(message) => Ok(ServerMessage::Refused {
                status: value
                    .get("status")
                    .and_then(|s| s.as_u64())
                    .and_then(|s| u16::try_from(s).ok())
                    .unwrap_or(0),
                message: message.to_string(),
            }),
            None => Err(ClientError::UnexpectedFrame(trimmed.to_string())),
        }
    }
}

/// Receiving half: snapshots pushed by the server
pub struct SnapshotStream {
    lines: Lines<BufReader<OwnedReadHalf>>,
}

/// Sending half: position reports
pub struct ReportSink {
    writer: OwnedWriteHalf,
}

/// Connects to `addr` and presents `token` as the first line.
pub async fn connect(addr: &str, token: &str) -> Result<(SnapshotStream, ReportSink), ClientError> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    let (read, write) = stream.into_split();

    let mut sink = ReportSink { writer: write };
    sink.write_line(token.as_bytes()).await?;
    debug!("Sent credential to {}", addr);

    Ok((
        SnapshotStream {
            lines: BufReader::new(read).lines(),
        },
        sink,
    ))
}

impl SnapshotStream {
    /// Next snapshot; Ok(None) once the server closed the connection.
    ///
    /// A refusal line is turned into [`ClientError::Refused`].
    pub async fn next_snapshot(&mut self) -> Result<Option<Vec<SnapshotEntry>>, ClientError> {
        loop {
            let line = match self.lines.next_line().await? {
                Some(line) => line,
                None => return Ok(None),
            };
            if line.trim().is_empty() {
                continue;
            }

            return match ServerMessage::parse(&line)? {
                ServerMessage::Snapshot(entries) => Ok(Some(entries)),
                ServerMessage::Refused { status, message } => {
                    Err(ClientError::Refused { status, message })
                }
            };
        }
    }
}

impl ReportSink {
    pub async fn send_position(&mut self, coordinates: Coordinates) -> Result<(), ClientError> {
        let frame = encode_report(coordinates)?;
        self.write_line(&frame).await
    }

    pub async fn close(&mut self) {
        let _ = self.writer.shutdown().await;
    }

    async fn write_line(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        let mut line = Vec::with_capacity(bytes.len() + 1);
        line.extend_from_slice(bytes);
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::DriverId;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_snapshot_line() {
        let id = DriverId::new();
        let line = format!("[{{\"id\":\"{}\",\"latitude\":1.5,\"longitude\":-2.0}}]", id);

        match ServerMessage::parse(&line).unwrap() {
            ServerMessage::Snapshot(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].id, id);
            }
            other => panic!("unexpected message {:?}", other),
        }
        assert_eq!(
            ServerMessage::parse("[]").unwrap(),
            ServerMessage::Snapshot(Vec::new())
        );
    }

    #[test]
    fn test_parse_refusal_line() {
        let message =
            ServerMessage::parse("{\"error\":\"insufficient funds\",\"status\":402}").unwrap();
        assert_eq!(
            message,
            ServerMessage::Refused {
                status: 402,
                message: "insufficient funds".to_string()
            }
        );
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            ServerMessage::parse("hello"),
            Err(ClientError::UnexpectedFrame(_))
        ));
        assert!(matches!(
            ServerMessage::parse("{\"ok\":true}"),
            Err(ClientError::UnexpectedFrame(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_sends_token_then_reports() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = String::new();
            socket.read_to_string(&mut received).await.unwrap();
            received
        });

        let (_stream, mut sink) = connect(&addr, "driver-1").await.unwrap();
        sink.send_position(Coordinates::new(10.0, 20.0).unwrap())
            .await
            .unwrap();
        sink.close().await;

        let received = server.await.unwrap();
        let mut lines = received.lines();
        assert_eq!(lines.next(), Some("driver-1"));
        let report: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(report["latitude"], 10.0);
        assert_eq!(report["longitude"], 20.0);
    }

    #[tokio::test]
    async fn test_refusal_surfaces_as_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"{\"error\":\"unauthorized\",\"status\":401}\n")
                .await
                .unwrap();
        });

        let (mut stream, _sink) = connect(&addr, "nope").await.unwrap();
        let err = stream.next_snapshot().await.unwrap_err();
        assert!(matches!(err, ClientError::Refused { status: 401, .. }));
    }
}
