//! TCP accept loop wiring the demo transport to sessions and the broadcaster

use crate::auth::Authenticator;
use crate::billing::Clock;
use crate::broadcast::Broadcaster;
use crate::config::ServerConfig;
use crate::drivers::DriverRepository;
use crate::error::SessionError;
use crate::registry::Registry;
use crate::session::SessionHandler;
use crate::transport::{tcp, FrameReader, FrameWriter};
use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

/// How long a new connection may take to present its credential
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Server {
    listener: TcpListener,
    sessions: Arc<SessionHandler>,
    registry: Registry,
    config: ServerConfig,
}

impl Server {
    pub async fn bind(
        addr: &str,
        config: ServerConfig,
        repository: Arc<dyn DriverRepository>,
        authenticator: Arc<dyn Authenticator>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;

        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let registry = Registry::new();
        let sessions = Arc::new(SessionHandler::new(
            registry.clone(),
            repository,
            authenticator,
            clock,
            &config,
        ));

        Ok(Server {
            listener,
            sessions,
            registry,
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    /// Starts the broadcaster and accepts drivers until the listener fails
    pub async fn run(self) -> io::Result<()> {
        let broadcaster = Broadcaster::new(self.registry.clone(), &self.config).spawn();

        let result = loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) if is_transient(&e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
                Err(e) => break Err(e),
            };

            debug!("Accepted connection from {}", addr);
            let sessions = Arc::clone(&self.sessions);
            tokio::spawn(async move {
                handle_connection(stream, addr, sessions).await;
            });
        };

        broadcaster.abort();
        result
    }
}

/// Reads the credential line, admits the driver and runs its session
async fn handle_connection(stream: TcpStream, addr: SocketAddr, sessions: Arc<SessionHandler>) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle for {}: {}", addr, e);
    }
    let (mut reader, mut writer) = tcp::split(stream);

    let credential = match timeout(HANDSHAKE_TIMEOUT, reader.read_frame()).await {
        Ok(Ok(Some(line))) => String::from_utf8_lossy(&line).into_owned(),
        Ok(Ok(None)) => {
            debug!("{} disconnected before authenticating", addr);
            return;
        }
        Ok(Err(e)) => {
            warn!("Handshake with {} failed: {}", addr, e);
            return;
        }
        Err(_) => {
            warn!("{} did not authenticate within {:?}", addr, HANDSHAKE_TIMEOUT);
            writer.shutdown().await;
            return;
        }
    };

    match sessions.admit(&credential).await {
        Ok(admission) => {
            info!(
                "Driver {} connected from {} ({:?})",
                admission.driver_id(),
                addr,
                admission.charge()
            );
            admission.run(reader, writer).await;
        }
        Err(e) => {
            info!("Refused {}: {}", addr, e);
            refuse(&mut writer, &e).await;
        }
    }
}

async fn refuse<W: FrameWriter>(writer: &mut W, err: &SessionError) {
    let body = serde_json::json!({
        "error": err.to_string(),
        "status": err.status_code(),
    });

    match serde_json::to_vec(&body) {
        Ok(line) => {
            if let Err(e) = writer.write_frame(&line).await {
                debug!("Could not deliver refusal: {}", e);
            }
        }
        Err(e) => error!("Failed to encode refusal: {}", e),
    }

    writer.shutdown().await;
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}
