//! Session entry and exit
//!
//! A session starts in two phases. [`SessionHandler::admit`] resolves the
//! driver, settles today's charge and either refuses synchronously or hands
//! back an [`Admission`]. Only then does the caller commit a connection to
//! [`Admission::run`], which registers the driver, starts both connection
//! paths and returns once the conduit has been closed.

use crate::auth::Authenticator;
use crate::billing::{settle_daily_charge, Charge, Clock};
use crate::conduit::Conduit;
use crate::config::ServerConfig;
use crate::connection::{read_path, write_path, ReadOutcome};
use crate::drivers::DriverRepository;
use crate::error::SessionError;
use crate::registry::{DriverPosition, Registry};
use crate::transport::{FrameReader, FrameWriter};
use log::{info, warn};
use shared::DriverId;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct SessionHandler {
    registry: Registry,
    repository: Arc<dyn DriverRepository>,
    authenticator: Arc<dyn Authenticator>,
    clock: Arc<dyn Clock>,
    daily_cost: i64,
    conduit_capacity: usize,
    // Serializes lookup -> debit -> save so reconnects cannot double charge
    billing: Mutex<()>,
}

impl SessionHandler {
    pub fn new(
        registry: Registry,
        repository: Arc<dyn DriverRepository>,
        authenticator: Arc<dyn Authenticator>,
        clock: Arc<dyn Clock>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            registry,
            repository,
            authenticator,
            clock,
            daily_cost: config.daily_cost,
            conduit_capacity: config.conduit_capacity,
            billing: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Authenticates `credential` and admits the driver behind it
    pub async fn admit(&self, credential: &str) -> Result<Admission, SessionError> {
        let driver_id = self
            .authenticator
            .authenticate(credential)
            .ok_or(SessionError::Unauthorized)?;

        self.admit_driver(driver_id).await
    }

    /// Admits an already authenticated driver, charging today if unpaid.
    ///
    /// Nothing is registered and nothing is debited when this fails.
    pub async fn admit_driver(&self, driver_id: DriverId) -> Result<Admission, SessionError> {
        let charge = {
            let _billing = self.billing.lock().await;
            let driver = self.repository.get_driver_by_id(&driver_id)?;
            settle_daily_charge(
                self.repository.as_ref(),
                &driver,
                self.clock.today(),
                self.daily_cost,
            )?
        };

        Ok(Admission {
            driver_id,
            charge,
            registry: self.registry.clone(),
            conduit_capacity: self.conduit_capacity,
        })
    }
}

/// A driver cleared to open a live session
#[derive(Debug)]
#[must_use = "an admission does nothing until run"]
pub struct Admission {
    driver_id: DriverId,
    charge: Charge,
    registry: Registry,
    conduit_capacity: usize,
}

impl Admission {
    pub fn driver_id(&self) -> DriverId {
        self.driver_id
    }

    pub fn charge(&self) -> Charge {
        self.charge
    }

    /// Runs the live session over `reader`/`writer` until it is closed.
    pub async fn run<R, W>(self, reader: R, writer: W) -> ReadOutcome
    where
        R: FrameReader,
        W: FrameWriter,
    {
        let driver_id = self.driver_id;
        let (conduit, outbox) = Conduit::new(driver_id, self.conduit_capacity);

        let replaced = self
            .registry
            .upsert(DriverPosition::registered(driver_id), Arc::clone(&conduit))
            .await;
        if let Some(previous) = replaced {
            if previous.close() {
                info!(
                    "Driver {} reconnected, closing previous session",
                    driver_id
                );
            }
        }

        info!("Driver {} started a live session", driver_id);

        let reader_task = tokio::spawn(read_path(
            reader,
            driver_id,
            Arc::clone(&conduit),
            self.registry.clone(),
        ));
        let writer_task = tokio::spawn(write_path(writer, outbox, Arc::clone(&conduit)));

        conduit.closed().await;

        let outcome = match reader_task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Read path of driver {} panicked: {}", driver_id, e);
                conduit.close();
                self.registry
                    .remove_if_current(&driver_id, conduit.id())
                    .await;
                ReadOutcome::TransportFailure
            }
        };
        if let Err(e) = writer_task.await {
            warn!("Write path of driver {} panicked: {}", driver_id, e);
        }

        info!("Driver {} session ended ({:?})", driver_id, outcome);
        outcome
    }
}
