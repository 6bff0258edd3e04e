//! Driver accounts as seen by the live tracking engine
//!
//! Persistence of drivers belongs to the wider dispatch backend. The engine
//! only needs to look a driver up and save it back after a debit, which is
//! what [`DriverRepository`] captures. [`InMemoryDriverRepository`] backs the
//! demo server and the tests.

use crate::error::RepositoryError;
use chrono::NaiveDate;
use parking_lot::Mutex;
use shared::DriverId;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverRecord {
    id: DriverId,
    name: String,
    balance: i64,
    last_paid_date: Option<NaiveDate>,
}

impl DriverRecord {
    pub fn new(id: DriverId, name: impl Into<String>, balance: i64) -> Self {
        Self {
            id,
            name: name.into(),
            balance,
            last_paid_date: None,
        }
    }

    pub fn with_last_paid_date(mut self, date: NaiveDate) -> Self {
        self.last_paid_date = Some(date);
        self
    }

    pub fn id(&self) -> DriverId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn last_paid_date(&self) -> Option<NaiveDate> {
        self.last_paid_date
    }

    /// Debits `amount`, leaving the balance untouched when it is too low.
    pub fn reduce_balance(&mut self, amount: i64) -> Result<(), InsufficientBalance> {
        if self.balance < amount {
            return Err(InsufficientBalance {
                balance: self.balance,
                requested: amount,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    pub fn increase_balance(&mut self, amount: i64) {
        self.balance += amount;
    }

    pub fn mark_paid(&mut self, date: NaiveDate) {
        self.last_paid_date = Some(date);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsufficientBalance {
    pub balance: i64,
    pub requested: i64,
}

/// Persistence operations the engine consumes
pub trait DriverRepository: Send + Sync {
    fn get_driver_by_id(&self, id: &DriverId) -> Result<DriverRecord, RepositoryError>;

    fn save_driver(&self, driver: &DriverRecord) -> Result<(), RepositoryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryDriverRepository {
    drivers: Mutex<HashMap<DriverId, DriverRecord>>,
}

impl InMemoryDriverRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, driver: DriverRecord) {
        self.drivers.lock().insert(driver.id(), driver);
    }

    pub fn len(&self) -> usize {
        self.drivers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.lock().is_empty()
    }
}

impl DriverRepository for InMemoryDriverRepository {
    fn get_driver_by_id(&self, id: &DriverId) -> Result<DriverRecord, RepositoryError> {
        self.drivers
            .lock()
            .get(id)
            .cloned()
            .ok_or(RepositoryError::NotFound(*id))
    }

    fn save_driver(&self, driver: &DriverRecord) -> Result<(), RepositoryError> {
        let mut drivers = self.drivers.lock();
        match drivers.get_mut(&driver.id()) {
            Some(stored) => {
                *stored = driver.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(driver.id())),
        }
    }
}
