//! Daily session billing
//!
//! A driver pays a fixed price once per calendar day, on the first session
//! of that day. Reconnects on the same day are free. The comparison is on
//! dates only, never on times.

use crate::drivers::{DriverRecord, DriverRepository};
use crate::error::SessionError;
use chrono::{Local, NaiveDate};
use log::info;

/// Source of "today" for billing decisions
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date of the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always reports the same date
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charge {
    /// Today was already paid for
    AlreadyPaid,
    Debited { amount: i64, remaining: i64 },
}

/// Applies the daily charge to `driver` in memory.
///
/// Balance is checked before the debit so a refused driver keeps both its
/// balance and its last paid date.
pub fn charge_for_day(
    driver: &mut DriverRecord,
    today: NaiveDate,
    cost: i64,
) -> Result<Charge, SessionError> {
    if driver.last_paid_date() == Some(today) {
        return Ok(Charge::AlreadyPaid);
    }

    if driver.balance() < cost {
        return Err(SessionError::InsufficientFunds {
            balance: driver.balance(),
            cost,
        });
    }

    driver
        .reduce_balance(cost)
        .map_err(|e| SessionError::InsufficientFunds {
            balance: e.balance,
            cost,
        })?;
    driver.mark_paid(today);

    Ok(Charge::Debited {
        amount: cost,
        remaining: driver.balance(),
    })
}

/// Charges today if needed and persists the updated record.
pub fn settle_daily_charge(
    repository: &dyn DriverRepository,
    driver: &DriverRecord,
    today: NaiveDate,
    cost: i64,
) -> Result<Charge, SessionError> {
    let mut updated = driver.clone();
    let charge = charge_for_day(&mut updated, today, cost)?;

    if let Charge::Debited { amount, remaining } = charge {
        repository.save_driver(&updated)?;
        info!(
            "Charged driver {} {} for {} (balance now {})",
            updated.id(),
            amount,
            today,
            remaining
        );
    }

    Ok(charge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::InMemoryDriverRepository;
    use shared::DriverId;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn test_first_session_of_day_is_charged() {
        let mut driver = DriverRecord::new(DriverId::new(), "Anna", 100);

        let charge = charge_for_day(&mut driver, day(10), 30).unwrap();

        assert_eq!(
            charge,
            Charge::Debited {
                amount: 30,
                remaining: 70
            }
        );
        assert_eq!(driver.last_paid_date(), Some(day(10)));
    }

    #[test]
    fn test_second_session_same_day_is_free() {
        let mut driver = DriverRecord::new(DriverId::new(), "Anna", 100);

        charge_for_day(&mut driver, day(10), 30).unwrap();
        let charge = charge_for_day(&mut driver, day(10), 30).unwrap();

        assert_eq!(charge, Charge::AlreadyPaid);
        assert_eq!(driver.balance(), 70);
    }

    #[test]
    fn test_next_day_is_charged_again() {
        let mut driver = DriverRecord::new(DriverId::new(), "Anna", 100).with_last_paid_date(day(9));

        charge_for_day(&mut driver, day(10), 30).unwrap();
        assert_eq!(driver.balance(), 70);
        assert_eq!(driver.last_paid_date(), Some(day(10)));
    }

    #[test]
    fn test_insufficient_funds_changes_nothing() {
        let mut driver = DriverRecord::new(DriverId::new(), "Boris", 25).with_last_paid_date(day(1));

        let err = charge_for_day(&mut driver, day(10), 30).unwrap_err();

        assert!(matches!(
            err,
            SessionError::InsufficientFunds {
                balance: 25,
                cost: 30
            }
        ));
        assert_eq!(driver.balance(), 25);
        assert_eq!(driver.last_paid_date(), Some(day(1)));
    }

    #[test]
    fn test_paid_today_with_low_balance_still_enters() {
        let mut driver = DriverRecord::new(DriverId::new(), "Boris", 0).with_last_paid_date(day(10));
        assert_eq!(
            charge_for_day(&mut driver, day(10), 30).unwrap(),
            Charge::AlreadyPaid
        );
    }

    #[test]
    fn test_settle_persists_debit() {
        let repo = InMemoryDriverRepository::new();
        let id = DriverId::new();
        repo.insert(DriverRecord::new(id, "Anna", 45));
        let driver = repo.get_driver_by_id(&id).unwrap();

        settle_daily_charge(&repo, &driver, day(10), 30).unwrap();

        let stored = repo.get_driver_by_id(&id).unwrap();
        assert_eq!(stored.balance(), 15);
        assert_eq!(stored.last_paid_date(), Some(day(10)));
    }

    #[test]
    fn test_settle_refusal_persists_nothing() {
        let repo = InMemoryDriverRepository::new();
        let id = DriverId::new();
        repo.insert(DriverRecord::new(id, "Boris", 25));
        let driver = repo.get_driver_by_id(&id).unwrap();

        assert!(settle_daily_charge(&repo, &driver, day(10), 30).is_err());

        let stored = repo.get_driver_by_id(&id).unwrap();
        assert_eq!(stored.balance(), 25);
        assert_eq!(stored.last_paid_date(), None);
    }

    #[test]
    fn test_fixed_clock() {
        assert_eq!(FixedClock(day(3)).today(), day(3));
    }
}
