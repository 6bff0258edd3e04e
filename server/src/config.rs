//! Tunables of the broadcast loop, liveness and billing

use shared::{BROADCAST_INTERVAL, DAILY_SESSION_COST, LIVENESS_THRESHOLD};
use std::time::Duration;

/// Tunables of the live tracking engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Period between two snapshot broadcasts
    pub broadcast_interval: Duration,
    /// Silence after which a driver is evicted
    pub liveness_threshold: Duration,
    /// Price debited once per calendar day on the first session
    pub daily_cost: i64,
    /// Snapshots buffered per driver before new ones are dropped
    pub conduit_capacity: usize,
    /// Emit a stats line every this many broadcast ticks (0 disables)
    pub stats_every_ticks: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            broadcast_interval: BROADCAST_INTERVAL,
            liveness_threshold: LIVENESS_THRESHOLD,
            daily_cost: DAILY_SESSION_COST,
            conduit_capacity: 1,
            stats_every_ticks: 30,
        }
    }
}

impl ServerConfig {
    /// Rejects settings under which the engine cannot behave sensibly
    pub fn validate(&self) -> Result<(), String> {
        if self.broadcast_interval.is_zero() {
            return Err("broadcast interval must be positive".to_string());
        }
        if self.liveness_threshold < self.broadcast_interval {
            return Err(format!(
                "liveness threshold ({:?}) shorter than broadcast interval ({:?})",
                self.liveness_threshold, self.broadcast_interval
            ));
        }
        if self.daily_cost < 0 {
            return Err("daily cost cannot be negative".to_string());
        }
        if self.conduit_capacity == 0 {
            return Err("conduit capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.broadcast_interval, Duration::from_secs(2));
        assert_eq!(config.liveness_threshold, Duration::from_secs(5));
        assert_eq!(config.daily_cost, 30);
        assert_eq!(config.conduit_capacity, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let zero_interval = ServerConfig {
            broadcast_interval: Duration::ZERO,
            ..ServerConfig::default()
        };
        assert!(zero_interval.validate().is_err());

        let short_threshold = ServerConfig {
            liveness_threshold: Duration::from_secs(1),
            ..ServerConfig::default()
        };
        assert!(short_threshold.validate().is_err());

        let negative_cost = ServerConfig {
            daily_cost: -1,
            ..ServerConfig::default()
        };
        assert!(negative_cost.validate().is_err());

        let no_slot = ServerConfig {
            conduit_capacity: 0,
            ..ServerConfig::default()
        };
        assert!(no_slot.validate().is_err());
    }
}
