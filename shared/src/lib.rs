//! Wire types shared by the dispatch server and the driver simulator.
//!
//! Drivers report their position as a JSON object and receive the fleet
//! snapshot as a JSON array. Both directions go through the helpers in this
//! crate so the server and the simulator can never disagree on the format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// How often the server pushes the fleet snapshot to every driver.
pub const BROADCAST_INTERVAL: Duration = Duration::from_secs(2);
/// Silence after which a connected driver is considered gone.
pub const LIVENESS_THRESHOLD: Duration = Duration::from_secs(5);
/// Price of one working day, in whole currency units.
pub const DAILY_SESSION_COST: i64 = 30;

pub const MAX_LATITUDE: f64 = 90.0;
pub const MAX_LONGITUDE: f64 = 180.0;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("latitude {0} out of range")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} out of range")]
    LongitudeOutOfRange(f64),
}

/// Opaque, stable identity of a driver account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverId(Uuid);

impl DriverId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DriverId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for DriverId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CodecError> {
        if !(-MAX_LATITUDE..=MAX_LATITUDE).contains(&latitude) {
            return Err(CodecError::LatitudeOutOfRange(latitude));
        }
        if !(-MAX_LONGITUDE..=MAX_LONGITUDE).contains(&longitude) {
            return Err(CodecError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Inbound frame: one GPS fix sent by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<Coordinates> for PositionReport {
    fn from(c: Coordinates) -> Self {
        Self {
            latitude: c.latitude,
            longitude: c.longitude,
        }
    }
}

/// One element of the outbound snapshot array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub id: DriverId,
    pub latitude: f64,
    pub longitude: f64,
}

impl SnapshotEntry {
    pub fn new(id: DriverId, coordinates: Coordinates) -> Self {
        Self {
            id,
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
        }
    }
}

/// Decodes and validates a driver's position report.
pub fn decode_report(bytes: &[u8]) -> Result<Coordinates, CodecError> {
    let report: PositionReport = serde_json::from_slice(bytes)?;
    Coordinates::new(report.latitude, report.longitude)
}

pub fn encode_report(coordinates: Coordinates) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(&PositionReport::from(coordinates))?)
}

pub fn encode_snapshot(entries: &[SnapshotEntry]) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(entries)?)
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<Vec<SnapshotEntry>, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_decode_report() {
        let coords = decode_report(br#"{"latitude": 10.0, "longitude": 20.0}"#).unwrap();
        assert_approx_eq!(coords.latitude, 10.0);
        assert_approx_eq!(coords.longitude, 20.0);
    }

    #[test]
    fn test_decode_report_ignores_unknown_fields() {
        let coords =
            decode_report(br#"{"latitude": -33.9, "longitude": 151.2, "speed": 42}"#).unwrap();
        assert_approx_eq!(coords.latitude, -33.9);
        assert_approx_eq!(coords.longitude, 151.2);
    }

    #[test]
    fn test_decode_report_missing_field() {
        let result = decode_report(br#"{"latitude": 10.0}"#);
        assert!(matches!(result, Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_decode_report_garbage() {
        assert!(decode_report(b"not json").is_err());
        assert!(decode_report(b"").is_err());
        assert!(decode_report(br#"[1.0, 2.0]"#).is_err());
    }

    #[test]
    fn test_decode_report_out_of_range() {
        let result = decode_report(br#"{"latitude": 91.0, "longitude": 0.0}"#);
        assert!(matches!(result, Err(CodecError::LatitudeOutOfRange(_))));

        let result = decode_report(br#"{"latitude": 0.0, "longitude": -180.5}"#);
        assert!(matches!(result, Err(CodecError::LongitudeOutOfRange(_))));
    }

    #[test]
    fn test_coordinate_bounds_are_inclusive() {
        assert!(Coordinates::new(90.0, 180.0).is_ok());
        assert!(Coordinates::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let id: DriverId = "6f1c1f0e-8a5e-4a43-9a8e-3d1f9c2b7a10".parse().unwrap();
        let entry = SnapshotEntry::new(id, Coordinates::new(10.0, 20.0).unwrap());

        let bytes = encode_snapshot(&[entry]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value[0]["id"], "6f1c1f0e-8a5e-4a43-9a8e-3d1f9c2b7a10");
        assert_eq!(value[0]["latitude"], 10.0);
        assert_eq!(value[0]["longitude"], 20.0);
        assert!(value[0].get("timestamp").is_none());
    }

    #[test]
    fn test_empty_snapshot_is_empty_array() {
        assert_eq!(encode_snapshot(&[]).unwrap(), b"[]");
        assert!(decode_snapshot(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_driver_id_display_parse() {
        let id = DriverId::new();
        let parsed: DriverId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<DriverId>().is_err());
    }

    #[test]
    fn test_default_timings() {
        assert_eq!(BROADCAST_INTERVAL, Duration::from_secs(2));
        assert_eq!(LIVENESS_THRESHOLD, Duration::from_secs(5));
        assert!(LIVENESS_THRESHOLD > BROADCAST_INTERVAL);
    }
}
